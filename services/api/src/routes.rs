use crate::infra::{ApiServices, AppState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json};
use iems::academics::academic_router;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Academic API plus the operational endpoints.
pub(crate) fn with_service_routes(services: Arc<ApiServices>) -> axum::Router {
    academic_router(services)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    if state.readiness.load(Ordering::Relaxed) {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "initializing" })),
        )
    }
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{DemoCampus, SUBJECT_ID};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use iems::academics::{AttainmentSettings, FixedClock, MarksPolicy};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::Value;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app_state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        }
    }

    fn seeded_services() -> Arc<ApiServices> {
        let campus = DemoCampus::seed(
            Arc::new(FixedClock::new(Utc::now())),
            MarksPolicy::default(),
            AttainmentSettings::default(),
        )
        .expect("catalog seeds");
        campus.run_assessments().expect("assessments run");
        campus.services
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&body).expect("json payload")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_tracks_startup_flag() {
        let response = readiness_endpoint(Extension(app_state(false)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(app_state(true)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn metrics_endpoint_uses_prometheus_content_type() {
        let response = metrics_endpoint(Extension(app_state(true)))
            .await
            .into_response();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE),
            Some(&header::HeaderValue::from_static("text/plain; version=0.0.4"))
        );
    }

    #[tokio::test]
    async fn service_routes_serve_seeded_attainment() {
        let router = with_service_routes(seeded_services()).layer(Extension(app_state(true)));

        let response = router
            .clone()
            .oneshot(
                Request::get(format!("/api/v1/subjects/{SUBJECT_ID}/attainment"))
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload["subject_code"], "CS301");
        assert_eq!(
            payload["course_outcomes"]
                .as_array()
                .map(|outcomes| outcomes.len()),
            Some(3)
        );

        let response = router
            .oneshot(
                Request::get("/ready")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
