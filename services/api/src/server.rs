use crate::cli::ServeArgs;
use crate::demo::DemoCampus;
use crate::infra::{ApiServices, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use iems::academics::{AcademicServices, InMemoryAcademicStore, InMemoryAuditLog, SystemClock};
use iems::config::AppConfig;
use iems::error::AppError;
use iems::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services: Arc<ApiServices> = if args.seed_demo {
        let campus = DemoCampus::seed(
            Arc::new(SystemClock),
            config.marks,
            config.attainment.clone(),
        )?;
        let exams = campus.run_assessments()?;
        info!(exams = exams.len(), "demo catalog seeded");
        campus.services
    } else {
        Arc::new(AcademicServices::new(
            Arc::new(InMemoryAcademicStore::default()),
            Arc::new(InMemoryAuditLog::default()),
            Arc::new(SystemClock),
            config.marks,
            config.attainment.clone(),
        ))
    };

    let app = with_service_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        method = config.attainment.method.label(),
        edit_window_days = config.marks.edit_window_days,
        "attainment engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
