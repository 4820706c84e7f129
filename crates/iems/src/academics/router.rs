use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::attainment::{
    write_subject_attainment_csv, CoAttainment, PoAttainment, StudentTotal, SubjectAttainment,
};
use super::domain::{
    CourseOutcomeId, Exam, ExamId, ExamType, Mark, MarkEntry, MarkId, NewExam, NewQuestion,
    ProgramOutcomeId, Question, StudentId, SubjectId,
};
use super::error::AcademicError;
use super::marks::MarkUpdate;
use super::repository::{AcademicStore, AuditSink};
use super::services::AcademicServices;

type Services<S, A> = Arc<AcademicServices<S, A>>;

/// Router builder exposing exam lifecycle, marks entry, and analytics endpoints.
pub fn academic_router<S, A>(services: Services<S, A>) -> Router
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/exams", post(create_exam::<S, A>))
        .route(
            "/api/v1/exams/:exam_id",
            get(get_exam::<S, A>).delete(delete_exam::<S, A>),
        )
        .route(
            "/api/v1/exams/:exam_id/questions",
            get(list_questions::<S, A>).post(add_question::<S, A>),
        )
        .route("/api/v1/exams/:exam_id/activate", post(activate_exam::<S, A>))
        .route("/api/v1/exams/:exam_id/lock", post(lock_exam::<S, A>))
        .route("/api/v1/exams/:exam_id/publish", post(publish_exam::<S, A>))
        .route(
            "/api/v1/exams/:exam_id/marks",
            get(list_marks::<S, A>).post(enter_mark::<S, A>),
        )
        .route(
            "/api/v1/exams/:exam_id/marks/bulk",
            post(bulk_enter_marks::<S, A>),
        )
        .route(
            "/api/v1/exams/:exam_id/marks/import",
            post(import_marks::<S, A>),
        )
        .route(
            "/api/v1/marks/:mark_id",
            get(get_mark::<S, A>).put(update_mark::<S, A>),
        )
        .route(
            "/api/v1/exams/:exam_id/students/:student_id/total",
            get(student_total::<S, A>),
        )
        .route(
            "/api/v1/subjects/:subject_id/attainment",
            get(subject_attainment::<S, A>),
        )
        .route(
            "/api/v1/subjects/:subject_id/attainment.csv",
            get(subject_attainment_csv::<S, A>),
        )
        .route(
            "/api/v1/subjects/:subject_id/outcomes/:co_id/attainment",
            get(co_attainment::<S, A>),
        )
        .route(
            "/api/v1/program-outcomes/:po_id/attainment",
            get(po_attainment::<S, A>),
        )
        .with_state(services)
}

impl IntoResponse for AcademicError {
    fn into_response(self) -> Response {
        let (status, kind, field) = match &self {
            AcademicError::EntityNotFound { .. } => {
                (StatusCode::NOT_FOUND, "entity_not_found", None)
            }
            AcademicError::Validation { field, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                Some(*field),
            ),
            AcademicError::BusinessRuleViolation(_) => {
                (StatusCode::CONFLICT, "business_rule_violation", None)
            }
            AcademicError::InvalidStateTransition(_) => {
                (StatusCode::CONFLICT, "invalid_state_transition", None)
            }
            AcademicError::Repository(_) | AcademicError::Audit(_) | AcademicError::Export(_) => {
                tracing::error!(error = %self, "academic request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let mut payload = json!({
            "error": self.to_string(),
            "kind": kind,
        });
        if let Some(field) = field {
            payload["field"] = json!(field);
        }

        (status, Json(payload)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkMarksRequest {
    pub(crate) rows: Vec<MarkEntry>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkMarksResponse {
    pub(crate) count: usize,
    pub(crate) marks: Vec<Mark>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AttainmentQuery {
    #[serde(default)]
    pub(crate) exam_type: Option<ExamType>,
}

pub(crate) async fn create_exam<S, A>(
    State(services): State<Services<S, A>>,
    Json(draft): Json<NewExam>,
) -> Result<(StatusCode, Json<Exam>), AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let exam = services.exams.create_exam(draft)?;
    Ok((StatusCode::CREATED, Json(exam)))
}

pub(crate) async fn get_exam<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Exam>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.exams.get(&ExamId(exam_id))?))
}

pub(crate) async fn delete_exam<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
) -> Result<StatusCode, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    services.exams.delete(&ExamId(exam_id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_questions<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<Question>>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.exams.questions(&ExamId(exam_id))?))
}

pub(crate) async fn add_question<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
    Json(draft): Json<NewQuestion>,
) -> Result<(StatusCode, Json<Question>), AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let question = services.exams.add_question(&ExamId(exam_id), draft)?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub(crate) async fn activate_exam<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Exam>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.exams.activate(&ExamId(exam_id))?))
}

pub(crate) async fn lock_exam<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Exam>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.exams.lock(&ExamId(exam_id))?))
}

pub(crate) async fn publish_exam<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Exam>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.exams.publish(&ExamId(exam_id))?))
}

pub(crate) async fn list_marks<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
) -> Result<Json<Vec<Mark>>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.marks.marks_for_exam(&ExamId(exam_id))?))
}

pub(crate) async fn enter_mark<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
    Json(entry): Json<MarkEntry>,
) -> Result<(StatusCode, Json<Mark>), AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let mark = services.marks.enter_mark(&ExamId(exam_id), entry)?;
    Ok((StatusCode::CREATED, Json(mark)))
}

pub(crate) async fn bulk_enter_marks<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
    Json(request): Json<BulkMarksRequest>,
) -> Result<(StatusCode, Json<BulkMarksResponse>), AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let marks = services
        .marks
        .bulk_enter_marks(&ExamId(exam_id), request.rows)?;
    Ok((
        StatusCode::CREATED,
        Json(BulkMarksResponse {
            count: marks.len(),
            marks,
        }),
    ))
}

pub(crate) async fn import_marks<S, A>(
    State(services): State<Services<S, A>>,
    Path(exam_id): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<BulkMarksResponse>), AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let marks = services
        .marks
        .import_marks_csv(&ExamId(exam_id), body.as_bytes())?;
    Ok((
        StatusCode::CREATED,
        Json(BulkMarksResponse {
            count: marks.len(),
            marks,
        }),
    ))
}

pub(crate) async fn get_mark<S, A>(
    State(services): State<Services<S, A>>,
    Path(mark_id): Path<String>,
) -> Result<Json<Mark>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.marks.get_mark(&MarkId(mark_id))?))
}

pub(crate) async fn update_mark<S, A>(
    State(services): State<Services<S, A>>,
    Path(mark_id): Path<String>,
    Json(update): Json<MarkUpdate>,
) -> Result<Json<Mark>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    Ok(Json(services.marks.update_mark(&MarkId(mark_id), update)?))
}

pub(crate) async fn student_total<S, A>(
    State(services): State<Services<S, A>>,
    Path((exam_id, student_id)): Path<(String, String)>,
) -> Result<Json<StudentTotal>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let total = services
        .attainment
        .calculate_student_total(&StudentId(student_id), &ExamId(exam_id))?;
    Ok(Json(total))
}

pub(crate) async fn subject_attainment<S, A>(
    State(services): State<Services<S, A>>,
    Path(subject_id): Path<String>,
    Query(query): Query<AttainmentQuery>,
) -> Result<Json<SubjectAttainment>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let attainment = services
        .attainment
        .calculate_subject_attainment(&SubjectId(subject_id), query.exam_type)?;
    Ok(Json(attainment))
}

pub(crate) async fn subject_attainment_csv<S, A>(
    State(services): State<Services<S, A>>,
    Path(subject_id): Path<String>,
    Query(query): Query<AttainmentQuery>,
) -> Result<Response, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let attainment = services
        .attainment
        .calculate_subject_attainment(&SubjectId(subject_id), query.exam_type)?;

    let mut buffer = Vec::new();
    write_subject_attainment_csv(&attainment, &mut buffer)
        .map_err(|err| AcademicError::Export(err.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        buffer,
    )
        .into_response())
}

pub(crate) async fn co_attainment<S, A>(
    State(services): State<Services<S, A>>,
    Path((subject_id, co_id)): Path<(String, String)>,
    Query(query): Query<AttainmentQuery>,
) -> Result<Json<CoAttainment>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let attainment = services.attainment.calculate_co_attainment(
        &SubjectId(subject_id),
        &CourseOutcomeId(co_id),
        query.exam_type,
    )?;
    Ok(Json(attainment))
}

pub(crate) async fn po_attainment<S, A>(
    State(services): State<Services<S, A>>,
    Path(po_id): Path<String>,
) -> Result<Json<PoAttainment>, AcademicError>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    let attainment = services
        .attainment
        .calculate_po_attainment(&ProgramOutcomeId(po_id))?;
    Ok(Json(attainment))
}
