use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, CoPoMapping, CourseOutcome, CourseOutcomeId, Exam, ExamId, Mark, MarkId,
    ProgramOutcome, ProgramOutcomeId, Question, QuestionId, Student, StudentId, Subject, SubjectId,
};

/// Storage for exams and the questions they own.
pub trait ExamRepository: Send + Sync {
    fn insert_exam(&self, exam: Exam) -> Result<Exam, RepositoryError>;
    fn update_exam(&self, exam: Exam) -> Result<(), RepositoryError>;
    fn fetch_exam(&self, id: &ExamId) -> Result<Option<Exam>, RepositoryError>;
    /// Removes the exam together with its questions and marks.
    fn delete_exam(&self, id: &ExamId) -> Result<(), RepositoryError>;
    fn exams_for_subject(&self, subject_id: &SubjectId) -> Result<Vec<Exam>, RepositoryError>;
    fn insert_question(&self, question: Question) -> Result<Question, RepositoryError>;
    fn fetch_question(&self, id: &QuestionId) -> Result<Option<Question>, RepositoryError>;
    fn questions_for_exam(&self, exam_id: &ExamId) -> Result<Vec<Question>, RepositoryError>;
}

/// Storage for per-question marks.
pub trait MarkRepository: Send + Sync {
    /// Persists every mark or none of them. Fails with `Conflict` when any
    /// (exam, student, question) triple is already recorded.
    fn insert_marks(&self, marks: Vec<Mark>) -> Result<Vec<Mark>, RepositoryError>;
    fn update_mark(&self, mark: Mark) -> Result<(), RepositoryError>;
    fn fetch_mark(&self, id: &MarkId) -> Result<Option<Mark>, RepositoryError>;
    fn find_mark(
        &self,
        exam_id: &ExamId,
        student_id: &StudentId,
        question_id: &QuestionId,
    ) -> Result<Option<Mark>, RepositoryError>;
    fn marks_for_exam(&self, exam_id: &ExamId) -> Result<Vec<Mark>, RepositoryError>;
}

/// Read access to subjects, students, and outcome definitions.
pub trait CatalogRepository: Send + Sync {
    fn subject(&self, id: &SubjectId) -> Result<Option<Subject>, RepositoryError>;
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn student_by_roll_number(&self, roll_number: &str)
        -> Result<Option<Student>, RepositoryError>;
    fn course_outcome(&self, id: &CourseOutcomeId)
        -> Result<Option<CourseOutcome>, RepositoryError>;
    fn course_outcomes_for_subject(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<CourseOutcome>, RepositoryError>;
    fn program_outcome(
        &self,
        id: &ProgramOutcomeId,
    ) -> Result<Option<ProgramOutcome>, RepositoryError>;
    fn mappings_for_program_outcome(
        &self,
        id: &ProgramOutcomeId,
    ) -> Result<Vec<CoPoMapping>, RepositoryError>;
}

/// Everything the services need from persistence.
pub trait AcademicStore: ExamRepository + MarkRepository + CatalogRepository {}

impl<T> AcademicStore for T where T: ExamRepository + MarkRepository + CatalogRepository {}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook receiving an entry for every mark edit.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: MarkAuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAuditEntry {
    pub mark_id: MarkId,
    pub exam_id: ExamId,
    pub previous_value: f64,
    pub new_value: f64,
    pub actor: Actor,
    pub override_edit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}
