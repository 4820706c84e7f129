//! Exams, marks entry, and CO/PO attainment for internal assessments.
//!
//! Persistence sits behind the traits in [`repository`]. The services take
//! their configuration and clock explicitly so the rules stay deterministic.

pub mod attainment;
pub mod clock;
pub mod domain;
pub mod error;
pub mod exams;
pub mod lifecycle;
pub mod marks;
pub mod memory;
pub mod repository;
pub mod router;
pub mod services;

#[cfg(test)]
mod tests;

pub use attainment::{
    AggregationMethod, AttainmentCalculator, AttainmentSettings, CoAttainment, ComponentWeights,
    PoAttainment, StudentTotal, SubjectAttainment,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Actor, BloomLevel, CoPoMapping, CoPoStrength, CoWeight, CourseOutcome, CourseOutcomeId,
    DepartmentId, Difficulty, Exam, ExamId, ExamStatus, ExamType, Mark, MarkEntry, MarkId,
    NewExam, NewQuestion, ProgramOutcome, ProgramOutcomeId, Question, QuestionId, Role, Student,
    StudentId, Subject, SubjectId,
};
pub use error::AcademicError;
pub use exams::ExamService;
pub use lifecycle::{ExamTransition, InvalidStateTransition};
pub use marks::{MarkUpdate, MarksPolicy, MarksService};
pub use memory::{InMemoryAcademicStore, InMemoryAuditLog};
pub use repository::{
    AcademicStore, AuditError, AuditSink, CatalogRepository, ExamRepository, MarkAuditEntry,
    MarkRepository, RepositoryError,
};
pub use router::academic_router;
pub use services::AcademicServices;
