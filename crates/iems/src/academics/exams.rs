use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::clock::Clock;
use super::domain::{Exam, ExamId, ExamStatus, NewExam, NewQuestion, Question, QuestionId};
use super::error::AcademicError;
use super::lifecycle::ExamTransition;
use super::repository::{AcademicStore, RepositoryError};

static EXAM_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static QUESTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_exam_id() -> ExamId {
    let id = EXAM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ExamId(format!("exam-{id:06}"))
}

fn next_question_id() -> QuestionId {
    let id = QUESTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    QuestionId(format!("q-{id:06}"))
}

/// Drafts exams, adds questions, and drives lifecycle transitions.
pub struct ExamService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> ExamService<S>
where
    S: AcademicStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn create_exam(&self, draft: NewExam) -> Result<Exam, AcademicError> {
        self.store
            .subject(&draft.subject_id)?
            .ok_or_else(|| AcademicError::not_found("subject", &draft.subject_id))?;

        let name = draft.name.trim();
        if name.is_empty() {
            return Err(AcademicError::validation("name", "exam name is required"));
        }
        if !draft.total_marks.is_finite() || draft.total_marks <= 0.0 {
            return Err(AcademicError::validation(
                "total_marks",
                "total marks must be a positive number",
            ));
        }
        if draft.duration_minutes == 0 {
            return Err(AcademicError::validation(
                "duration_minutes",
                "duration must be at least one minute",
            ));
        }

        let exam = Exam {
            id: next_exam_id(),
            subject_id: draft.subject_id,
            name: name.to_string(),
            exam_type: draft.exam_type,
            status: ExamStatus::Draft,
            total_marks: draft.total_marks,
            duration_minutes: draft.duration_minutes,
            created_at: self.clock.now(),
            activated_at: None,
            locked_at: None,
            published_at: None,
        };

        let stored = self.store.insert_exam(exam)?;
        info!(exam = %stored.id, exam_type = stored.exam_type.label(), "exam drafted");
        Ok(stored)
    }

    pub fn add_question(
        &self,
        exam_id: &ExamId,
        draft: NewQuestion,
    ) -> Result<Question, AcademicError> {
        let exam = self.get(exam_id)?;
        if !exam.status.accepts_questions() {
            return Err(AcademicError::rule(format!(
                "questions can only be added while the exam is DRAFT (exam is {})",
                exam.status
            )));
        }

        if !draft.max_marks.is_finite() || draft.max_marks <= 0.0 {
            return Err(AcademicError::validation(
                "max_marks",
                "max marks must be a positive number",
            ));
        }

        for weight in &draft.co_weights {
            if !weight.percentage.is_finite()
                || weight.percentage <= 0.0
                || weight.percentage > 100.0
            {
                return Err(AcademicError::validation(
                    "co_weights",
                    format!(
                        "weight for {} must be within (0, 100], found {}",
                        weight.course_outcome_id, weight.percentage
                    ),
                ));
            }
            let outcome = self
                .store
                .course_outcome(&weight.course_outcome_id)?
                .ok_or_else(|| {
                    AcademicError::not_found("course outcome", &weight.course_outcome_id)
                })?;
            if outcome.subject_id != exam.subject_id {
                return Err(AcademicError::validation(
                    "co_weights",
                    format!(
                        "course outcome {} belongs to subject {}, not {}",
                        outcome.code, outcome.subject_id, exam.subject_id
                    ),
                ));
            }
        }

        let question = Question {
            id: next_question_id(),
            exam_id: exam.id.clone(),
            number: draft.number,
            max_marks: draft.max_marks,
            section: draft.section,
            bloom_level: draft.bloom_level,
            difficulty: draft.difficulty,
            required: draft.required,
            co_weights: draft.co_weights,
        };

        match self.store.insert_question(question) {
            Ok(stored) => Ok(stored),
            Err(RepositoryError::Conflict) => Err(AcademicError::validation(
                "number",
                format!("question {} already exists on exam {}", draft.number, exam.id),
            )),
            Err(other) => Err(other.into()),
        }
    }

    pub fn activate(&self, exam_id: &ExamId) -> Result<Exam, AcademicError> {
        self.transition(exam_id, ExamTransition::Activate)
    }

    pub fn lock(&self, exam_id: &ExamId) -> Result<Exam, AcademicError> {
        self.transition(exam_id, ExamTransition::Lock)
    }

    pub fn publish(&self, exam_id: &ExamId) -> Result<Exam, AcademicError> {
        self.transition(exam_id, ExamTransition::Publish)
    }

    pub fn get(&self, exam_id: &ExamId) -> Result<Exam, AcademicError> {
        self.store
            .fetch_exam(exam_id)?
            .ok_or_else(|| AcademicError::not_found("exam", exam_id))
    }

    pub fn questions(&self, exam_id: &ExamId) -> Result<Vec<Question>, AcademicError> {
        let exam = self.get(exam_id)?;
        Ok(self.store.questions_for_exam(&exam.id)?)
    }

    /// Exams with recorded marks are never physically removed.
    pub fn delete(&self, exam_id: &ExamId) -> Result<(), AcademicError> {
        let exam = self.get(exam_id)?;
        if !self.store.marks_for_exam(&exam.id)?.is_empty() {
            return Err(AcademicError::rule(format!(
                "exam {} has recorded marks and cannot be deleted",
                exam.id
            )));
        }

        self.store.delete_exam(&exam.id)?;
        info!(exam = %exam.id, "exam deleted");
        Ok(())
    }

    fn transition(
        &self,
        exam_id: &ExamId,
        transition: ExamTransition,
    ) -> Result<Exam, AcademicError> {
        let mut exam = self.get(exam_id)?;
        let from = exam.status;
        exam.transition(transition, self.clock.now())?;
        self.store.update_exam(exam.clone())?;

        info!(
            exam = %exam.id,
            from = from.label(),
            to = exam.status.label(),
            transition = transition.label(),
            "exam transitioned"
        );
        Ok(exam)
    }
}
