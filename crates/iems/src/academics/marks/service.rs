use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::import::parse_upload;
use super::MarksPolicy;
use crate::academics::clock::Clock;
use crate::academics::domain::{
    Actor, Exam, ExamId, ExamStatus, Mark, MarkEntry, MarkId, Question, QuestionId, StudentId,
};
use crate::academics::error::AcademicError;
use crate::academics::repository::{
    AcademicStore, AuditSink, MarkAuditEntry, RepositoryError,
};

static MARK_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_mark_id() -> MarkId {
    let id = MARK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    MarkId(format!("mark-{id:06}"))
}

/// Requested change to a recorded mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkUpdate {
    pub value: f64,
    pub actor: Actor,
    /// Bypasses the edit window and the LOCKED state. Admin/HOD only.
    #[serde(default)]
    pub override_edit: bool,
    #[serde(default)]
    pub override_reason: Option<String>,
}

/// Service validating marks entry against the exam lifecycle and edit window.
pub struct MarksService<S, A> {
    store: Arc<S>,
    audit: Arc<A>,
    clock: Arc<dyn Clock>,
    policy: MarksPolicy,
}

impl<S, A> MarksService<S, A>
where
    S: AcademicStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, clock: Arc<dyn Clock>, policy: MarksPolicy) -> Self {
        Self {
            store,
            audit,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> MarksPolicy {
        self.policy
    }

    /// Record a single mark on an ACTIVE exam.
    pub fn enter_mark(&self, exam_id: &ExamId, entry: MarkEntry) -> Result<Mark, AcademicError> {
        let exam = self.exam(exam_id)?;
        let question = self
            .store
            .fetch_question(&entry.question_id)?
            .filter(|question| question.exam_id == exam.id)
            .ok_or_else(|| AcademicError::not_found("question", &entry.question_id))?;
        self.store
            .student(&entry.student_id)?
            .ok_or_else(|| AcademicError::not_found("student", &entry.student_id))?;

        ensure_accepts_entry(&exam)?;
        check_value(entry.value, &question)?;

        if self
            .store
            .find_mark(&exam.id, &entry.student_id, &question.id)?
            .is_some()
        {
            return Err(duplicate_mark(&entry.student_id, &question));
        }

        let mark = new_mark(&exam.id, entry, self.clock.now());
        let mut stored = match self.store.insert_marks(vec![mark]) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Err(AcademicError::rule(
                    "a mark was recorded concurrently for this student and question",
                ))
            }
            Err(other) => return Err(other.into()),
        };

        let mark = stored
            .pop()
            .ok_or_else(|| RepositoryError::Unavailable("insert returned no mark".to_string()))?;
        info!(exam = %exam.id, mark = %mark.id, student = %mark.student_id, "mark entered");
        Ok(mark)
    }

    /// Change a recorded mark, enforcing the edit window unless overridden.
    pub fn update_mark(&self, mark_id: &MarkId, update: MarkUpdate) -> Result<Mark, AcademicError> {
        let mut mark = self
            .store
            .fetch_mark(mark_id)?
            .ok_or_else(|| AcademicError::not_found("mark", mark_id))?;
        let question = self
            .store
            .fetch_question(&mark.question_id)?
            .ok_or_else(|| AcademicError::not_found("question", &mark.question_id))?;

        check_value(update.value, &question)?;

        let override_reason = if update.override_edit {
            Some(check_override(&update)?)
        } else {
            None
        };

        let exam = self.exam(&mark.exam_id)?;
        if !exam.status.accepts_mark_updates(update.override_edit) {
            return Err(match exam.status {
                ExamStatus::Published => AcademicError::rule(format!(
                    "exam {} is PUBLISHED and its marks are final",
                    exam.id
                )),
                status => AcademicError::rule(format!(
                    "exam {} is {status}; an authorized override is required to edit marks",
                    exam.id
                )),
            });
        }

        let now = self.clock.now();
        let days_since_creation = (now - mark.created_at).num_days();
        if !update.override_edit && days_since_creation > i64::from(self.policy.edit_window_days)
        {
            return Err(AcademicError::rule("edit window expired"));
        }

        let original = mark.clone();
        let previous_value = mark.value;
        mark.value = update.value;
        mark.updated_at = now;
        self.store.update_mark(mark.clone())?;

        let recorded = self.audit.record(MarkAuditEntry {
            mark_id: mark.id.clone(),
            exam_id: mark.exam_id.clone(),
            previous_value,
            new_value: mark.value,
            actor: update.actor.clone(),
            override_edit: update.override_edit,
            override_reason: override_reason.clone(),
            recorded_at: now,
        });
        if let Err(err) = recorded {
            // An edit without its audit entry must not stand.
            self.store.update_mark(original)?;
            warn!(mark = %mark.id, error = %err, "mark update rolled back after audit failure");
            return Err(err.into());
        }

        match override_reason {
            Some(reason) => warn!(
                mark = %mark.id,
                actor = %update.actor.id,
                role = update.actor.role.label(),
                days_since_creation,
                %reason,
                "mark updated via override"
            ),
            None => info!(mark = %mark.id, actor = %update.actor.id, "mark updated"),
        }

        Ok(mark)
    }

    /// Validate every row, then persist all of them or none.
    pub fn bulk_enter_marks(
        &self,
        exam_id: &ExamId,
        rows: Vec<MarkEntry>,
    ) -> Result<Vec<Mark>, AcademicError> {
        let exam = self.exam(exam_id)?;
        ensure_accepts_entry(&exam)?;
        if rows.is_empty() {
            return Err(AcademicError::validation("rows", "at least one row is required"));
        }

        let questions: BTreeMap<QuestionId, Question> = self
            .store
            .questions_for_exam(&exam.id)?
            .into_iter()
            .map(|question| (question.id.clone(), question))
            .collect();
        let mut recorded: HashSet<(StudentId, QuestionId)> = self
            .store
            .marks_for_exam(&exam.id)?
            .into_iter()
            .map(|mark| (mark.student_id, mark.question_id))
            .collect();

        for (index, row) in rows.iter().enumerate() {
            match self.check_row(&questions, &mut recorded, row) {
                Ok(()) => {}
                Err(AcademicError::Repository(err)) => return Err(err.into()),
                Err(err) => {
                    let row_number = index + 1;
                    warn!(exam = %exam.id, row = row_number, error = %err, "bulk marks rejected");
                    return Err(AcademicError::rule(format!("row {row_number}: {err}")));
                }
            }
        }

        let now = self.clock.now();
        let marks: Vec<Mark> = rows
            .into_iter()
            .map(|row| new_mark(&exam.id, row, now))
            .collect();

        let stored = match self.store.insert_marks(marks) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return Err(AcademicError::rule(
                    "marks were recorded concurrently for this exam; nothing was saved",
                ))
            }
            Err(other) => return Err(other.into()),
        };

        info!(exam = %exam.id, count = stored.len(), "bulk marks committed");
        Ok(stored)
    }

    /// Parse the spreadsheet template and enter its rows atomically.
    pub fn import_marks_csv<R: Read>(
        &self,
        exam_id: &ExamId,
        reader: R,
    ) -> Result<Vec<Mark>, AcademicError> {
        let exam = self.exam(exam_id)?;
        ensure_accepts_entry(&exam)?;

        let rows = parse_upload(reader)
            .map_err(|err| AcademicError::validation("csv", err.to_string()))?;

        let questions_by_number: BTreeMap<u32, QuestionId> = self
            .store
            .questions_for_exam(&exam.id)?
            .into_iter()
            .map(|question| (question.number, question.id))
            .collect();

        let mut entries = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let row_number = index + 1;
            let student = match self.store.student_by_roll_number(&row.student_id)? {
                Some(student) => Some(student),
                None => self.store.student(&StudentId::new(row.student_id.trim()))?,
            };
            let student = student.ok_or_else(|| {
                AcademicError::rule(format!(
                    "row {row_number}: unknown student '{}'",
                    row.student_id
                ))
            })?;
            let question_id = questions_by_number
                .get(&row.question_number)
                .cloned()
                .ok_or_else(|| {
                    AcademicError::rule(format!(
                        "row {row_number}: exam has no question {}",
                        row.question_number
                    ))
                })?;

            entries.push(MarkEntry {
                student_id: student.id,
                question_id,
                value: row.marks_obtained,
            });
        }

        self.bulk_enter_marks(&exam.id, entries)
    }

    pub fn get_mark(&self, mark_id: &MarkId) -> Result<Mark, AcademicError> {
        self.store
            .fetch_mark(mark_id)?
            .ok_or_else(|| AcademicError::not_found("mark", mark_id))
    }

    pub fn marks_for_exam(&self, exam_id: &ExamId) -> Result<Vec<Mark>, AcademicError> {
        let exam = self.exam(exam_id)?;
        Ok(self.store.marks_for_exam(&exam.id)?)
    }

    fn exam(&self, exam_id: &ExamId) -> Result<Exam, AcademicError> {
        self.store
            .fetch_exam(exam_id)?
            .ok_or_else(|| AcademicError::not_found("exam", exam_id))
    }

    fn check_row(
        &self,
        questions: &BTreeMap<QuestionId, Question>,
        recorded: &mut HashSet<(StudentId, QuestionId)>,
        row: &MarkEntry,
    ) -> Result<(), AcademicError> {
        let question = questions
            .get(&row.question_id)
            .ok_or_else(|| AcademicError::not_found("question", &row.question_id))?;
        self.store
            .student(&row.student_id)?
            .ok_or_else(|| AcademicError::not_found("student", &row.student_id))?;
        check_value(row.value, question)?;

        if !recorded.insert((row.student_id.clone(), question.id.clone())) {
            return Err(duplicate_mark(&row.student_id, question));
        }
        Ok(())
    }
}

fn ensure_accepts_entry(exam: &Exam) -> Result<(), AcademicError> {
    if exam.status.accepts_new_marks() {
        Ok(())
    } else {
        Err(AcademicError::rule(format!(
            "marks can only be entered while the exam is ACTIVE (exam {} is {})",
            exam.id, exam.status
        )))
    }
}

fn check_value(value: f64, question: &Question) -> Result<(), AcademicError> {
    if !value.is_finite() {
        return Err(AcademicError::validation("value", "marks must be a finite number"));
    }
    if value < 0.0 {
        return Err(AcademicError::validation(
            "value",
            format!("marks cannot be negative (found {value})"),
        ));
    }
    if value > question.max_marks {
        return Err(AcademicError::validation(
            "value",
            format!(
                "marks {value} exceed the maximum of {} for question {}",
                question.max_marks, question.number
            ),
        ));
    }
    Ok(())
}

fn check_override(update: &MarkUpdate) -> Result<String, AcademicError> {
    if !update.actor.role.can_override_marks() {
        return Err(AcademicError::validation(
            "actor_role",
            format!(
                "role '{}' cannot override marks; admin or HOD required",
                update.actor.role.label()
            ),
        ));
    }

    match update.override_reason.as_deref().map(str::trim) {
        Some(reason) if !reason.is_empty() => Ok(reason.to_string()),
        _ => Err(AcademicError::validation(
            "override_reason",
            "a reason is required when overriding marks",
        )),
    }
}

fn duplicate_mark(student_id: &StudentId, question: &Question) -> AcademicError {
    AcademicError::rule(format!(
        "a mark is already recorded for student {student_id} on question {}; update it instead",
        question.number
    ))
}

fn new_mark(exam_id: &ExamId, entry: MarkEntry, now: DateTime<Utc>) -> Mark {
    Mark {
        id: next_mark_id(),
        exam_id: exam_id.clone(),
        student_id: entry.student_id,
        question_id: entry.question_id,
        value: entry.value,
        created_at: now,
        updated_at: now,
    }
}
