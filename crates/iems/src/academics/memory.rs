use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    CoPoMapping, CourseOutcome, CourseOutcomeId, Exam, ExamId, Mark, MarkId, ProgramOutcome,
    ProgramOutcomeId, Question, QuestionId, Student, StudentId, Subject, SubjectId,
};
use super::repository::{
    AuditError, AuditSink, CatalogRepository, ExamRepository, MarkAuditEntry, MarkRepository,
    RepositoryError,
};

#[derive(Debug, Default)]
struct StoreState {
    exams: BTreeMap<ExamId, Exam>,
    questions: BTreeMap<QuestionId, Question>,
    marks: BTreeMap<MarkId, Mark>,
    subjects: BTreeMap<SubjectId, Subject>,
    students: BTreeMap<StudentId, Student>,
    course_outcomes: BTreeMap<CourseOutcomeId, CourseOutcome>,
    program_outcomes: BTreeMap<ProgramOutcomeId, ProgramOutcome>,
    co_po_mappings: Vec<CoPoMapping>,
}

/// Mutex-backed store used by the API service, the demo, and tests.
///
/// Every operation takes the single state lock, so a batch insert is observed
/// entirely or not at all.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAcademicStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryAcademicStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn insert_subject(&self, subject: Subject) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.subjects.contains_key(&subject.id) {
            return Err(RepositoryError::Conflict);
        }
        state.subjects.insert(subject.id.clone(), subject);
        Ok(())
    }

    pub fn insert_student(&self, student: Student) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let duplicate_roll = state
            .students
            .values()
            .any(|existing| existing.roll_number == student.roll_number);
        if state.students.contains_key(&student.id) || duplicate_roll {
            return Err(RepositoryError::Conflict);
        }
        state.students.insert(student.id.clone(), student);
        Ok(())
    }

    pub fn insert_course_outcome(&self, outcome: CourseOutcome) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.course_outcomes.contains_key(&outcome.id) {
            return Err(RepositoryError::Conflict);
        }
        state.course_outcomes.insert(outcome.id.clone(), outcome);
        Ok(())
    }

    pub fn insert_program_outcome(&self, outcome: ProgramOutcome) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.program_outcomes.contains_key(&outcome.id) {
            return Err(RepositoryError::Conflict);
        }
        state.program_outcomes.insert(outcome.id.clone(), outcome);
        Ok(())
    }

    /// Replaces any existing mapping for the same CO/PO pair.
    pub fn map_outcomes(&self, mapping: CoPoMapping) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.course_outcomes.contains_key(&mapping.course_outcome_id)
            || !state
                .program_outcomes
                .contains_key(&mapping.program_outcome_id)
        {
            return Err(RepositoryError::NotFound);
        }
        state.co_po_mappings.retain(|existing| {
            existing.course_outcome_id != mapping.course_outcome_id
                || existing.program_outcome_id != mapping.program_outcome_id
        });
        state.co_po_mappings.push(mapping);
        Ok(())
    }
}

impl ExamRepository for InMemoryAcademicStore {
    fn insert_exam(&self, exam: Exam) -> Result<Exam, RepositoryError> {
        let mut state = self.lock()?;
        if state.exams.contains_key(&exam.id) {
            return Err(RepositoryError::Conflict);
        }
        state.exams.insert(exam.id.clone(), exam.clone());
        Ok(exam)
    }

    fn update_exam(&self, exam: Exam) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.exams.get_mut(&exam.id) {
            Some(existing) => {
                *existing = exam;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_exam(&self, id: &ExamId) -> Result<Option<Exam>, RepositoryError> {
        Ok(self.lock()?.exams.get(id).cloned())
    }

    fn delete_exam(&self, id: &ExamId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.exams.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.questions.retain(|_, question| &question.exam_id != id);
        state.marks.retain(|_, mark| &mark.exam_id != id);
        Ok(())
    }

    fn exams_for_subject(&self, subject_id: &SubjectId) -> Result<Vec<Exam>, RepositoryError> {
        Ok(self
            .lock()?
            .exams
            .values()
            .filter(|exam| &exam.subject_id == subject_id)
            .cloned()
            .collect())
    }

    fn insert_question(&self, question: Question) -> Result<Question, RepositoryError> {
        let mut state = self.lock()?;
        let duplicate_number = state.questions.values().any(|existing| {
            existing.exam_id == question.exam_id && existing.number == question.number
        });
        if state.questions.contains_key(&question.id) || duplicate_number {
            return Err(RepositoryError::Conflict);
        }
        state.questions.insert(question.id.clone(), question.clone());
        Ok(question)
    }

    fn fetch_question(&self, id: &QuestionId) -> Result<Option<Question>, RepositoryError> {
        Ok(self.lock()?.questions.get(id).cloned())
    }

    fn questions_for_exam(&self, exam_id: &ExamId) -> Result<Vec<Question>, RepositoryError> {
        let mut questions: Vec<Question> = self
            .lock()?
            .questions
            .values()
            .filter(|question| &question.exam_id == exam_id)
            .cloned()
            .collect();
        questions.sort_by_key(|question| question.number);
        Ok(questions)
    }
}

impl MarkRepository for InMemoryAcademicStore {
    fn insert_marks(&self, marks: Vec<Mark>) -> Result<Vec<Mark>, RepositoryError> {
        let mut state = self.lock()?;

        let mut triples: HashSet<(ExamId, StudentId, QuestionId)> = state
            .marks
            .values()
            .map(|mark| {
                (
                    mark.exam_id.clone(),
                    mark.student_id.clone(),
                    mark.question_id.clone(),
                )
            })
            .collect();

        for mark in &marks {
            let triple = (
                mark.exam_id.clone(),
                mark.student_id.clone(),
                mark.question_id.clone(),
            );
            if state.marks.contains_key(&mark.id) || !triples.insert(triple) {
                return Err(RepositoryError::Conflict);
            }
        }

        for mark in &marks {
            state.marks.insert(mark.id.clone(), mark.clone());
        }
        Ok(marks)
    }

    fn update_mark(&self, mark: Mark) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.marks.get_mut(&mark.id) {
            Some(existing) => {
                *existing = mark;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_mark(&self, id: &MarkId) -> Result<Option<Mark>, RepositoryError> {
        Ok(self.lock()?.marks.get(id).cloned())
    }

    fn find_mark(
        &self,
        exam_id: &ExamId,
        student_id: &StudentId,
        question_id: &QuestionId,
    ) -> Result<Option<Mark>, RepositoryError> {
        Ok(self
            .lock()?
            .marks
            .values()
            .find(|mark| {
                &mark.exam_id == exam_id
                    && &mark.student_id == student_id
                    && &mark.question_id == question_id
            })
            .cloned())
    }

    fn marks_for_exam(&self, exam_id: &ExamId) -> Result<Vec<Mark>, RepositoryError> {
        Ok(self
            .lock()?
            .marks
            .values()
            .filter(|mark| &mark.exam_id == exam_id)
            .cloned()
            .collect())
    }
}

impl CatalogRepository for InMemoryAcademicStore {
    fn subject(&self, id: &SubjectId) -> Result<Option<Subject>, RepositoryError> {
        Ok(self.lock()?.subjects.get(id).cloned())
    }

    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.lock()?.students.get(id).cloned())
    }

    fn student_by_roll_number(
        &self,
        roll_number: &str,
    ) -> Result<Option<Student>, RepositoryError> {
        Ok(self
            .lock()?
            .students
            .values()
            .find(|student| student.roll_number.eq_ignore_ascii_case(roll_number.trim()))
            .cloned())
    }

    fn course_outcome(
        &self,
        id: &CourseOutcomeId,
    ) -> Result<Option<CourseOutcome>, RepositoryError> {
        Ok(self.lock()?.course_outcomes.get(id).cloned())
    }

    fn course_outcomes_for_subject(
        &self,
        subject_id: &SubjectId,
    ) -> Result<Vec<CourseOutcome>, RepositoryError> {
        let mut outcomes: Vec<CourseOutcome> = self
            .lock()?
            .course_outcomes
            .values()
            .filter(|outcome| &outcome.subject_id == subject_id)
            .cloned()
            .collect();
        outcomes.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(outcomes)
    }

    fn program_outcome(
        &self,
        id: &ProgramOutcomeId,
    ) -> Result<Option<ProgramOutcome>, RepositoryError> {
        Ok(self.lock()?.program_outcomes.get(id).cloned())
    }

    fn mappings_for_program_outcome(
        &self,
        id: &ProgramOutcomeId,
    ) -> Result<Vec<CoPoMapping>, RepositoryError> {
        Ok(self
            .lock()?
            .co_po_mappings
            .iter()
            .filter(|mapping| &mapping.program_outcome_id == id)
            .cloned()
            .collect())
    }
}

/// Audit sink that keeps every entry in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<MarkAuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn entries(&self) -> Vec<MarkAuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, entry: MarkAuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .map_err(|_| AuditError::Transport("audit mutex poisoned".to_string()))?
            .push(entry);
        Ok(())
    }
}
