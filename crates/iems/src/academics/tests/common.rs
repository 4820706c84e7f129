use std::collections::BTreeMap;
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::academics::attainment::{AggregationMethod, AttainmentSettings};
use crate::academics::clock::FixedClock;
use crate::academics::domain::{
    Actor, BloomLevel, CoPoMapping, CoPoStrength, CoWeight, CourseOutcome, CourseOutcomeId,
    DepartmentId, Difficulty, Exam, ExamType, MarkEntry, NewExam, NewQuestion, ProgramOutcome,
    ProgramOutcomeId, Question, QuestionId, Role, Student, StudentId, Subject, SubjectId,
};
use crate::academics::marks::MarksPolicy;
use crate::academics::memory::{InMemoryAcademicStore, InMemoryAuditLog};
use crate::academics::repository::{AuditError, AuditSink, MarkAuditEntry};
use crate::academics::services::AcademicServices;

pub(super) const SUBJECT: &str = "sub-ds";
pub(super) const CO1: &str = "co-ds-1";
pub(super) const CO2: &str = "co-ds-2";
pub(super) const PO1: &str = "po-1";
pub(super) const STUDENT_A: &str = "stu-a";
pub(super) const STUDENT_B: &str = "stu-b";
pub(super) const STUDENT_C: &str = "stu-c";

pub(super) type TestServices = AcademicServices<InMemoryAcademicStore, InMemoryAuditLog>;

pub(super) struct Fixture {
    pub(super) store: Arc<InMemoryAcademicStore>,
    pub(super) audit: Arc<InMemoryAuditLog>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) services: TestServices,
}

pub(super) fn start_of_term() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn fixture() -> Fixture {
    fixture_with(MarksPolicy::default(), AttainmentSettings::default())
}

pub(super) fn fixture_with(policy: MarksPolicy, settings: AttainmentSettings) -> Fixture {
    let store = Arc::new(InMemoryAcademicStore::default());
    let audit = Arc::new(InMemoryAuditLog::default());
    let clock = Arc::new(FixedClock::new(start_of_term()));
    seed_catalog(&store);

    let services = AcademicServices::new(
        store.clone(),
        audit.clone(),
        clock.clone(),
        policy,
        settings,
    );

    Fixture {
        store,
        audit,
        clock,
        services,
    }
}

pub(super) fn fixture_with_method(method: AggregationMethod) -> Fixture {
    fixture_with(
        MarksPolicy::default(),
        AttainmentSettings {
            method,
            ..AttainmentSettings::default()
        },
    )
}

fn seed_catalog(store: &InMemoryAcademicStore) {
    seed_subject(store, SUBJECT, "CS301", None, BTreeMap::new());

    for (id, roll, name) in [
        (STUDENT_A, "CS-001", "Asha Rao"),
        (STUDENT_B, "CS-002", "Bilal Khan"),
        (STUDENT_C, "CS-003", "Chen Wei"),
    ] {
        store
            .insert_student(Student {
                id: StudentId::new(id),
                roll_number: roll.to_string(),
                name: name.to_string(),
                department_id: DepartmentId::new("dept-cse"),
            })
            .expect("student seeds");
    }

    seed_outcome(store, CO1, SUBJECT, "CO1", 70.0);
    seed_outcome(store, CO2, SUBJECT, "CO2", 60.0);

    store
        .insert_program_outcome(ProgramOutcome {
            id: ProgramOutcomeId::new(PO1),
            department_id: DepartmentId::new("dept-cse"),
            code: "PO1".to_string(),
            description: "Engineering knowledge".to_string(),
            target_percentage: 65.0,
        })
        .expect("program outcome seeds");
    map(store, CO1, PO1, CoPoStrength::High);
    map(store, CO2, PO1, CoPoStrength::Low);
}

pub(super) fn seed_subject(
    store: &InMemoryAcademicStore,
    id: &str,
    code: &str,
    method: Option<AggregationMethod>,
    assessment_weights: BTreeMap<ExamType, f64>,
) {
    store
        .insert_subject(Subject {
            id: SubjectId::new(id),
            code: code.to_string(),
            name: format!("{code} subject"),
            department_id: DepartmentId::new("dept-cse"),
            calculation_method: method,
            assessment_weights,
        })
        .expect("subject seeds");
}

pub(super) fn seed_outcome(
    store: &InMemoryAcademicStore,
    id: &str,
    subject: &str,
    code: &str,
    target: f64,
) {
    store
        .insert_course_outcome(CourseOutcome {
            id: CourseOutcomeId::new(id),
            subject_id: SubjectId::new(subject),
            code: code.to_string(),
            description: format!("{code} outcome"),
            target_percentage: Some(target),
        })
        .expect("course outcome seeds");
}

pub(super) fn map(store: &InMemoryAcademicStore, co: &str, po: &str, strength: CoPoStrength) {
    store
        .map_outcomes(CoPoMapping {
            course_outcome_id: CourseOutcomeId::new(co),
            program_outcome_id: ProgramOutcomeId::new(po),
            strength,
        })
        .expect("mapping seeds");
}

pub(super) fn question(
    number: u32,
    max_marks: f64,
    required: bool,
    weights: &[(&str, f64)],
) -> NewQuestion {
    NewQuestion {
        number,
        max_marks,
        section: "A".to_string(),
        bloom_level: BloomLevel::Apply,
        difficulty: Difficulty::Medium,
        required,
        co_weights: weights
            .iter()
            .map(|(co, percentage)| CoWeight {
                course_outcome_id: CourseOutcomeId::new(*co),
                percentage: *percentage,
            })
            .collect(),
    }
}

pub(super) fn draft_exam(fixture: &Fixture, subject: &str, exam_type: ExamType) -> Exam {
    fixture
        .services
        .exams
        .create_exam(NewExam {
            subject_id: SubjectId::new(subject),
            name: format!("{} assessment", exam_type.label()),
            exam_type,
            total_marks: 50.0,
            duration_minutes: 90,
        })
        .expect("exam drafts")
}

/// Drafts an exam with the given questions and activates it.
pub(super) fn active_exam(
    fixture: &Fixture,
    subject: &str,
    exam_type: ExamType,
    questions: Vec<NewQuestion>,
) -> (Exam, Vec<Question>) {
    let exam = draft_exam(fixture, subject, exam_type);
    let questions = questions
        .into_iter()
        .map(|draft| {
            fixture
                .services
                .exams
                .add_question(&exam.id, draft)
                .expect("question adds")
        })
        .collect();
    let exam = fixture
        .services
        .exams
        .activate(&exam.id)
        .expect("exam activates");
    (exam, questions)
}

/// Single-question exam mapped fully to `co`, with the given percentages.
pub(super) fn scored_exam(
    fixture: &Fixture,
    subject: &str,
    exam_type: ExamType,
    co: &str,
    scores: &[(&str, f64)],
) -> Exam {
    let (exam, questions) = active_exam(
        fixture,
        subject,
        exam_type,
        vec![question(1, 100.0, true, &[(co, 100.0)])],
    );
    let rows = scores
        .iter()
        .map(|(student, value)| entry(student, &questions[0].id, *value))
        .collect();
    fixture
        .services
        .marks
        .bulk_enter_marks(&exam.id, rows)
        .expect("scores enter");
    exam
}

pub(super) fn entry(student: &str, question_id: &QuestionId, value: f64) -> MarkEntry {
    MarkEntry {
        student_id: StudentId::new(student),
        question_id: question_id.clone(),
        value,
    }
}

pub(super) fn actor(role: Role) -> Actor {
    Actor {
        id: format!("{}-user", role.label()),
        role,
    }
}

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub(super) struct UnavailableAudit;

impl AuditSink for UnavailableAudit {
    fn record(&self, _entry: MarkAuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Transport("audit service offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
