use crate::infra::{parse_exam_type, parse_method, ApiServices};
use chrono::{Duration, Utc};
use clap::Args;
use iems::academics::attainment::write_subject_attainment_csv;
use iems::academics::{
    Actor, AggregationMethod, AttainmentSettings, BloomLevel, Clock, CoPoMapping, CoPoStrength,
    CoWeight, CourseOutcome, CourseOutcomeId, DepartmentId, Difficulty, Exam, ExamType,
    FixedClock, InMemoryAcademicStore, InMemoryAuditLog, MarkEntry, MarkUpdate, MarksPolicy,
    NewExam, NewQuestion, PoAttainment, ProgramOutcome, ProgramOutcomeId, Question, Role,
    Student, StudentId, Subject, SubjectAttainment, SubjectId,
};
use iems::academics::{AcademicError, AcademicServices};
use iems::config::AppConfig;
use iems::error::AppError;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) const SUBJECT_ID: &str = "sub-cs301";
const DEPARTMENT_ID: &str = "dept-cse";

const STUDENTS: [(&str, &str, &str); 6] = [
    ("stu-001", "CSE-2023-001", "Aarav Mehta"),
    ("stu-002", "CSE-2023-002", "Diya Iyer"),
    ("stu-003", "CSE-2023-003", "Kabir Singh"),
    ("stu-004", "CSE-2023-004", "Meera Nair"),
    ("stu-005", "CSE-2023-005", "Rohan Das"),
    ("stu-006", "CSE-2023-006", "Sana Qureshi"),
];

/// Share of each question's marks the synthetic cohort scores, by student.
const PERFORMANCE: [f64; 6] = [0.92, 0.81, 0.74, 0.66, 0.58, 0.45];

const COURSE_OUTCOMES: [(&str, &str, &str); 3] = [
    ("co-cs301-1", "CO1", "Analyse the time and space complexity of algorithms"),
    ("co-cs301-2", "CO2", "Implement linear and non-linear data structures"),
    ("co-cs301-3", "CO3", "Select data structures for engineering problems"),
];

const PROGRAM_OUTCOMES: [(&str, &str, &str, f64); 2] = [
    ("po-1", "PO1", "Engineering knowledge", 65.0),
    ("po-2", "PO2", "Problem analysis", 60.0),
];

const MAPPINGS: [(&str, &str, CoPoStrength); 5] = [
    ("co-cs301-1", "po-1", CoPoStrength::High),
    ("co-cs301-2", "po-1", CoPoStrength::Medium),
    ("co-cs301-3", "po-1", CoPoStrength::Low),
    ("co-cs301-1", "po-2", CoPoStrength::Medium),
    ("co-cs301-3", "po-2", CoPoStrength::High),
];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Aggregation method for CO attainment (best, avg, weighted).
    #[arg(long, value_parser = parse_method)]
    pub(crate) method: Option<AggregationMethod>,
    /// Print the subject attainment as CSV instead of a table.
    #[arg(long)]
    pub(crate) csv: bool,
    /// Skip the edit window and override walk-through.
    #[arg(long)]
    pub(crate) skip_edits: bool,
}

#[derive(Args, Debug)]
pub(crate) struct AttainmentReportArgs {
    /// Marks spreadsheet (Student ID, Question No, Marks) for the demo subject.
    #[arg(long)]
    pub(crate) marks: PathBuf,
    /// Assessment the marks belong to.
    #[arg(long, value_parser = parse_exam_type, default_value = "internal1")]
    pub(crate) exam_type: ExamType,
    /// Aggregation method for CO attainment (best, avg, weighted).
    #[arg(long, value_parser = parse_method)]
    pub(crate) method: Option<AggregationMethod>,
    /// Print the subject attainment as CSV instead of a table.
    #[arg(long)]
    pub(crate) csv: bool,
}

/// Seeded catalog plus the services operating on it.
pub(crate) struct DemoCampus {
    pub(crate) audit: Arc<InMemoryAuditLog>,
    pub(crate) services: Arc<ApiServices>,
}

impl DemoCampus {
    pub(crate) fn seed(
        clock: Arc<dyn Clock>,
        policy: MarksPolicy,
        settings: AttainmentSettings,
    ) -> Result<Self, AcademicError> {
        let store = Arc::new(InMemoryAcademicStore::default());
        let audit = Arc::new(InMemoryAuditLog::default());
        seed_catalog(&store)?;

        let services = Arc::new(AcademicServices::new(
            store,
            audit.clone(),
            clock,
            policy,
            settings,
        ));

        Ok(Self { audit, services })
    }

    /// Internal assessment worth 50 marks, with one optional question.
    pub(crate) fn draft_internal(
        &self,
        exam_type: ExamType,
    ) -> Result<(Exam, Vec<Question>), AcademicError> {
        self.draft_exam(
            exam_type,
            50.0,
            vec![
                demo_question(1, 10.0, true, &[("co-cs301-1", 100.0)]),
                demo_question(2, 15.0, true, &[("co-cs301-2", 100.0)]),
                demo_question(3, 15.0, true, &[("co-cs301-2", 50.0), ("co-cs301-3", 50.0)]),
                demo_question(4, 10.0, false, &[("co-cs301-3", 100.0)]),
            ],
        )
    }

    pub(crate) fn draft_external(&self) -> Result<(Exam, Vec<Question>), AcademicError> {
        self.draft_exam(
            ExamType::External,
            100.0,
            vec![
                demo_question(1, 30.0, true, &[("co-cs301-1", 100.0)]),
                demo_question(2, 40.0, true, &[("co-cs301-2", 60.0), ("co-cs301-3", 40.0)]),
                demo_question(3, 30.0, true, &[("co-cs301-3", 100.0)]),
            ],
        )
    }

    /// Drafts, scores, locks, and publishes the internal and external exams.
    pub(crate) fn run_assessments(&self) -> Result<Vec<Exam>, AcademicError> {
        let internal = self.draft_internal(ExamType::Internal1)?;
        let external = self.draft_external()?;

        let mut published = Vec::new();
        for ((exam, questions), uplift) in [(internal, 0.0), (external, 0.05)] {
            self.services.exams.activate(&exam.id)?;
            self.services
                .marks
                .bulk_enter_marks(&exam.id, synthetic_marks(&questions, uplift))?;
            self.services.exams.lock(&exam.id)?;
            published.push(self.services.exams.publish(&exam.id)?);
        }
        Ok(published)
    }

    pub(crate) fn report(&self) -> Result<AttainmentReport, AcademicError> {
        let subject_id = SubjectId::new(SUBJECT_ID);
        let subject = self
            .services
            .attainment
            .calculate_subject_attainment(&subject_id, None)?;
        let program_outcomes = PROGRAM_OUTCOMES
            .iter()
            .map(|(id, ..)| {
                self.services
                    .attainment
                    .calculate_po_attainment(&ProgramOutcomeId::new(*id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AttainmentReport {
            subject,
            program_outcomes,
        })
    }

    fn draft_exam(
        &self,
        exam_type: ExamType,
        total_marks: f64,
        questions: Vec<NewQuestion>,
    ) -> Result<(Exam, Vec<Question>), AcademicError> {
        let exam = self.services.exams.create_exam(NewExam {
            subject_id: SubjectId::new(SUBJECT_ID),
            name: format!("CS301 {} assessment", exam_type.label()),
            exam_type,
            total_marks,
            duration_minutes: if total_marks > 50.0 { 180 } else { 90 },
        })?;
        let questions = questions
            .into_iter()
            .map(|draft| self.services.exams.add_question(&exam.id, draft))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((exam, questions))
    }
}

#[derive(Debug)]
pub(crate) struct AttainmentReport {
    pub(crate) subject: SubjectAttainment,
    pub(crate) program_outcomes: Vec<PoAttainment>,
}

pub(crate) fn seed_catalog(store: &InMemoryAcademicStore) -> Result<(), AcademicError> {
    store.insert_subject(Subject {
        id: SubjectId::new(SUBJECT_ID),
        code: "CS301".to_string(),
        name: "Data Structures".to_string(),
        department_id: DepartmentId::new(DEPARTMENT_ID),
        calculation_method: None,
        assessment_weights: BTreeMap::new(),
    })?;

    for (id, roll_number, name) in STUDENTS {
        store.insert_student(Student {
            id: StudentId::new(id),
            roll_number: roll_number.to_string(),
            name: name.to_string(),
            department_id: DepartmentId::new(DEPARTMENT_ID),
        })?;
    }

    for (id, code, description) in COURSE_OUTCOMES {
        store.insert_course_outcome(CourseOutcome {
            id: CourseOutcomeId::new(id),
            subject_id: SubjectId::new(SUBJECT_ID),
            code: code.to_string(),
            description: description.to_string(),
            target_percentage: None,
        })?;
    }

    for (id, code, description, target) in PROGRAM_OUTCOMES {
        store.insert_program_outcome(ProgramOutcome {
            id: ProgramOutcomeId::new(id),
            department_id: DepartmentId::new(DEPARTMENT_ID),
            code: code.to_string(),
            description: description.to_string(),
            target_percentage: target,
        })?;
    }

    for (course_outcome, program_outcome, strength) in MAPPINGS {
        store.map_outcomes(CoPoMapping {
            course_outcome_id: CourseOutcomeId::new(course_outcome),
            program_outcome_id: ProgramOutcomeId::new(program_outcome),
            strength,
        })?;
    }

    Ok(())
}

fn demo_question(
    number: u32,
    max_marks: f64,
    required: bool,
    weights: &[(&str, f64)],
) -> NewQuestion {
    NewQuestion {
        number,
        max_marks,
        section: if number <= 2 { "A" } else { "B" }.to_string(),
        bloom_level: if number <= 2 {
            BloomLevel::Understand
        } else {
            BloomLevel::Apply
        },
        difficulty: Difficulty::Medium,
        required,
        co_weights: weights
            .iter()
            .map(|(id, percentage)| CoWeight {
                course_outcome_id: CourseOutcomeId::new(*id),
                percentage: *percentage,
            })
            .collect(),
    }
}

/// Deterministic marks for the seeded cohort, rounded to half marks.
pub(crate) fn synthetic_marks(questions: &[Question], uplift: f64) -> Vec<MarkEntry> {
    let mut rows = Vec::new();
    for (student_index, (student_id, ..)) in STUDENTS.iter().enumerate() {
        for (question_index, question) in questions.iter().enumerate() {
            if !question.required && student_index % 2 == 1 {
                continue;
            }
            let dip = 0.05 * ((student_index + question_index) % 3) as f64;
            let share = (PERFORMANCE[student_index] + uplift - dip).clamp(0.0, 1.0);
            let value = ((question.max_marks * share) * 2.0).round() / 2.0;
            rows.push(MarkEntry {
                student_id: StudentId::new(*student_id),
                question_id: question.id.clone(),
                value: value.min(question.max_marks),
            });
        }
    }
    rows
}

/// Imports a marks spreadsheet into a fresh exam on the demo subject.
pub(crate) fn build_marks_report<R: Read>(
    reader: R,
    exam_type: ExamType,
    policy: MarksPolicy,
    settings: AttainmentSettings,
) -> Result<(usize, AttainmentReport), AcademicError> {
    let campus = DemoCampus::seed(Arc::new(FixedClock::new(Utc::now())), policy, settings)?;
    let (exam, _) = match exam_type {
        ExamType::External => campus.draft_external()?,
        other => campus.draft_internal(other)?,
    };
    campus.services.exams.activate(&exam.id)?;
    let imported = campus.services.marks.import_marks_csv(&exam.id, reader)?;
    campus.services.exams.lock(&exam.id)?;

    Ok((imported.len(), campus.report()?))
}

pub(crate) fn run_attainment_report(args: AttainmentReportArgs) -> Result<(), AppError> {
    let AttainmentReportArgs {
        marks,
        exam_type,
        method,
        csv,
    } = args;

    let config = AppConfig::load()?;
    let settings = with_method(config.attainment, method);
    let file = File::open(&marks)?;
    let (imported, report) = build_marks_report(file, exam_type, config.marks, settings)?;

    if csv {
        print_csv(&report.subject)?;
    } else {
        println!(
            "Imported {imported} marks from {} as {}",
            marks.display(),
            exam_type.label()
        );
        render_report(&report);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        method,
        csv,
        skip_edits,
    } = args;

    let config = AppConfig::load()?;
    let settings = with_method(config.attainment, method);
    let campus = DemoCampus::seed(
        Arc::new(FixedClock::new(Utc::now())),
        config.marks,
        settings.clone(),
    )?;

    println!("IEMS attainment demo");
    println!(
        "- {} students | {} course outcomes | {} program outcomes",
        STUDENTS.len(),
        COURSE_OUTCOMES.len(),
        PROGRAM_OUTCOMES.len()
    );

    if !skip_edits {
        walk_through_edits(config.marks, settings)?;
    }

    let exams = campus.run_assessments()?;
    for exam in &exams {
        println!("- {} ({}) is {}", exam.name, exam.id, exam.status);
    }

    let report = campus.report()?;
    if csv {
        print_csv(&report.subject)?;
    } else {
        render_report(&report);
    }
    Ok(())
}

/// Shows the edit window closing and an HOD override reopening it, on a
/// scratch campus so the walk-through exam stays out of the report.
fn walk_through_edits(
    policy: MarksPolicy,
    settings: AttainmentSettings,
) -> Result<(), AcademicError> {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let campus = DemoCampus::seed(clock.clone(), policy, settings)?;
    let (exam, questions) = campus.draft_internal(ExamType::Assignment)?;
    campus.services.exams.activate(&exam.id)?;
    let mark = campus.services.marks.enter_mark(
        &exam.id,
        MarkEntry {
            student_id: StudentId::new(STUDENTS[0].0),
            question_id: questions[0].id.clone(),
            value: 6.0,
        },
    )?;

    clock.advance(Duration::days(i64::from(policy.edit_window_days) + 1));
    println!("\nEdit window walk-through");
    let attempt = campus.services.marks.update_mark(
        &mark.id,
        MarkUpdate {
            value: 8.0,
            actor: Actor {
                id: "teacher-demo".to_string(),
                role: Role::Teacher,
            },
            override_edit: false,
            override_reason: None,
        },
    );
    let day = policy.edit_window_days + 1;
    match attempt {
        Err(err) => println!("- teacher edit on day {day}: rejected ({err})"),
        Ok(_) => println!("- teacher edit on day {day}: accepted"),
    }

    let updated = campus.services.marks.update_mark(
        &mark.id,
        MarkUpdate {
            value: 8.0,
            actor: Actor {
                id: "hod-demo".to_string(),
                role: Role::Hod,
            },
            override_edit: true,
            override_reason: Some("re-evaluation approved by HOD".to_string()),
        },
    )?;
    let audited = campus.audit.entries().len();
    println!(
        "- HOD override: mark {} is now {} ({audited} audit entries)",
        updated.id, updated.value
    );
    Ok(())
}

fn with_method(
    settings: AttainmentSettings,
    method: Option<AggregationMethod>,
) -> AttainmentSettings {
    match method {
        Some(method) => AttainmentSettings { method, ..settings },
        None => settings,
    }
}

fn print_csv(subject: &SubjectAttainment) -> Result<(), AppError> {
    write_subject_attainment_csv(subject, io::stdout().lock())
        .map_err(|err| AcademicError::Export(err.to_string()))?;
    Ok(())
}

fn render_report(report: &AttainmentReport) {
    let subject = &report.subject;
    println!("\nCourse outcome attainment for {}", subject.subject_code);
    for outcome in &subject.course_outcomes {
        println!(
            "- {} [{}]: {:.2}% vs target {:.0}% | {}/{} students at target | {}",
            outcome.code,
            outcome.method.label(),
            outcome.attainment_percentage,
            outcome.target_percentage,
            outcome.students_meeting_target,
            outcome.students_assessed,
            if outcome.target_met { "met" } else { "not met" }
        );
    }

    println!("\nProgram outcome attainment");
    for program_outcome in &report.program_outcomes {
        println!(
            "- {}: {:.2}% vs target {:.0}% | {}",
            program_outcome.code,
            program_outcome.attainment_percentage,
            program_outcome.target_percentage,
            if program_outcome.target_met {
                "met"
            } else {
                "not met"
            }
        );
        for contribution in &program_outcome.contributions {
            println!(
                "    {} strength {} (weight {:.2}) at {:.2}%",
                contribution.code,
                contribution.strength,
                contribution.weight,
                contribution.attainment_percentage
            );
        }
    }
}
