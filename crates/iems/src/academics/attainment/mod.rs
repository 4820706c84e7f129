//! Converts per-question marks into student totals and CO/PO attainment.
//!
//! Every result is recomputed from the store on each call, so a mark edit is
//! reflected on the next read without any cache invalidation.

mod export;
mod results;
mod settings;
mod strategy;

pub use export::write_subject_attainment_csv;
pub use results::{
    CoAttainment, PoAttainment, PoContribution, StudentOutcomeScore, StudentTotal,
    SubjectAttainment,
};
pub use settings::{AttainmentSettings, ComponentWeights};
pub use strategy::{aggregate, AggregationMethod, AssessmentScore};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::domain::{
    CourseOutcome, CourseOutcomeId, ExamId, ExamType, ProgramOutcomeId, Question, QuestionId,
    StudentId, Subject, SubjectId,
};
use super::error::AcademicError;
use super::repository::AcademicStore;
use strategy::mean;

/// Marks of one exam, grouped by student, plus the exam's questions.
struct Assessment {
    exam_type: ExamType,
    questions: Vec<Question>,
    marks: BTreeMap<StudentId, BTreeMap<QuestionId, f64>>,
}

pub struct AttainmentCalculator<S> {
    store: Arc<S>,
    settings: AttainmentSettings,
}

impl<S> AttainmentCalculator<S>
where
    S: AcademicStore + 'static,
{
    pub fn new(store: Arc<S>, settings: AttainmentSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &AttainmentSettings {
        &self.settings
    }

    pub fn calculate_student_total(
        &self,
        student_id: &StudentId,
        exam_id: &ExamId,
    ) -> Result<StudentTotal, AcademicError> {
        let exam = self
            .store
            .fetch_exam(exam_id)?
            .ok_or_else(|| AcademicError::not_found("exam", exam_id))?;
        self.store
            .student(student_id)?
            .ok_or_else(|| AcademicError::not_found("student", student_id))?;

        let questions = self.store.questions_for_exam(&exam.id)?;
        let marks: BTreeMap<QuestionId, f64> = self
            .store
            .marks_for_exam(&exam.id)?
            .into_iter()
            .filter(|mark| &mark.student_id == student_id)
            .map(|mark| (mark.question_id, mark.value))
            .collect();

        Ok(student_total(student_id, &exam.id, &questions, &marks))
    }

    pub fn calculate_co_attainment(
        &self,
        subject_id: &SubjectId,
        course_outcome_id: &CourseOutcomeId,
        exam_type: Option<ExamType>,
    ) -> Result<CoAttainment, AcademicError> {
        let subject = self.subject(subject_id)?;
        let outcome = self
            .store
            .course_outcome(course_outcome_id)?
            .filter(|outcome| &outcome.subject_id == subject_id)
            .ok_or_else(|| AcademicError::not_found("course outcome", course_outcome_id))?;

        let assessments = self.load_assessments(&subject, exam_type)?;
        Ok(evaluate_outcome(
            &subject,
            &outcome,
            exam_type,
            &assessments,
            &self.settings,
        ))
    }

    /// Attainment of every course outcome of a subject, in code order.
    pub fn calculate_subject_attainment(
        &self,
        subject_id: &SubjectId,
        exam_type: Option<ExamType>,
    ) -> Result<SubjectAttainment, AcademicError> {
        let subject = self.subject(subject_id)?;
        let assessments = self.load_assessments(&subject, exam_type)?;
        let course_outcomes = self
            .store
            .course_outcomes_for_subject(subject_id)?
            .iter()
            .map(|outcome| {
                evaluate_outcome(&subject, outcome, exam_type, &assessments, &self.settings)
            })
            .collect();

        Ok(SubjectAttainment {
            subject_id: subject.id.clone(),
            subject_code: subject.code.clone(),
            exam_type,
            course_outcomes,
        })
    }

    pub fn calculate_po_attainment(
        &self,
        program_outcome_id: &ProgramOutcomeId,
    ) -> Result<PoAttainment, AcademicError> {
        let program_outcome = self
            .store
            .program_outcome(program_outcome_id)?
            .ok_or_else(|| AcademicError::not_found("program outcome", program_outcome_id))?;

        let mut mappings = self
            .store
            .mappings_for_program_outcome(program_outcome_id)?;
        mappings.sort_by(|left, right| left.course_outcome_id.cmp(&right.course_outcome_id));

        let mut contributing = Vec::new();
        for mapping in mappings {
            let outcome = self
                .store
                .course_outcome(&mapping.course_outcome_id)?
                .ok_or_else(|| {
                    AcademicError::not_found("course outcome", &mapping.course_outcome_id)
                })?;
            let subject = self.subject(&outcome.subject_id)?;
            let assessments = self.load_assessments(&subject, None)?;
            let attainment =
                evaluate_outcome(&subject, &outcome, None, &assessments, &self.settings);

            if attainment.has_data() {
                contributing.push((mapping.strength.level(), attainment));
            }
        }

        let strength_total: u32 = contributing
            .iter()
            .map(|(strength, _)| u32::from(*strength))
            .sum();

        let contributions: Vec<PoContribution> = contributing
            .into_iter()
            .map(|(strength, attainment)| PoContribution {
                course_outcome_id: attainment.course_outcome_id,
                code: attainment.code,
                strength,
                weight: f64::from(strength) / f64::from(strength_total),
                attainment_percentage: attainment.attainment_percentage,
            })
            .collect();

        let attainment_percentage = contributions
            .iter()
            .map(|contribution| contribution.weight * contribution.attainment_percentage)
            .sum::<f64>();

        debug!(
            program_outcome = %program_outcome.id,
            contributors = contributions.len(),
            attainment_percentage,
            "program outcome attainment computed"
        );

        Ok(PoAttainment {
            target_met: !contributions.is_empty()
                && attainment_percentage >= program_outcome.target_percentage,
            program_outcome_id: program_outcome.id,
            code: program_outcome.code,
            target_percentage: program_outcome.target_percentage,
            attainment_percentage,
            contributions,
        })
    }

    fn subject(&self, subject_id: &SubjectId) -> Result<Subject, AcademicError> {
        self.store
            .subject(subject_id)?
            .ok_or_else(|| AcademicError::not_found("subject", subject_id))
    }

    fn load_assessments(
        &self,
        subject: &Subject,
        exam_type: Option<ExamType>,
    ) -> Result<Vec<Assessment>, AcademicError> {
        let mut exams = self.store.exams_for_subject(&subject.id)?;
        exams.retain(|exam| exam_type.map_or(true, |wanted| exam.exam_type == wanted));
        exams.sort_by(|left, right| left.id.cmp(&right.id));

        let mut assessments = Vec::with_capacity(exams.len());
        for exam in exams {
            let questions = self.store.questions_for_exam(&exam.id)?;
            let mut marks: BTreeMap<StudentId, BTreeMap<QuestionId, f64>> = BTreeMap::new();
            for mark in self.store.marks_for_exam(&exam.id)? {
                marks
                    .entry(mark.student_id)
                    .or_default()
                    .insert(mark.question_id, mark.value);
            }

            assessments.push(Assessment {
                exam_type: exam.exam_type,
                questions,
                marks,
            });
        }

        Ok(assessments)
    }
}

/// Required questions always count; optional ones only when attempted.
pub(crate) fn student_total(
    student_id: &StudentId,
    exam_id: &ExamId,
    questions: &[Question],
    marks: &BTreeMap<QuestionId, f64>,
) -> StudentTotal {
    let mut obtained = 0.0;
    let mut maximum = 0.0;
    let mut questions_counted = 0;
    let mut questions_skipped = 0;

    for question in questions {
        match marks.get(&question.id) {
            Some(value) => {
                obtained += value;
                maximum += question.max_marks;
                questions_counted += 1;
            }
            None if question.required => {
                maximum += question.max_marks;
                questions_counted += 1;
            }
            None => questions_skipped += 1,
        }
    }

    StudentTotal {
        student_id: student_id.clone(),
        exam_id: exam_id.clone(),
        obtained,
        maximum,
        percentage: percentage(obtained, maximum),
        questions_counted,
        questions_skipped,
    }
}

/// Weighted CO percentage for one student on one assessment, or `None` when
/// no mapped question counts for that student.
pub(crate) fn outcome_percentage(
    mapped: &[(&Question, f64)],
    marks: &BTreeMap<QuestionId, f64>,
) -> Option<f64> {
    let mut obtained = 0.0;
    let mut maximum = 0.0;

    for (question, weight) in mapped {
        let attempted = marks.get(&question.id).copied();
        if attempted.is_none() && !question.required {
            continue;
        }
        obtained += attempted.unwrap_or(0.0) * weight;
        maximum += question.max_marks * weight;
    }

    if maximum > 0.0 {
        Some(obtained / maximum * 100.0)
    } else {
        None
    }
}

fn evaluate_outcome(
    subject: &Subject,
    outcome: &CourseOutcome,
    exam_type: Option<ExamType>,
    assessments: &[Assessment],
    settings: &AttainmentSettings,
) -> CoAttainment {
    let method = subject.calculation_method.unwrap_or(settings.method);

    let mut per_student: BTreeMap<&StudentId, Vec<AssessmentScore>> = BTreeMap::new();
    for assessment in assessments {
        let mapped: Vec<(&Question, f64)> = assessment
            .questions
            .iter()
            .filter_map(|question| {
                question
                    .weight_for(&outcome.id)
                    .map(|weight| (question, weight))
            })
            .collect();
        if mapped.is_empty() {
            continue;
        }

        // Students without a single mark on this exam are absent from `marks`
        // and so contribute nothing for it.
        for (student_id, marks) in &assessment.marks {
            if let Some(percentage) = outcome_percentage(&mapped, marks) {
                per_student.entry(student_id).or_default().push(AssessmentScore {
                    exam_type: assessment.exam_type,
                    percentage,
                });
            }
        }
    }

    let target = outcome
        .target_percentage
        .unwrap_or(settings.default_co_target);
    let students: Vec<StudentOutcomeScore> = per_student
        .into_iter()
        .filter_map(|(student_id, scores)| {
            aggregate(
                method,
                &scores,
                &settings.weights,
                &subject.assessment_weights,
            )
            .map(|percentage| StudentOutcomeScore {
                student_id: student_id.clone(),
                percentage,
                assessments: scores.len(),
                meets_target: percentage >= target,
            })
        })
        .collect();

    let students_assessed = students.len();
    let students_meeting_target = students.iter().filter(|score| score.meets_target).count();
    let attainment_percentage =
        mean(students.iter().map(|score| score.percentage)).unwrap_or(0.0);

    CoAttainment {
        subject_id: subject.id.clone(),
        course_outcome_id: outcome.id.clone(),
        code: outcome.code.clone(),
        exam_type,
        method,
        target_percentage: target,
        attainment_percentage,
        students_assessed,
        students_meeting_target,
        meeting_target_percentage: percentage(
            students_meeting_target as f64,
            students_assessed as f64,
        ),
        target_met: students_assessed > 0 && attainment_percentage >= target,
        students,
    }
}

fn percentage(obtained: f64, maximum: f64) -> f64 {
    if maximum > 0.0 {
        obtained / maximum * 100.0
    } else {
        0.0
    }
}
