use serde::Serialize;

use super::strategy::AggregationMethod;
use crate::academics::domain::{
    CourseOutcomeId, ExamId, ExamType, ProgramOutcomeId, StudentId, SubjectId,
};

/// Obtained versus maximum marks for one student on one exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentTotal {
    pub student_id: StudentId,
    pub exam_id: ExamId,
    pub obtained: f64,
    pub maximum: f64,
    pub percentage: f64,
    pub questions_counted: usize,
    /// Optional questions the student did not attempt.
    pub questions_skipped: usize,
}

/// Aggregated score of one student against a course outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentOutcomeScore {
    pub student_id: StudentId,
    pub percentage: f64,
    pub assessments: usize,
    pub meets_target: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoAttainment {
    pub subject_id: SubjectId,
    pub course_outcome_id: CourseOutcomeId,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<ExamType>,
    pub method: AggregationMethod,
    pub target_percentage: f64,
    /// Mean of the per-student aggregates.
    pub attainment_percentage: f64,
    pub students_assessed: usize,
    pub students_meeting_target: usize,
    pub meeting_target_percentage: f64,
    pub target_met: bool,
    pub students: Vec<StudentOutcomeScore>,
}

impl CoAttainment {
    pub fn has_data(&self) -> bool {
        self.students_assessed > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAttainment {
    pub subject_id: SubjectId,
    pub subject_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_type: Option<ExamType>,
    pub course_outcomes: Vec<CoAttainment>,
}

/// One course outcome's share of a program outcome roll-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoContribution {
    pub course_outcome_id: CourseOutcomeId,
    pub code: String,
    pub strength: u8,
    /// Strength normalized across contributing course outcomes.
    pub weight: f64,
    pub attainment_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoAttainment {
    pub program_outcome_id: ProgramOutcomeId,
    pub code: String,
    pub target_percentage: f64,
    pub attainment_percentage: f64,
    pub target_met: bool,
    pub contributions: Vec<PoContribution>,
}
