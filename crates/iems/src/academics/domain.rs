use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attainment::AggregationMethod;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for exams.
    ExamId
);
identifier!(QuestionId);
identifier!(MarkId);
identifier!(StudentId);
identifier!(SubjectId);
identifier!(DepartmentId);
identifier!(
    /// Identifier wrapper for course outcomes (COs).
    CourseOutcomeId
);
identifier!(
    /// Identifier wrapper for program outcomes (POs).
    ProgramOutcomeId
);

/// Assessment category an exam contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamType {
    Internal1,
    Internal2,
    External,
    Assignment,
}

impl ExamType {
    pub const fn label(self) -> &'static str {
        match self {
            ExamType::Internal1 => "internal1",
            ExamType::Internal2 => "internal2",
            ExamType::External => "external",
            ExamType::Assignment => "assignment",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "internal1" | "internal_1" => Some(Self::Internal1),
            "internal2" | "internal_2" => Some(Self::Internal2),
            "external" => Some(Self::External),
            "assignment" => Some(Self::Assignment),
            _ => None,
        }
    }

    /// Half of the internal/external split this assessment feeds.
    pub const fn component(self) -> AssessmentComponent {
        match self {
            ExamType::External => AssessmentComponent::External,
            ExamType::Internal1 | ExamType::Internal2 | ExamType::Assignment => {
                AssessmentComponent::Internal
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentComponent {
    Internal,
    External,
}

/// Lifecycle status of an exam. Transitions live in `lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExamStatus {
    Draft,
    Active,
    Locked,
    Published,
}

impl ExamStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ExamStatus::Draft => "DRAFT",
            ExamStatus::Active => "ACTIVE",
            ExamStatus::Locked => "LOCKED",
            ExamStatus::Published => "PUBLISHED",
        }
    }
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub subject_id: SubjectId,
    pub name: String,
    pub exam_type: ExamType,
    pub status: ExamStatus,
    pub total_marks: f64,
    pub duration_minutes: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Request payload for drafting a new exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExam {
    pub subject_id: SubjectId,
    pub name: String,
    pub exam_type: ExamType,
    pub total_marks: f64,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Share of a question credited to one course outcome, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoWeight {
    pub course_outcome_id: CourseOutcomeId,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub exam_id: ExamId,
    pub number: u32,
    pub max_marks: f64,
    pub section: String,
    pub bloom_level: BloomLevel,
    pub difficulty: Difficulty,
    /// Optional questions only count towards totals when attempted.
    pub required: bool,
    pub co_weights: Vec<CoWeight>,
}

impl Question {
    /// Combined weight this question carries for `outcome`, if mapped.
    pub fn weight_for(&self, outcome: &CourseOutcomeId) -> Option<f64> {
        let total: f64 = self
            .co_weights
            .iter()
            .filter(|weight| &weight.course_outcome_id == outcome)
            .map(|weight| weight.percentage)
            .sum();

        if total > 0.0 {
            Some(total)
        } else {
            None
        }
    }
}

/// Request payload for adding a question to a draft exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub number: u32,
    pub max_marks: f64,
    #[serde(default)]
    pub section: String,
    pub bloom_level: BloomLevel,
    pub difficulty: Difficulty,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub co_weights: Vec<CoWeight>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub id: MarkId,
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub question_id: QuestionId,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One (student, question, value) row submitted for entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkEntry {
    pub student_id: StudentId,
    pub question_id: QuestionId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub roll_number: String,
    pub name: String,
    pub department_id: DepartmentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub code: String,
    pub name: String,
    pub department_id: DepartmentId,
    /// Falls back to the configured default method when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_method: Option<AggregationMethod>,
    /// Per exam type weights replacing the internal/external split.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assessment_weights: BTreeMap<ExamType, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutcome {
    pub id: CourseOutcomeId,
    pub subject_id: SubjectId,
    pub code: String,
    pub description: String,
    /// Falls back to the configured default CO target when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramOutcome {
    pub id: ProgramOutcomeId,
    pub department_id: DepartmentId,
    pub code: String,
    pub description: String,
    pub target_percentage: f64,
}

/// Correlation level between a course outcome and a program outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CoPoStrength {
    Low,
    Medium,
    High,
}

impl CoPoStrength {
    pub const fn level(self) -> u8 {
        match self {
            CoPoStrength::Low => 1,
            CoPoStrength::Medium => 2,
            CoPoStrength::High => 3,
        }
    }
}

impl TryFrom<u8> for CoPoStrength {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(format!("CO-PO strength must be 1, 2 or 3 (found {other})")),
        }
    }
}

impl From<CoPoStrength> for u8 {
    fn from(value: CoPoStrength) -> Self {
        value.level()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoPoMapping {
    pub course_outcome_id: CourseOutcomeId,
    pub program_outcome_id: ProgramOutcomeId,
    pub strength: CoPoStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Hod,
    Teacher,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hod => "hod",
            Role::Teacher => "teacher",
        }
    }

    /// Admins and heads of department may override the edit window.
    pub const fn can_override_marks(self) -> bool {
        matches!(self, Role::Admin | Role::Hod)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}
