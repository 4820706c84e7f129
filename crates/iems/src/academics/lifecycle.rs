//! Exam lifecycle: DRAFT -> ACTIVE -> LOCKED -> PUBLISHED.
//!
//! Transitions never skip a state and never move backwards. The predicates on
//! [`ExamStatus`] decide which marks and question operations each state allows.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Exam, ExamStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamTransition {
    Activate,
    Lock,
    Publish,
}

impl ExamTransition {
    pub const fn label(self) -> &'static str {
        match self {
            ExamTransition::Activate => "activate",
            ExamTransition::Lock => "lock",
            ExamTransition::Publish => "publish",
        }
    }

    pub const fn source(self) -> ExamStatus {
        match self {
            ExamTransition::Activate => ExamStatus::Draft,
            ExamTransition::Lock => ExamStatus::Active,
            ExamTransition::Publish => ExamStatus::Locked,
        }
    }

    pub const fn target(self) -> ExamStatus {
        match self {
            ExamTransition::Activate => ExamStatus::Active,
            ExamTransition::Lock => ExamStatus::Locked,
            ExamTransition::Publish => ExamStatus::Published,
        }
    }
}

impl fmt::Display for ExamTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {transition} an exam in {from} state (requires {})", .transition.source())]
pub struct InvalidStateTransition {
    pub from: ExamStatus,
    pub transition: ExamTransition,
}

impl ExamStatus {
    pub fn apply(self, transition: ExamTransition) -> Result<ExamStatus, InvalidStateTransition> {
        if self == transition.source() {
            Ok(transition.target())
        } else {
            Err(InvalidStateTransition {
                from: self,
                transition,
            })
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ExamStatus::Published)
    }

    pub const fn accepts_questions(self) -> bool {
        matches!(self, ExamStatus::Draft)
    }

    pub const fn accepts_new_marks(self) -> bool {
        matches!(self, ExamStatus::Active)
    }

    /// Overrides reach every state before publication.
    pub const fn accepts_mark_updates(self, override_edit: bool) -> bool {
        match self {
            ExamStatus::Active => true,
            ExamStatus::Draft | ExamStatus::Locked => override_edit,
            ExamStatus::Published => false,
        }
    }
}

impl Exam {
    pub fn activate(&mut self, at: DateTime<Utc>) -> Result<(), InvalidStateTransition> {
        self.transition(ExamTransition::Activate, at)
    }

    pub fn lock(&mut self, at: DateTime<Utc>) -> Result<(), InvalidStateTransition> {
        self.transition(ExamTransition::Lock, at)
    }

    pub fn publish(&mut self, at: DateTime<Utc>) -> Result<(), InvalidStateTransition> {
        self.transition(ExamTransition::Publish, at)
    }

    pub fn transition(
        &mut self,
        transition: ExamTransition,
        at: DateTime<Utc>,
    ) -> Result<(), InvalidStateTransition> {
        self.status = self.status.apply(transition)?;
        match transition {
            ExamTransition::Activate => self.activated_at = Some(at),
            ExamTransition::Lock => self.locked_at = Some(at),
            ExamTransition::Publish => self.published_at = Some(at),
        }
        Ok(())
    }
}
