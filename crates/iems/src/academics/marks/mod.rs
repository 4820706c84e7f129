mod import;
mod service;

pub use import::{parse_upload, MarkUploadRow};
pub use service::{MarkUpdate, MarksService};

use serde::{Deserialize, Serialize};

/// Rules governing when recorded marks may still change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarksPolicy {
    /// Days after entry during which edits need no override.
    pub edit_window_days: u32,
}

impl MarksPolicy {
    pub const DEFAULT_EDIT_WINDOW_DAYS: u32 = 7;
}

impl Default for MarksPolicy {
    fn default() -> Self {
        Self {
            edit_window_days: Self::DEFAULT_EDIT_WINDOW_DAYS,
        }
    }
}
