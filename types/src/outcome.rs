//! Terminal outcomes of a single read or write call.
//!
//! Each variant carries exactly the fields that branch guarantees, so a caller
//! matching on `Applied` can never observe a missing hash or diff.

use serde::{Deserialize, Serialize};

/// Which lines of the new file an edit touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditSummary {
    pub description: String,
    pub affected_lines: Vec<usize>,
}

impl EditSummary {
    /// Summary covering `count` consecutive lines starting at `first` (1-based).
    #[must_use]
    pub fn span(description: impl Into<String>, first: usize, count: usize) -> Self {
        Self {
            description: description.into(),
            affected_lines: (first..first + count).collect(),
        }
    }
}

/// A successfully read (possibly sliced) file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileView {
    /// Path relative to the sandbox root.
    pub path: String,
    pub total_lines: usize,
    /// Hash of the whole file, not of the returned slice.
    pub sha256: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Ok(FileView),
    NotFound { path: String },
    Error { message: String },
}

/// A persisted edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    pub path: String,
    pub new_sha256: String,
    pub diff_unified: String,
    pub summaries: Vec<EditSummary>,
    /// Whether the file did not exist before this call.
    pub created: bool,
    /// Root-relative path of the `.bak` snapshot, when one was written.
    pub backup_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied(AppliedEdit),
    Conflict {
        path: String,
        expected: String,
        actual: String,
    },
    NoOp {
        path: String,
    },
    Error {
        path: Option<String>,
        message: String,
    },
}
