//! Edit requests accepted by the write engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lines::{LineError, LineNumber, LineRange};

/// The four structural edit modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    Overwrite,
    Append,
    InsertAfterLine,
    ReplaceRange,
}

impl EditMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Append => "append",
            Self::InsertAfterLine => "insert_after_line",
            Self::ReplaceRange => "replace_range",
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditArgsError {
    #[error("insert_after_line mode requires 'line'")]
    MissingLine,
    #[error("replace_range mode requires 'start_line' and 'end_line'")]
    MissingRange,
    #[error(transparent)]
    Line(#[from] LineError),
}

/// A single edit operation together with the text it carries.
///
/// Line-addressed variants hold proof types, so an `EditOp` that exists has
/// already passed the `line >= 1` and `end >= start` checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    Overwrite { content: String },
    Append { content: String },
    InsertAfterLine { line: LineNumber, content: String },
    ReplaceRange { range: LineRange, content: String },
}

impl EditOp {
    #[must_use]
    pub const fn mode(&self) -> EditMode {
        match self {
            Self::Overwrite { .. } => EditMode::Overwrite,
            Self::Append { .. } => EditMode::Append,
            Self::InsertAfterLine { .. } => EditMode::InsertAfterLine,
            Self::ReplaceRange { .. } => EditMode::ReplaceRange,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Overwrite { content }
            | Self::Append { content }
            | Self::InsertAfterLine { content, .. }
            | Self::ReplaceRange { content, .. } => content,
        }
    }

    /// Assemble an op from the loosely-typed wire fields.
    ///
    /// Fields not used by `mode` are ignored, mirroring how the tool schema
    /// lets callers send every key with `null` values.
    pub fn from_parts(
        mode: EditMode,
        content: String,
        line: Option<usize>,
        start_line: Option<usize>,
        end_line: Option<usize>,
    ) -> Result<Self, EditArgsError> {
        match mode {
            EditMode::Overwrite => Ok(Self::Overwrite { content }),
            EditMode::Append => Ok(Self::Append { content }),
            EditMode::InsertAfterLine => {
                let line = line.ok_or(EditArgsError::MissingLine)?;
                Ok(Self::InsertAfterLine {
                    line: LineNumber::new(line)?,
                    content,
                })
            }
            EditMode::ReplaceRange => match (start_line, end_line) {
                (Some(start), Some(end)) => Ok(Self::ReplaceRange {
                    range: LineRange::from_raw(start, end)?,
                    content,
                }),
                _ => Err(EditArgsError::MissingRange),
            },
        }
    }
}

/// A validated write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub op: EditOp,
    /// Hash the caller last observed; a mismatch with the on-disk content is a conflict.
    pub base_sha256: Option<String>,
    pub make_backup: bool,
}

impl EditRequest {
    #[must_use]
    pub fn new(op: EditOp) -> Self {
        Self {
            op,
            base_sha256: None,
            make_backup: false,
        }
    }

    #[must_use]
    pub fn with_base_sha256(mut self, hash: impl Into<String>) -> Self {
        self.base_sha256 = Some(hash.into());
        self
    }

    #[must_use]
    pub fn with_backup(mut self, make_backup: bool) -> Self {
        self.make_backup = make_backup;
        self
    }

    /// The optimistic-lock hash, if one was meaningfully supplied.
    ///
    /// Blank strings count as absent.
    #[must_use]
    pub fn base_hash(&self) -> Option<&str> {
        self.base_sha256
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}
