//! JSON request and response shapes for the `read_file` / `write_file` tools.
//!
//! Responses keep the flat "status + optional fields" layout callers expect;
//! they are only ever built from a [`ReadOutcome`] or [`WriteOutcome`], so the
//! populated field set always matches the status.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::edit::{EditArgsError, EditMode, EditOp, EditRequest};
use crate::lines::{LineError, LineNumber};
use crate::outcome::{EditSummary, ReadOutcome, WriteOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
    Conflict,
    Noop,
}

/// Echo of which tool ran and on what file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMeta {
    pub function_name: String,
    pub parameters: serde_json::Value,
}

impl ToolMeta {
    #[must_use]
    pub fn new(function_name: impl Into<String>, file_path: &str) -> Self {
        Self {
            function_name: function_name.into(),
            parameters: json!({ "file_path": file_path }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadFileArgs {
    pub path: String,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub with_line_numbers: bool,
}

impl ReadFileArgs {
    /// Validate the optional bounds. Ordering is not checked: reads clamp.
    pub fn line_bounds(&self) -> Result<(Option<LineNumber>, Option<LineNumber>), LineError> {
        let start = self
            .start_line
            .map(|n| LineNumber::for_field(n, "start_line"))
            .transpose()?;
        let end = self
            .end_line
            .map(|n| LineNumber::for_field(n, "end_line"))
            .transpose()?;
        Ok((start, end))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteFileArgs {
    pub path: String,
    pub mode: EditMode,
    pub content: String,
    #[serde(default)]
    pub base_sha256: Option<String>,
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub make_backup: bool,
}

impl WriteFileArgs {
    pub fn to_request(&self) -> Result<EditRequest, EditArgsError> {
        let op = EditOp::from_parts(
            self.mode,
            self.content.clone(),
            self.line,
            self.start_line,
            self.end_line,
        )?;
        Ok(EditRequest {
            op,
            base_sha256: self.base_sha256.clone(),
            make_backup: self.make_backup,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileResponse {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ToolMeta>,
}

impl ReadFileResponse {
    #[must_use]
    pub fn from_outcome(outcome: ReadOutcome, meta: ToolMeta) -> Self {
        match outcome {
            ReadOutcome::Ok(view) => Self {
                status: Status::Ok,
                message: if view.total_lines == 0 {
                    "empty file".to_string()
                } else {
                    "success".to_string()
                },
                path: Some(view.path),
                total_lines: Some(view.total_lines),
                sha256: Some(view.sha256),
                content: Some(view.content),
                meta: Some(meta),
            },
            ReadOutcome::NotFound { path } => {
                Self::error(format!("file not found: {path}"), Some(meta))
            }
            ReadOutcome::Error { message } => Self::error(message, Some(meta)),
        }
    }

    fn error(message: impl Into<String>, meta: Option<ToolMeta>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            path: None,
            total_lines: None,
            sha256: None,
            content: None,
            meta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFileResponse {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_unified: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub summaries: Vec<EditSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ToolMeta>,
}

impl WriteFileResponse {
    #[must_use]
    pub fn from_outcome(outcome: WriteOutcome, meta: ToolMeta) -> Self {
        let bare = |status, message: &str, path| Self {
            status,
            message: message.to_string(),
            path,
            new_sha256: None,
            diff_unified: None,
            summaries: Vec::new(),
            backup_path: None,
            meta: Some(meta.clone()),
        };
        match outcome {
            WriteOutcome::Applied(edit) => Self {
                status: Status::Ok,
                message: "applied".to_string(),
                path: Some(edit.path),
                new_sha256: Some(edit.new_sha256),
                diff_unified: Some(edit.diff_unified),
                summaries: edit.summaries,
                backup_path: edit.backup_path,
                meta: Some(meta),
            },
            WriteOutcome::Conflict { path, .. } => bare(
                Status::Conflict,
                "sha mismatch (file changed on disk)",
                Some(path),
            ),
            WriteOutcome::NoOp { path } => bare(Status::Noop, "no changes", Some(path)),
            WriteOutcome::Error { path, message } => bare(Status::Error, &message, path),
        }
    }

}
