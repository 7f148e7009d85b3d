//! Line-range file reads.

use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

use quill_types::{FileView, LineNumber, ReadOutcome};
use quill_utils::sha256_hex;
use tracing::{debug, warn};

use crate::sandbox::{ResolvedPath, Sandbox};
use crate::{ReadFileLimits, ToolError};

/// Optional slice and formatting for a read. Bounds are clamped, never rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadRequest {
    pub start_line: Option<LineNumber>,
    pub end_line: Option<LineNumber>,
    pub with_line_numbers: bool,
}

/// Reads files under the sandbox root.
#[derive(Debug, Clone)]
pub struct ReadEngine {
    sandbox: Arc<Sandbox>,
    limits: ReadFileLimits,
}

impl ReadEngine {
    #[must_use]
    pub fn new(sandbox: Arc<Sandbox>, limits: ReadFileLimits) -> Self {
        Self { sandbox, limits }
    }

    /// Read `path`, optionally sliced. A missing file is `NotFound`, not an error.
    ///
    /// The returned hash always covers the whole file so it can be fed back as
    /// `base_sha256` on a later write.
    pub fn read(&self, path: &str, request: ReadRequest) -> ReadOutcome {
        match self.try_read(path, request) {
            Ok(view) => ReadOutcome::Ok(view),
            Err(ToolError::NotFound { path }) => {
                debug!(path = %path, "Read target does not exist");
                ReadOutcome::NotFound { path }
            }
            Err(err) => {
                warn!(path, error = %err, "Read failed");
                ReadOutcome::Error {
                    message: err.to_string(),
                }
            }
        }
    }

    fn try_read(&self, path: &str, request: ReadRequest) -> Result<FileView, ToolError> {
        let resolved = self.sandbox.resolve(path)?;
        let text = self.load(&resolved)?;
        let sha256 = sha256_hex(text.as_bytes());

        let lines: Vec<&str> = text.lines().collect();
        let total_lines = lines.len();
        if total_lines == 0 {
            return Ok(FileView {
                path: resolved.relative().to_string(),
                total_lines,
                sha256,
                content: String::new(),
            });
        }

        let start = request
            .start_line
            .map_or(1, |line| line.clamp_to(total_lines));
        let end = request
            .end_line
            .map_or(total_lines, |line| line.clamp_to(total_lines))
            .max(start);
        let slice = &lines[start - 1..end];

        let content = if request.with_line_numbers {
            format_with_line_numbers(slice, start)
        } else {
            slice.join("\n")
        };

        debug!(
            path = %resolved,
            start,
            end,
            total_lines,
            "Read file"
        );
        Ok(FileView {
            path: resolved.relative().to_string(),
            total_lines,
            sha256,
            content,
        })
    }

    fn load(&self, resolved: &ResolvedPath) -> Result<String, ToolError> {
        let rel = resolved.relative();
        let meta = match fs::metadata(resolved.absolute()) {
            Ok(meta) => meta,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(ToolError::NotFound {
                    path: rel.to_string(),
                });
            }
            Err(source) => {
                return Err(ToolError::Io {
                    action: "failed to stat",
                    path: rel.to_string(),
                    source,
                });
            }
        };
        if meta.is_dir() {
            return Err(ToolError::IsDirectory {
                path: rel.to_string(),
            });
        }
        if meta.len() > self.limits.max_file_read_bytes as u64 {
            return Err(ToolError::LimitsExceeded {
                message: format!(
                    "{rel} is {} bytes, over the {} byte read limit",
                    meta.len(),
                    self.limits.max_file_read_bytes
                ),
            });
        }

        let bytes = fs::read(resolved.absolute()).map_err(|source| ToolError::Io {
            action: "failed to read",
            path: rel.to_string(),
            source,
        })?;
        String::from_utf8(bytes).map_err(|_| ToolError::NotText {
            path: rel.to_string(),
        })
    }
}

/// `"<n>: <text>"` per line, numbered from `first`, joined with `\n`.
fn format_with_line_numbers(lines: &[&str], first: usize) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{}: {line}", first + i))
        .collect::<Vec<_>>()
        .join("\n")
}
