//! Tool Executor Framework - core types, the path sandbox, the read/write
//! engines, and the built-in `read_file` / `write_file` tools.

pub mod builtins;
pub mod config;
mod edit;
pub mod read;
pub mod sandbox;
mod text;
pub mod write;

use std::collections::HashMap;
use std::path::PathBuf;

use quill_types::ToolMeta;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

pub use builtins::{ReadFileTool, WriteFileTool, register_builtins};
pub use read::{ReadEngine, ReadRequest};
pub use sandbox::{ResolvedPath, Sandbox};
pub use write::WriteEngine;

/// Default cap on file size for `read_file` (8 MiB).
pub const DEFAULT_MAX_FILE_READ_BYTES: usize = 8 * 1024 * 1024;
/// Default cap on the `content` argument of `write_file` (8 MiB).
pub const DEFAULT_MAX_CONTENT_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_BACKUP_SUFFIX: &str = "bak";

/// Error types for tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Bad tool args: {message}")]
    BadArgs { message: String },
    #[error("Sandbox violation: {0}")]
    SandboxViolation(DenialReason),
    #[error("file not found: {path}")]
    NotFound { path: String },
    #[error("path is a directory: {path}")]
    IsDirectory { path: String },
    #[error("Stale file: {path}: expected sha256 {expected}, found {actual}")]
    StaleFile {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("backup failed for {path}: {source}")]
    BackupFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8 text")]
    NotText { path: String },
    #[error("{message}")]
    LimitsExceeded { message: String },
    #[error("failed to encode tool response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

/// Denial reason for the path sandbox.
///
/// `attempted` is always the caller's own input; resolved host paths are kept
/// for logging and never rendered into messages returned to the caller.
#[derive(Debug, Clone)]
pub enum DenialReason {
    PathOutsideSandbox { attempted: String, resolved: PathBuf },
    DeniedPatternMatched { attempted: String, pattern: String },
    UnsafePathChars { attempted: String },
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenialReason::PathOutsideSandbox { attempted, .. } => {
                write!(f, "path escapes sandbox root: {attempted}")
            }
            DenialReason::DeniedPatternMatched { attempted, pattern } => {
                write!(f, "path '{attempted}' matched denied pattern '{pattern}'")
            }
            DenialReason::UnsafePathChars { attempted } => write!(
                f,
                "path contains invalid control characters: {}",
                attempted.escape_debug()
            ),
        }
    }
}

/// A tool callable by name through the [`ToolRegistry`].
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    fn is_side_effecting(&self, args: &Value) -> bool;
    fn approval_summary(&self, args: &Value) -> Result<String, ToolError>;
    /// Echo attached to every response, including argument errors.
    fn meta(&self, args: &Value) -> ToolMeta {
        ToolMeta::new(self.name(), path_arg(args))
    }
    /// Run the tool. `Err` is reserved for calls rejected before any file
    /// access; engine failures come back as an error-status response.
    fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

pub(crate) fn path_arg(args: &Value) -> &str {
    args.get("path").and_then(Value::as_str).unwrap_or_default()
}

/// Name, description, and argument schema of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Tool registry keyed by tool name.
#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn register(&mut self, executor: Box<dyn ToolExecutor>) -> Result<(), ToolError> {
        let name = executor.name().to_string();
        if self.executors.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.executors.insert(name, executor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn ToolExecutor, ToolError> {
        self.executors
            .get(name)
            .map(std::convert::AsRef::as_ref)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .executors
            .values()
            .map(|exec| ToolDefinition {
                name: exec.name().to_string(),
                description: exec.description().to_string(),
                parameters: exec.schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Validate and run a tool call. Never fails: every rejection is rendered
    /// as a `{"status": "error", ...}` response.
    pub fn dispatch(&self, name: &str, args: Value) -> Value {
        let exec = match self.lookup(name) {
            Ok(exec) => exec,
            Err(err) => {
                warn!(tool = name, "Unknown tool requested");
                return error_response(&err, None);
            }
        };
        let meta = exec.meta(&args);

        if let Err(err) = validate_args(&exec.schema(), &args) {
            warn!(tool = name, error = %err, "Tool args failed schema validation");
            return error_response(&err, Some(meta));
        }
        if exec.is_side_effecting(&args)
            && let Ok(summary) = exec.approval_summary(&args)
        {
            info!(tool = name, "{summary}");
        }

        match exec.execute(args) {
            Ok(response) => response,
            Err(err) => {
                warn!(tool = name, error = %err, "Tool call rejected");
                error_response(&err, Some(meta))
            }
        }
    }
}

fn error_response(err: &ToolError, meta: Option<ToolMeta>) -> Value {
    let mut response = serde_json::json!({
        "status": "error",
        "message": err.to_string(),
    });
    if let (Some(meta), Some(obj)) = (meta, response.as_object_mut())
        && let Ok(meta) = serde_json::to_value(meta)
    {
        obj.insert("meta".to_string(), meta);
    }
    response
}

/// Tool-specific limits for `read_file`.
#[derive(Debug, Clone, Copy)]
pub struct ReadFileLimits {
    pub max_file_read_bytes: usize,
}

impl Default for ReadFileLimits {
    fn default() -> Self {
        Self {
            max_file_read_bytes: DEFAULT_MAX_FILE_READ_BYTES,
        }
    }
}

/// Tool-specific limits and persistence policy for `write_file`.
#[derive(Debug, Clone)]
pub struct WriteFileLimits {
    pub max_content_bytes: usize,
    /// Backup file is `<file>.<backup_suffix>`.
    pub backup_suffix: String,
    /// Sync the temp file to disk before renaming it into place.
    pub fsync: bool,
}

impl Default for WriteFileLimits {
    fn default() -> Self {
        Self {
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            fsync: true,
        }
    }
}

/// Aggregated tool settings derived from config.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub sandbox: Sandbox,
    pub read_limits: ReadFileLimits,
    pub write_limits: WriteFileLimits,
}

/// Validate arguments against a JSON schema.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ToolError::BadArgs {
        message: format!("Invalid tool schema: {e}"),
    })?;
    let result = validator.validate(args);
    if let Err(err) = result {
        return Err(ToolError::BadArgs {
            message: err.to_string(),
        });
    }
    Ok(())
}
