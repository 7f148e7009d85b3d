//! Built-in tool implementations.

use std::sync::Arc;

use quill_types::{
    EditMode, ReadFileArgs, ReadFileResponse, ToolMeta, WriteFileArgs, WriteFileResponse,
};
use serde_json::Value;

use super::{
    ReadEngine, ReadRequest, Sandbox, ToolError, ToolExecutor, ToolRegistry, ToolSettings,
    WriteEngine, parse_args, path_arg,
};

pub struct ReadFileTool {
    engine: ReadEngine,
}

pub struct WriteFileTool {
    engine: WriteEngine,
}

impl ReadFileTool {
    #[must_use]
    pub fn new(engine: ReadEngine) -> Self {
        Self { engine }
    }
}

impl WriteFileTool {
    #[must_use]
    pub fn new(engine: WriteEngine) -> Self {
        Self { engine }
    }
}

fn require_path(path: &str) -> Result<(), ToolError> {
    if path.trim().is_empty() {
        return Err(ToolError::BadArgs {
            message: "path must not be empty".to_string(),
        });
    }
    Ok(())
}

impl ToolExecutor for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a text file under the workspace root, optionally by line range. \
         Returns the whole-file sha256 to pass as base_sha256 on a later write."
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to the workspace root" },
                "start_line": { "type": ["integer", "null"], "minimum": 1, "description": "First line to read (1-indexed). Omit to start from the beginning." },
                "end_line": { "type": ["integer", "null"], "minimum": 1, "description": "Last line to read, inclusive (1-indexed). Omit to read to end of file." },
                "with_line_numbers": { "type": "boolean", "default": false, "description": "Prefix each line with '<n>: '" }
            },
            "required": ["path"]
        })
    }

    fn is_side_effecting(&self, _args: &Value) -> bool {
        false
    }

    fn approval_summary(&self, args: &Value) -> Result<String, ToolError> {
        let typed: ReadFileArgs = parse_args(args)?;
        let mut distillate = format!("Read {}", typed.path);
        match (typed.start_line, typed.end_line) {
            (Some(start), Some(end)) => distillate.push_str(&format!(" lines {start}-{end}")),
            (Some(start), None) => distillate.push_str(&format!(" lines {start}-")),
            (None, Some(end)) => distillate.push_str(&format!(" lines 1-{end}")),
            (None, None) => {}
        }
        Ok(distillate)
    }

    fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let typed: ReadFileArgs = parse_args(&args)?;
        require_path(&typed.path)?;
        let (start_line, end_line) = typed.line_bounds().map_err(|e| ToolError::BadArgs {
            message: e.to_string(),
        })?;

        let outcome = self.engine.read(
            &typed.path,
            ReadRequest {
                start_line,
                end_line,
                with_line_numbers: typed.with_line_numbers,
            },
        );
        let response = ReadFileResponse::from_outcome(outcome, self.meta(&args));
        Ok(serde_json::to_value(response)?)
    }
}

impl ToolExecutor for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Create or edit a text file under the workspace root. Modes: overwrite, append, \
         insert_after_line (needs line), replace_range (needs start_line and end_line). \
         Pass base_sha256 from a prior read to reject the write if the file changed. \
         diff_unified labels both sides with the root-relative path (a/<path>, b/<path>)."
    }

    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path relative to the workspace root. Parent directories are created automatically." },
                "mode": { "type": "string", "enum": ["overwrite", "append", "insert_after_line", "replace_range"] },
                "content": { "type": "string", "description": "Text to write, append, insert, or substitute." },
                "base_sha256": { "type": ["string", "null"], "description": "sha256 the caller last saw; a mismatch returns status 'conflict'." },
                "line": { "type": ["integer", "null"], "minimum": 1, "description": "insert_after_line: insert after this 1-indexed line." },
                "start_line": { "type": ["integer", "null"], "minimum": 1, "description": "replace_range: first line to replace (1-indexed)." },
                "end_line": { "type": ["integer", "null"], "minimum": 1, "description": "replace_range: last line to replace, inclusive." },
                "make_backup": { "type": "boolean", "default": false, "description": "Save the previous content to <path>.bak first." }
            },
            "required": ["path", "mode", "content"]
        })
    }

    fn is_side_effecting(&self, _args: &Value) -> bool {
        true
    }

    fn approval_summary(&self, args: &Value) -> Result<String, ToolError> {
        let typed: WriteFileArgs = parse_args(args)?;
        let target = match typed.mode {
            EditMode::InsertAfterLine => typed
                .line
                .map(|line| format!(" after line {line}"))
                .unwrap_or_default(),
            EditMode::ReplaceRange => match (typed.start_line, typed.end_line) {
                (Some(start), Some(end)) => format!(" lines {start}-{end}"),
                _ => String::new(),
            },
            EditMode::Overwrite | EditMode::Append => String::new(),
        };
        Ok(format!(
            "{} {}{target} ({} bytes)",
            typed.mode,
            typed.path,
            typed.content.len()
        ))
    }

    fn meta(&self, args: &Value) -> ToolMeta {
        let function_name = match args.get("mode").and_then(Value::as_str) {
            Some(mode) => format!("{}:{mode}", self.name()),
            None => self.name().to_string(),
        };
        ToolMeta::new(function_name, path_arg(args))
    }

    fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let typed: WriteFileArgs = parse_args(&args)?;
        require_path(&typed.path)?;
        let request = typed.to_request().map_err(|e| ToolError::BadArgs {
            message: e.to_string(),
        })?;

        let outcome = self.engine.write(&typed.path, &request);
        let response = WriteFileResponse::from_outcome(outcome, self.meta(&args));
        Ok(serde_json::to_value(response)?)
    }
}

/// Register `read_file` and `write_file` against one shared sandbox.
pub fn register_builtins(
    registry: &mut ToolRegistry,
    settings: &ToolSettings,
) -> Result<(), ToolError> {
    let sandbox: Arc<Sandbox> = Arc::new(settings.sandbox.clone());
    registry.register(Box::new(ReadFileTool::new(ReadEngine::new(
        Arc::clone(&sandbox),
        settings.read_limits,
    ))))?;
    registry.register(Box::new(WriteFileTool::new(WriteEngine::new(
        sandbox,
        settings.write_limits.clone(),
    ))))?;
    Ok(())
}
