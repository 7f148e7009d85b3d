//! JSON-lines request loop.
//!
//! One request object per input line:
//!
//! ```text
//! {"tool": "read_file", "args": {"path": "src/lib.rs"}, "id": 7}
//! ```
//!
//! One response object per output line. `id`, when given, is echoed back.
//! `{"tool": "list_tools"}` answers with every registered tool's name,
//! description and argument schema.

use std::io::{self, BufRead, Write};

use quill_tools::ToolRegistry;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const LIST_TOOLS: &str = "list_tools";

#[derive(Debug, Deserialize)]
struct Request {
    tool: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    id: Option<Value>,
}

/// Serve requests from `reader` until EOF. Only I/O on the streams
/// themselves ends the session early.
pub fn run_session<R: BufRead, W: Write>(
    registry: &ToolRegistry,
    reader: R,
    mut writer: W,
) -> io::Result<()> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(registry, &line);
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    debug!("Input closed; ending session");
    Ok(())
}

fn handle_line(registry: &ToolRegistry, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "Malformed request line");
            return serde_json::json!({
                "status": "error",
                "message": format!("invalid request: {err}"),
            });
        }
    };

    let mut response = if request.tool == LIST_TOOLS {
        serde_json::json!({
            "status": "ok",
            "tools": registry.definitions(),
        })
    } else {
        registry.dispatch(&request.tool, request.args)
    };
    if let (Some(id), Some(obj)) = (request.id, response.as_object_mut()) {
        obj.insert("id".to_string(), id);
    }
    response
}
