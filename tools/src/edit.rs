//! The four structural edit transforms.
//!
//! Pure functions of `(old text, op)`; no IO. Line-addressed modes clamp
//! their targets into the file instead of rejecting out-of-range values.

use quill_types::{EditOp, EditSummary, LineNumber, LineRange};

use crate::text::{EolKind, TextDocument, line_count, newline_count};

/// New file content plus a description of what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub text: String,
    pub summary: EditSummary,
}

#[must_use]
pub fn apply(old: &str, op: &EditOp) -> Transformed {
    match op {
        EditOp::Overwrite { content } => overwrite(content),
        EditOp::Append { content } => append(old, content),
        EditOp::InsertAfterLine { line, content } => insert_after_line(old, *line, content),
        EditOp::ReplaceRange { range, content } => replace_range(old, *range, content),
    }
}

fn overwrite(content: &str) -> Transformed {
    Transformed {
        text: content.to_string(),
        summary: EditSummary::span("overwrite all", 1, line_count(content)),
    }
}

fn append(old: &str, content: &str) -> Transformed {
    // Without a trailing newline the first appended line continues old's last line.
    let first = if old.is_empty() {
        1
    } else {
        newline_count(old) + 1
    };
    Transformed {
        text: format!("{old}{content}"),
        summary: EditSummary::span("append", first, line_count(content).max(1)),
    }
}

fn insert_after_line(old: &str, line: LineNumber, content: &str) -> Transformed {
    let mut doc = document_for(old, content);
    let total = doc.len();
    let idx = line.clamp_to(total) - 1;
    let pos = (idx + 1).min(total);

    let block = block_lines(content);
    let count = block.len();
    doc.splice(pos, pos, block);

    Transformed {
        text: doc.render(),
        summary: EditSummary::span(format!("insert_after_line {line}"), pos + 1, count),
    }
}

fn replace_range(old: &str, range: LineRange, content: &str) -> Transformed {
    let mut doc = document_for(old, content);
    let total = doc.len();
    let start = range.start().clamp_to(total) - 1;
    let end = range.end().clamp_to(total) - 1;

    let block = block_lines(content);
    let count = block.len();
    doc.splice(start, end + 1, block);

    Transformed {
        text: doc.render(),
        summary: EditSummary::span(format!("replace_range {range}"), start + 1, count),
    }
}

/// Parse `old` for a line-level edit. The result keeps a trailing newline if
/// either side had one; EOL style comes from `old`, else from `content`.
fn document_for(old: &str, content: &str) -> TextDocument {
    let mut doc = TextDocument::parse(old);
    if let Some(eol) = EolKind::detect(old).or_else(|| EolKind::detect(content)) {
        doc.set_eol(eol);
    }
    doc.set_final_newline(old.ends_with('\n') || content.ends_with('\n'));
    doc
}

fn block_lines(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}
