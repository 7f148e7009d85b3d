//! Line model shared by the read and write engines.
//!
//! Lines are split with [`str::lines`]: `\n` terminates a line, a `\r` right
//! before it is dropped, and a final terminator does not produce an empty
//! trailing line. So `"a\nb\n"` and `"a\r\nb"` both have two lines.

/// Line terminator style, decided by majority vote over the existing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EolKind {
    Lf,
    CrLf,
}

impl EolKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }

    /// `None` when the text has no terminators at all. LF wins ties.
    #[must_use]
    pub fn detect(text: &str) -> Option<Self> {
        let total = newline_count(text);
        let crlf = text.matches("\r\n").count();
        let lf = total - crlf;
        match (lf, crlf) {
            (0, 0) => None,
            (lf, crlf) if crlf > lf => Some(Self::CrLf),
            _ => Some(Self::Lf),
        }
    }
}

/// Number of lines as seen by the engines.
#[must_use]
pub fn line_count(text: &str) -> usize {
    text.lines().count()
}

/// Number of `\n` bytes.
#[must_use]
pub fn newline_count(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

/// A file split into lines, remembering how to join them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    lines: Vec<String>,
    eol: EolKind,
    final_newline: bool,
}

impl TextDocument {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            eol: EolKind::detect(text).unwrap_or(EolKind::Lf),
            final_newline: text.ends_with('\n'),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn set_eol(&mut self, eol: EolKind) {
        self.eol = eol;
    }

    pub fn set_final_newline(&mut self, final_newline: bool) {
        self.final_newline = final_newline;
    }

    /// Replace `lines[start..end]` with `block`. Bounds are clamped to the
    /// document, so an out-of-range splice degrades to an append.
    pub fn splice(&mut self, start: usize, end: usize, block: Vec<String>) {
        let start = start.min(self.lines.len());
        let end = end.clamp(start, self.lines.len());
        self.lines.splice(start..end, block);
    }

    /// Join lines with the document's EOL, adding a trailing one when
    /// `final_newline` is set (even for zero lines).
    #[must_use]
    pub fn render(&self) -> String {
        let eol = self.eol.as_str();
        let mut out = self.lines.join(eol);
        if self.final_newline {
            out.push_str(eol);
        }
        out
    }
}
