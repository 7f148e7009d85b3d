//! Proof types for line addressing.
//!
//! A [`LineNumber`] is 1-based and can never be zero; a [`LineRange`] can never
//! be inverted. Holding one means the bounds check already happened, so the edit
//! engine only has to deal with clamping against the actual file length.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("{field} must be >= 1")]
    Zero { field: &'static str },
    #[error("end_line ({end}) must be >= start_line ({start})")]
    Inverted { start: usize, end: usize },
}

/// A 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct LineNumber(NonZeroUsize);

impl LineNumber {
    pub fn new(value: usize) -> Result<Self, LineError> {
        Self::for_field(value, "line")
    }

    /// Like [`LineNumber::new`], naming the offending argument in the error.
    pub fn for_field(value: usize, field: &'static str) -> Result<Self, LineError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or(LineError::Zero { field })
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }

    /// Clamp into `[1, total]`. Returns 1 when `total` is zero.
    #[must_use]
    pub fn clamp_to(self, total: usize) -> usize {
        self.get().min(total).max(1)
    }
}

impl TryFrom<usize> for LineNumber {
    type Error = LineError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LineNumber> for usize {
    fn from(value: LineNumber) -> Self {
        value.get()
    }
}

impl fmt::Display for LineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// An inclusive, non-inverted range of 1-based line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRange {
    start: LineNumber,
    end: LineNumber,
}

impl LineRange {
    pub fn new(start: LineNumber, end: LineNumber) -> Result<Self, LineError> {
        if end < start {
            return Err(LineError::Inverted {
                start: start.get(),
                end: end.get(),
            });
        }
        Ok(Self { start, end })
    }

    /// Build a range from raw wire values.
    pub fn from_raw(start: usize, end: usize) -> Result<Self, LineError> {
        let start = LineNumber::for_field(start, "start_line")?;
        let end = LineNumber::for_field(end, "end_line")?;
        Self::new(start, end)
    }

    #[must_use]
    pub const fn start(self) -> LineNumber {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> LineNumber {
        self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
