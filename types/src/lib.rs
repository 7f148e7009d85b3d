//! Core domain types for Quill.
//!
//! This crate contains pure domain types with no IO and minimal dependencies:
//! line addressing, edit requests, per-call outcomes, and the JSON wire shapes
//! exchanged with the calling agent.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod edit;
mod lines;
mod outcome;
mod wire;

pub use edit::{EditArgsError, EditMode, EditOp, EditRequest};
pub use lines::{LineError, LineNumber, LineRange};
pub use outcome::{AppliedEdit, EditSummary, FileView, ReadOutcome, WriteOutcome};
pub use wire::{
    ReadFileArgs, ReadFileResponse, Status, ToolMeta, WriteFileArgs, WriteFileResponse,
};
