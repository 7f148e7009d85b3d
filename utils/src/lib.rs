//! Shared infrastructure utilities for Quill.
//!
//! This crate provides cross-cutting utilities the tool crate needs but that
//! don't belong in the domain-pure `quill-types` crate:
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`hash`**: SHA-256 content fingerprints used for optimistic locking
//! - **`diff`**: Unified diff formatting and stats

pub mod atomic_write;
pub mod diff;
pub mod hash;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, PersistMode,
    atomic_write_with_options,
};
pub use diff::{compute_diff_stats, format_unified_diff};
pub use hash::{hashes_match, sha256_hex};
