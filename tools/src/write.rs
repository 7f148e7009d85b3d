//! Optimistically-locked, line-addressed file writes.
//!
//! One call runs: resolve -> load -> lock check -> transform -> no-op check ->
//! backup -> persist -> diff. Backup always lands before the primary write, and
//! a failed backup aborts the call with the primary untouched.

use std::fs;
use std::io::ErrorKind;
use std::sync::Arc;

use quill_types::{AppliedEdit, EditRequest, WriteOutcome};
use quill_utils::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, PersistMode,
    atomic_write_with_options, compute_diff_stats, format_unified_diff, hashes_match, sha256_hex,
};
use tracing::{debug, info, warn};

use crate::edit::{self, Transformed};
use crate::sandbox::{ResolvedPath, Sandbox};
use crate::{ToolError, WriteFileLimits};

/// Writes files under the sandbox root.
#[derive(Debug, Clone)]
pub struct WriteEngine {
    sandbox: Arc<Sandbox>,
    limits: WriteFileLimits,
}

/// Current on-disk state of the target.
struct Existing {
    text: String,
    mode: PersistMode,
}

impl WriteEngine {
    #[must_use]
    pub fn new(sandbox: Arc<Sandbox>, limits: WriteFileLimits) -> Self {
        Self { sandbox, limits }
    }

    /// Apply `request` to `path`. Never panics or propagates; every failure is
    /// a [`WriteOutcome::Error`] carrying a message.
    pub fn write(&self, path: &str, request: &EditRequest) -> WriteOutcome {
        if let Err(err) = self.check_request(request) {
            warn!(path, error = %err, "Write rejected");
            return WriteOutcome::Error {
                path: None,
                message: err.to_string(),
            };
        }

        let resolved = match self.sandbox.resolve(path) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(path, error = %err, "Write rejected");
                return WriteOutcome::Error {
                    path: None,
                    message: err.to_string(),
                };
            }
        };

        match self.apply(&resolved, request) {
            Ok(outcome) => outcome,
            Err(ToolError::StaleFile {
                path,
                expected,
                actual,
            }) => {
                warn!(
                    path = %path,
                    expected = %expected,
                    actual = %actual,
                    "Write conflict: file changed on disk"
                );
                WriteOutcome::Conflict {
                    path,
                    expected,
                    actual,
                }
            }
            Err(err) => {
                warn!(path = %resolved, error = %err, "Write failed");
                WriteOutcome::Error {
                    path: Some(resolved.relative().to_string()),
                    message: err.to_string(),
                }
            }
        }
    }

    fn check_request(&self, request: &EditRequest) -> Result<(), ToolError> {
        let len = request.op.content().len();
        if len > self.limits.max_content_bytes {
            return Err(ToolError::LimitsExceeded {
                message: format!(
                    "content is {len} bytes, over the {} byte write limit",
                    self.limits.max_content_bytes
                ),
            });
        }
        Ok(())
    }

    fn apply(
        &self,
        resolved: &ResolvedPath,
        request: &EditRequest,
    ) -> Result<WriteOutcome, ToolError> {
        let rel = resolved.relative().to_string();
        let existing = load_existing(resolved)?;
        let old_text = existing.as_ref().map_or("", |e| e.text.as_str());
        let old_sha = sha256_hex(old_text.as_bytes());

        // A missing file has nothing to conflict with.
        if let (Some(expected), Some(_)) = (request.base_hash(), &existing)
            && !hashes_match(expected, &old_sha)
        {
            return Err(ToolError::StaleFile {
                path: rel,
                expected: expected.to_string(),
                actual: old_sha,
            });
        }

        let Transformed { text, summary } = edit::apply(old_text, &request.op);
        if text == old_text {
            debug!(path = %rel, mode = %request.op.mode(), "Edit produced no changes");
            return Ok(WriteOutcome::NoOp { path: rel });
        }

        let sync = if self.limits.fsync {
            FileSyncPolicy::SyncAll
        } else {
            FileSyncPolicy::SkipSync
        };

        let backup_path = match &existing {
            Some(existing) if request.make_backup => {
                Some(self.write_backup(resolved, existing, sync)?)
            }
            _ => None,
        };

        if existing.is_none() {
            self.ensure_parent(resolved)?;
        }
        let options = AtomicWriteOptions {
            file_sync: sync,
            parent_dir_sync: if existing.is_none() {
                ParentDirSyncPolicy::SyncBestEffort
            } else {
                ParentDirSyncPolicy::SkipSync
            },
            mode: existing.as_ref().map_or(PersistMode::Default, |e| e.mode),
        };
        atomic_write_with_options(resolved.absolute(), text.as_bytes(), options).map_err(
            |source| ToolError::Io {
                action: "failed to write",
                path: rel.clone(),
                source,
            },
        )?;

        let new_sha256 = sha256_hex(text.as_bytes());
        let diff_unified = format_unified_diff(&rel, old_text, &text);
        let (additions, deletions) = compute_diff_stats(old_text, &text);
        info!(
            path = %rel,
            mode = %request.op.mode(),
            old_sha = short(&old_sha),
            new_sha = short(&new_sha256),
            additions,
            deletions,
            backup = backup_path.is_some(),
            "Applied edit"
        );

        Ok(WriteOutcome::Applied(AppliedEdit {
            path: rel,
            new_sha256,
            diff_unified,
            summaries: vec![summary],
            created: existing.is_none(),
            backup_path,
        }))
    }

    /// Snapshot the old content next to the target. Returns the backup's
    /// root-relative path.
    fn write_backup(
        &self,
        resolved: &ResolvedPath,
        existing: &Existing,
        sync: FileSyncPolicy,
    ) -> Result<String, ToolError> {
        let backup = resolved.with_suffix(&self.limits.backup_suffix)?;
        let options = AtomicWriteOptions {
            file_sync: sync,
            mode: existing.mode,
            ..AtomicWriteOptions::default()
        };
        atomic_write_with_options(backup.absolute(), existing.text.as_bytes(), options).map_err(
            |source| ToolError::BackupFailed {
                path: backup.relative().to_string(),
                source,
            },
        )?;
        debug!(path = %backup, "Wrote backup");
        Ok(backup.relative().to_string())
    }

    fn ensure_parent(&self, resolved: &ResolvedPath) -> Result<(), ToolError> {
        let Some(parent) = resolved.absolute().parent() else {
            return Ok(());
        };
        if parent.exists() {
            return Ok(());
        }
        fs::create_dir_all(parent).map_err(|source| ToolError::Io {
            action: "failed to create parent directories for",
            path: resolved.relative().to_string(),
            source,
        })?;
        self.sandbox.validate_created_parent(resolved)
    }
}

fn load_existing(resolved: &ResolvedPath) -> Result<Option<Existing>, ToolError> {
    let rel = resolved.relative();
    let meta = match fs::metadata(resolved.absolute()) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
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
    let bytes = fs::read(resolved.absolute()).map_err(|source| ToolError::Io {
        action: "failed to read",
        path: rel.to_string(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|_| ToolError::NotText {
        path: rel.to_string(),
    })?;
    Ok(Some(Existing {
        text,
        mode: PersistMode::inherit_from(Some(&meta)),
    }))
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
