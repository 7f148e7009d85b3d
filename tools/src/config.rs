//! Configuration sections owned by the tools.
//!
//! Deserialized from `config.toml` by `quill-config`; kept here so each
//! section sits next to the limits it produces.

use serde::Deserialize;

use crate::sandbox::check_file_suffix;
use crate::{
    DEFAULT_BACKUP_SUFFIX, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_MAX_FILE_READ_BYTES, ReadFileLimits,
    ToolError, WriteFileLimits,
};

/// Serde helper for fields that default to `true`.
#[must_use]
pub const fn default_true() -> bool {
    true
}

/// ```toml
/// [sandbox]
/// root = "${HOME}/work"
/// denied_patterns = ["**/*.secret"]
/// include_default_denies = true
/// ```
#[derive(Debug, Deserialize)]
pub struct SandboxConfig {
    pub root: Option<String>,
    #[serde(default)]
    pub denied_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub include_default_denies: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: None,
            denied_patterns: Vec::new(),
            include_default_denies: true,
        }
    }
}

/// `read_file` limits configuration.
#[derive(Debug, Default, Deserialize)]
pub struct ReadFileConfig {
    pub max_file_read_bytes: Option<usize>,
}

impl ReadFileConfig {
    #[must_use]
    pub fn limits(&self) -> ReadFileLimits {
        ReadFileLimits {
            max_file_read_bytes: self
                .max_file_read_bytes
                .unwrap_or(DEFAULT_MAX_FILE_READ_BYTES),
        }
    }
}

/// `write_file` limits and persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteFileConfig {
    pub max_content_bytes: Option<usize>,
    pub backup_suffix: Option<String>,
    #[serde(default = "default_true")]
    pub fsync: bool,
}

impl Default for WriteFileConfig {
    fn default() -> Self {
        Self {
            max_content_bytes: None,
            backup_suffix: None,
            fsync: true,
        }
    }
}

impl WriteFileConfig {
    /// Fails when `backup_suffix` would place the backup outside the
    /// target's directory.
    pub fn limits(&self) -> Result<WriteFileLimits, ToolError> {
        let backup_suffix = self
            .backup_suffix
            .as_deref()
            .map(|s| s.trim_start_matches('.'))
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_BACKUP_SUFFIX)
            .to_string();
        check_file_suffix(&backup_suffix)?;
        Ok(WriteFileLimits {
            max_content_bytes: self.max_content_bytes.unwrap_or(DEFAULT_MAX_CONTENT_BYTES),
            backup_suffix,
            fsync: self.fsync,
        })
    }
}
