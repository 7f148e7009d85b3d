//! Configuration loading for Quill.
//!
//! `~/.quill/config.toml` (or the file named by `$QUILL_CONFIG`) is read once
//! at startup and turned into the [`ToolSettings`] both engines are built from.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use quill_tools::config::{ReadFileConfig, SandboxConfig, WriteFileConfig};
use quill_tools::sandbox::default_sandbox_deny_patterns;
use quill_tools::{Sandbox, ToolError, ToolSettings};
use serde::Deserialize;
use tracing::{debug, warn};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "QUILL_CONFIG";

/// Consulted in order when `[sandbox] root` is unset.
const ROOT_ENV_VARS: [&str; 2] = ["QUILL_WORKSPACE", "WORKSPACE"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid sandbox root {}: {source}", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: ToolError,
    },
    #[error("invalid setting {key}: {source}")]
    Invalid {
        key: &'static str,
        #[source]
        source: ToolError,
    },
}

impl ConfigError {
    /// The file or directory the error is about, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Root { path, .. } => Some(path),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub read_file: ReadFileConfig,
    #[serde(default)]
    pub write_file: WriteFileConfig,
}

impl QuillConfig {
    /// Load from [`config_path`]. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = config_path() else {
            debug!("No home directory; using default config");
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found; using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(&content).map_err(|source| {
            warn!(path = %path.display(), error = %source, "Failed to parse config");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The configured sandbox root, before canonicalisation.
    pub fn sandbox_root(&self) -> Result<PathBuf, ConfigError> {
        resolve_root(self.sandbox.root.as_deref(), |name| env::var(name).ok())
    }

    /// Resolve the sandbox once and bundle it with the per-tool limits.
    ///
    /// `${VAR}` references in `root`, `denied_patterns` and `backup_suffix`
    /// are expanded first.
    pub fn tool_settings(&self) -> Result<ToolSettings, ConfigError> {
        let root = self.sandbox_root()?;

        let mut patterns = if self.sandbox.include_default_denies {
            default_sandbox_deny_patterns()
        } else {
            Vec::new()
        };
        patterns.extend(
            self.sandbox
                .denied_patterns
                .iter()
                .map(|pattern| expand_env_vars(pattern)),
        );

        let sandbox = Sandbox::new(&root, patterns)
            .map_err(|source| ConfigError::Root { path: root, source })?;
        debug!(root = %sandbox.root().display(), "Sandbox root resolved");

        let mut write_file = self.write_file.clone();
        write_file.backup_suffix = write_file
            .backup_suffix
            .as_deref()
            .map(expand_env_vars);
        let write_limits = write_file.limits().map_err(|source| ConfigError::Invalid {
            key: "write_file.backup_suffix",
            source,
        })?;

        Ok(ToolSettings {
            sandbox,
            read_limits: self.read_file.limits(),
            write_limits,
        })
    }
}

/// `$QUILL_CONFIG` if set, else `~/.quill/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".quill").join("config.toml"))
}

/// Replace `${VAR}` with the variable's value. Unset variables expand to
/// nothing; an unclosed `${` is kept as written.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    expand_with(value, |name| env::var(name).ok())
}

fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &after[..close];
        if !name.is_empty() {
            out.push_str(&lookup(name).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve_root(
    configured: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    let non_blank = |value: String| (!value.trim().is_empty()).then_some(value);

    let chosen = configured
        .map(|raw| expand_with(raw, &lookup))
        .and_then(non_blank)
        .or_else(|| {
            ROOT_ENV_VARS
                .into_iter()
                .find_map(|name| lookup(name).and_then(non_blank))
        });

    match chosen {
        Some(root) => Ok(PathBuf::from(root)),
        None => env::current_dir().map_err(|source| ConfigError::Root {
            path: PathBuf::from("."),
            source: ToolError::Io {
                action: "failed to read current directory",
                path: ".".to_string(),
                source,
            },
        }),
    }
}
