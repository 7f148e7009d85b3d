use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use super::{DenialReason, ToolError};

/// Default deny patterns for secrets and VCS internals under the sandbox root.
pub const DEFAULT_SANDBOX_DENY_PATTERNS: &[&str] = &[
    "**/.ssh/**",
    "**/.gnupg/**",
    "**/.aws/**",
    "**/.git/**",
    "**/.git-credentials",
    "**/.netrc",
    "**/.env",
    "**/.env.*",
    "**/id_rsa*",
    "**/id_ed25519*",
    "**/*.pem",
    "**/*.key",
];

#[must_use]
pub fn default_sandbox_deny_patterns() -> Vec<String> {
    DEFAULT_SANDBOX_DENY_PATTERNS
        .iter()
        .map(std::string::ToString::to_string)
        .collect()
}

#[derive(Debug, Clone)]
struct DenyPattern {
    pattern: String,
    matcher: globset::GlobMatcher,
}

/// Filesystem sandbox: a single canonical root plus deny globs.
///
/// Built once at startup and shared by both engines. Every caller-supplied
/// path goes through [`Sandbox::resolve`] before touching the filesystem.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    deny_patterns: Vec<DenyPattern>,
}

/// A path proven to lie inside the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: String,
}

impl ResolvedPath {
    /// Canonical absolute path (symlinks in existing ancestors resolved).
    #[must_use]
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Root-relative path with `/` separators; `.` for the root itself.
    #[must_use]
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Sibling path with `.<suffix>` appended to the full file name
    /// (`main.c` -> `main.c.bak`). The suffix must pass
    /// [`check_file_suffix`], so the sibling stays in the same directory.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, ToolError> {
        check_file_suffix(suffix)?;
        let mut absolute = self.absolute.clone().into_os_string();
        absolute.push(".");
        absolute.push(suffix);
        Ok(Self {
            absolute: PathBuf::from(absolute),
            relative: format!("{}.{suffix}", self.relative),
        })
    }
}

impl std::fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.relative)
    }
}

impl Sandbox {
    pub fn new(root: impl AsRef<Path>, denied_patterns: Vec<String>) -> Result<Self, ToolError> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|source| ToolError::Io {
            action: "failed to open sandbox root",
            path: root.display().to_string(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(ToolError::BadArgs {
                message: format!("sandbox root is not a directory: {}", root.display()),
            });
        }

        let mut deny_patterns = Vec::new();
        for pat in denied_patterns {
            let mut builder = globset::GlobBuilder::new(&pat);
            // Case-insensitive so "Secret.PEM" cannot slip past "*.pem".
            builder.case_insensitive(true);
            let glob = builder.build().map_err(|e| ToolError::BadArgs {
                message: format!("Invalid denied pattern '{pat}': {e}"),
            })?;
            deny_patterns.push(DenyPattern {
                pattern: pat,
                matcher: glob.compile_matcher(),
            });
        }

        Ok(Self {
            root: canonical,
            deny_patterns,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path against the root.
    ///
    /// Components are applied in order, following symlinks as they are met,
    /// so `link/../x` lands where the OS would open it. Works for paths that
    /// do not exist yet (file creation).
    pub fn resolve(&self, path: &str) -> Result<ResolvedPath, ToolError> {
        if contains_unsafe_path_chars(path) {
            return Err(ToolError::SandboxViolation(DenialReason::UnsafePathChars {
                attempted: path.to_string(),
            }));
        }

        let canonical =
            resolve_components(&self.root.join(path)).map_err(|source| ToolError::Io {
                action: "failed to resolve",
                path: path.to_string(),
                source,
            })?;

        let Ok(rel) = canonical.strip_prefix(&self.root) else {
            warn!(attempted = path, resolved = %canonical.display(), "Path escapes sandbox root");
            return Err(ToolError::SandboxViolation(
                DenialReason::PathOutsideSandbox {
                    attempted: path.to_string(),
                    resolved: canonical,
                },
            ));
        };
        let relative = slash_path(rel);

        if let Some(pattern) = self.matches_denied_pattern(&relative) {
            warn!(attempted = path, pattern = %pattern, "Path matched denied pattern");
            return Err(ToolError::SandboxViolation(
                DenialReason::DeniedPatternMatched {
                    attempted: path.to_string(),
                    pattern,
                },
            ));
        }

        debug!(attempted = path, resolved = %relative, "Resolved sandbox path");
        Ok(ResolvedPath {
            absolute: canonical,
            relative,
        })
    }

    /// Post-creation validation for TOCTOU mitigation.
    ///
    /// After `create_dir_all` and before writing content, re-check that no
    /// directory between the root and the parent was swapped for a symlink and
    /// that the canonical parent still lies under the root.
    pub fn validate_created_parent(&self, path: &ResolvedPath) -> Result<(), ToolError> {
        let denied = |resolved: PathBuf| {
            ToolError::SandboxViolation(DenialReason::PathOutsideSandbox {
                attempted: path.relative().to_string(),
                resolved,
            })
        };
        let parent = path
            .absolute()
            .parent()
            .ok_or_else(|| denied(path.absolute().to_path_buf()))?;

        let mut current = parent;
        while current != self.root {
            if let Ok(meta) = std::fs::symlink_metadata(current)
                && meta.file_type().is_symlink()
            {
                return Err(denied(current.to_path_buf()));
            }
            match current.parent() {
                Some(p) => current = p,
                None => return Err(denied(parent.to_path_buf())),
            }
        }

        let canonical =
            std::fs::canonicalize(parent).map_err(|_| denied(parent.to_path_buf()))?;
        if !canonical.starts_with(&self.root) {
            return Err(denied(canonical));
        }
        Ok(())
    }

    fn matches_denied_pattern(&self, relative: &str) -> Option<String> {
        self.deny_patterns
            .iter()
            .find(|pat| pat.matcher.is_match(relative))
            .map(|pat| pat.pattern.clone())
    }
}

/// Walk `path` the way the OS does. Each existing prefix is resolved
/// (symlinks followed) before the next component, so a later `..` steps out
/// of the link target rather than the link. Missing components are appended
/// verbatim.
fn resolve_components(path: &Path) -> io::Result<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                resolved.push(name);
                match fs::symlink_metadata(&resolved) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        resolved = follow_symlink(&resolved)?;
                    }
                    Ok(_) => {}
                    Err(err)
                        if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {}
                    Err(err) => return Err(err),
                }
            }
        }
    }
    Ok(resolved)
}

/// Resolve a symlink whose parent is already resolved. A dangling link
/// resolves to where its target would be created.
fn follow_symlink(link: &Path) -> io::Result<PathBuf> {
    match fs::canonicalize(link) {
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let target = fs::read_link(link)?;
            let mut base = link.to_path_buf();
            base.pop();
            resolve_components(&base.join(target))
        }
        other => other,
    }
}

/// A suffix appended to a file name must not introduce a path separator.
pub fn check_file_suffix(suffix: &str) -> Result<(), ToolError> {
    if suffix.is_empty()
        || suffix.contains(['/', '\\'])
        || contains_unsafe_path_chars(suffix)
    {
        return Err(ToolError::BadArgs {
            message: format!("invalid file suffix '{}'", suffix.escape_debug()),
        });
    }
    Ok(())
}

fn slash_path(rel: &Path) -> String {
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn contains_unsafe_path_chars(input: &str) -> bool {
    input.chars().any(is_unsafe_path_char)
}

/// Control characters plus invisible formatting characters.
///
/// Bidi overrides and zero-width characters make a path display differently
/// from what the filesystem sees.
fn is_unsafe_path_char(c: char) -> bool {
    matches!(
        c,
        '\u{0000}'..='\u{001f}'
            | '\u{007f}'..='\u{009f}'
            | '\u{00ad}'
            | '\u{061c}'
            | '\u{200b}'..='\u{200f}'
            | '\u{202a}'..='\u{202e}'
            | '\u{2060}'..='\u{2069}'
            | '\u{feff}'
    )
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    use super::{
        Sandbox, check_file_suffix, default_sandbox_deny_patterns, is_unsafe_path_char,
        resolve_components,
    };
    use crate::{DenialReason, ToolError};

    fn sandbox(root: &Path) -> Sandbox {
        Sandbox::new(root, default_sandbox_deny_patterns()).unwrap()
    }

    fn is_escape(err: &ToolError) -> bool {
        matches!(
            err,
            ToolError::SandboxViolation(DenialReason::PathOutsideSandbox { .. })
        )
    }

    #[test]
    fn safe_chars_not_flagged() {
        for c in ['a', 'Z', '0', '/', '.', '-', '_', ' ', 'é', '中'] {
            assert!(!is_unsafe_path_char(c), "{c:?}");
        }
    }

    #[test]
    fn control_and_invisible_chars_flagged() {
        for c in ['\0', '\n', '\u{7f}', '\u{85}', '\u{200b}', '\u{202e}', '\u{2066}', '\u{feff}'] {
            assert!(is_unsafe_path_char(c), "{c:?}");
        }
    }

    #[test]
    fn missing_components_fold_dots() {
        let dir = tempdir().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            resolve_components(&root.join("a/./b/../c")).unwrap(),
            root.join("a/c")
        );
        assert_eq!(
            resolve_components(&root.join("new/../../x")).unwrap(),
            root.parent().unwrap().join("x")
        );
    }

    #[test]
    fn sandbox_new_with_nonexistent_root_fails() {
        let dir = tempdir().unwrap();
        let err = Sandbox::new(dir.path().join("missing"), Vec::new()).unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
    }

    #[test]
    fn sandbox_new_with_invalid_glob_pattern_fails() {
        let dir = tempdir().unwrap();
        let err = Sandbox::new(dir.path(), vec!["a[".to_string()]).unwrap_err();
        assert!(matches!(err, ToolError::BadArgs { .. }));
    }

    #[test]
    fn resolve_relative_path_within_sandbox() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let resolved = sandbox(dir.path()).resolve("a.txt").unwrap();
        assert_eq!(resolved.relative(), "a.txt");
        assert_eq!(
            resolved.absolute(),
            fs::canonicalize(dir.path()).unwrap().join("a.txt")
        );
    }

    #[test]
    fn resolve_nonexistent_nested_path() {
        let dir = tempdir().unwrap();
        let resolved = sandbox(dir.path()).resolve("new/deep/file.rs").unwrap();
        assert_eq!(resolved.relative(), "new/deep/file.rs");
    }

    #[test]
    fn resolve_allows_dotdot_that_stays_inside() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        let resolved = sandbox(dir.path()).resolve("src/../README.md").unwrap();
        assert_eq!(resolved.relative(), "README.md");
    }

    #[test]
    fn resolve_root_itself() {
        let dir = tempdir().unwrap();
        assert_eq!(sandbox(dir.path()).resolve(".").unwrap().relative(), ".");
        assert_eq!(sandbox(dir.path()).resolve("").unwrap().relative(), ".");
    }

    #[test]
    fn resolve_rejects_dotdot_escape() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        for attempt in ["../x", "a/../../x", "../../../../etc/passwd"] {
            let err = sb.resolve(attempt).unwrap_err();
            assert!(is_escape(&err), "{attempt}: {err}");
        }
    }

    #[test]
    fn resolve_rejects_absolute_outside_root() {
        let dir = tempdir().unwrap();
        let err = sandbox(dir.path()).resolve("/etc/passwd").unwrap_err();
        assert!(is_escape(&err));
    }

    #[test]
    fn resolve_accepts_absolute_inside_root() {
        let dir = tempdir().unwrap();
        let inside = fs::canonicalize(dir.path()).unwrap().join("in.txt");
        let resolved = sandbox(dir.path())
            .resolve(inside.to_str().unwrap())
            .unwrap();
        assert_eq!(resolved.relative(), "in.txt");
    }

    #[test]
    fn sibling_with_shared_prefix_is_outside() {
        let parent = tempdir().unwrap();
        let root = parent.path().join("proj");
        let sibling = parent.path().join("proj2");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&sibling).unwrap();
        let err = sandbox(&root).resolve("../proj2/x.txt").unwrap_err();
        assert!(is_escape(&err));
    }

    #[test]
    fn resolve_rejects_unsafe_chars() {
        let dir = tempdir().unwrap();
        let err = sandbox(dir.path()).resolve("a\u{200b}.txt").unwrap_err();
        assert!(matches!(
            err,
            ToolError::SandboxViolation(DenialReason::UnsafePathChars { .. })
        ));
    }

    #[test]
    fn resolve_rejects_denied_pattern_case_insensitively() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        let err = sb.resolve("certs/Server.PEM").unwrap_err();
        assert!(matches!(
            err,
            ToolError::SandboxViolation(DenialReason::DeniedPatternMatched { ref pattern, .. })
                if pattern == "**/*.pem"
        ));
        assert!(sb.resolve(".git/config").is_err());
        assert!(sb.resolve(".env").is_err());
        assert!(sb.resolve("src/env.rs").is_ok());
    }

    #[test]
    fn escape_message_does_not_leak_host_path() {
        let dir = tempdir().unwrap();
        let err = sandbox(dir.path()).resolve("../secret").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("../secret"));
        assert!(!message.contains(&*dir.path().to_string_lossy()));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_follows_symlinks_before_containment() {
        use std::os::unix::fs::symlink;

        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        let dir = tempdir().unwrap();
        symlink(outside.path(), dir.path().join("link")).unwrap();
        symlink(
            outside.path().join("secret.txt"),
            dir.path().join("file_link"),
        )
        .unwrap();

        let sb = sandbox(dir.path());
        assert!(is_escape(&sb.resolve("link/secret.txt").unwrap_err()));
        assert!(is_escape(&sb.resolve("link/new.txt").unwrap_err()));
        assert!(is_escape(&sb.resolve("file_link").unwrap_err()));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_root_is_allowed() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("real")).unwrap();
        fs::write(dir.path().join("real/a.txt"), "a").unwrap();
        symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let resolved = sandbox(dir.path()).resolve("alias/a.txt").unwrap();
        assert_eq!(resolved.relative(), "real/a.txt");
    }

    #[test]
    fn backup_suffix_appends_to_full_name() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        let backup = sb.resolve("src/main.c").unwrap().with_suffix("bak").unwrap();
        assert_eq!(backup.relative(), "src/main.c.bak");
        assert!(backup.absolute().ends_with("src/main.c.bak"));
        let backup = sb.resolve("Makefile").unwrap().with_suffix("bak").unwrap();
        assert_eq!(backup.relative(), "Makefile.bak");
    }

    #[test]
    fn suffix_with_separator_is_rejected() {
        let dir = tempdir().unwrap();
        let resolved = sandbox(dir.path()).resolve("a.txt").unwrap();
        for suffix in ["x/../../y", "a\\b", "", "b\u{0}k"] {
            let err = resolved.with_suffix(suffix).unwrap_err();
            assert!(matches!(err, ToolError::BadArgs { .. }), "{suffix:?}");
        }
        check_file_suffix("orig").unwrap();
        check_file_suffix("bak..1").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn dotdot_after_symlink_leaves_link_target() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
        fs::write(dir.path().join("sub/target.txt"), "in sub").unwrap();
        fs::write(dir.path().join("target.txt"), "in root").unwrap();
        symlink(dir.path().join("sub/deep"), dir.path().join("link")).unwrap();

        let sb = sandbox(dir.path());
        let resolved = sb.resolve("link/../target.txt").unwrap();
        assert_eq!(resolved.relative(), "sub/target.txt");
        assert_eq!(fs::read_to_string(resolved.absolute()).unwrap(), "in sub");

        let resolved = sb.resolve("link/../fresh/new.txt").unwrap();
        assert_eq!(resolved.relative(), "sub/fresh/new.txt");
    }

    #[cfg(unix)]
    #[test]
    fn dotdot_after_outside_link_is_escape() {
        use std::os::unix::fs::symlink;

        let parent = tempdir().unwrap();
        let root = parent.path().join("root");
        let outside = parent.path().join("outside/inner");
        fs::create_dir(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();
        symlink(&outside, root.join("out")).unwrap();

        let err = sandbox(&root).resolve("out/../x.txt").unwrap_err();
        assert!(is_escape(&err), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_resolves_to_its_target() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        symlink("sub/later.txt", dir.path().join("pending")).unwrap();

        let resolved = sandbox(dir.path()).resolve("pending").unwrap();
        assert_eq!(resolved.relative(), "sub/later.txt");
    }

    #[test]
    fn validate_created_parent_accepts_fresh_dirs() {
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        let resolved = sb.resolve("a/b/c.txt").unwrap();
        fs::create_dir_all(resolved.absolute().parent().unwrap()).unwrap();
        sb.validate_created_parent(&resolved).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn validate_created_parent_rejects_swapped_symlink() {
        use std::os::unix::fs::symlink;

        let outside = tempdir().unwrap();
        let dir = tempdir().unwrap();
        let sb = sandbox(dir.path());
        let resolved = sb.resolve("swap/c.txt").unwrap();
        symlink(outside.path(), dir.path().join("swap")).unwrap();

        let err = sb.validate_created_parent(&resolved).unwrap_err();
        assert!(is_escape(&err));
    }
}
