//! End-to-end tests through the tool registry: JSON args in, JSON response out.

use std::fs;
use std::path::Path;

use quill_tools::sandbox::default_sandbox_deny_patterns;
use quill_tools::{
    ReadFileLimits, Sandbox, ToolRegistry, ToolSettings, WriteFileLimits, register_builtins,
};
use quill_utils::sha256_hex;
use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};

struct Workspace {
    dir: TempDir,
    registry: ToolRegistry,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        let settings = ToolSettings {
            sandbox: Sandbox::new(dir.path(), default_sandbox_deny_patterns()).expect("sandbox"),
            read_limits: ReadFileLimits::default(),
            write_limits: WriteFileLimits {
                fsync: false,
                ..WriteFileLimits::default()
            },
        };
        let mut registry = ToolRegistry::default();
        register_builtins(&mut registry, &settings).expect("register");
        Self { dir, registry }
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join(rel)
    }

    fn seed(&self, rel: &str, content: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("seed");
    }

    fn contents(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read back")
    }

    fn read(&self, args: Value) -> Value {
        self.registry.dispatch("read_file", args)
    }

    fn write(&self, args: Value) -> Value {
        self.registry.dispatch("write_file", args)
    }
}

fn mtime(path: &Path) -> std::time::SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .expect("mtime")
}

#[test]
fn overwrite_creates_missing_file() {
    let ws = Workspace::new();
    let response = ws.write(json!({
        "path": "main.c",
        "mode": "overwrite",
        "content": "int main(){return 0;}"
    }));

    assert_eq!(response["status"], "ok", "{response}");
    assert_eq!(response["message"], "applied");
    assert_eq!(response["path"], "main.c");
    assert_eq!(
        response["new_sha256"],
        sha256_hex(b"int main(){return 0;}")
    );
    let diff = response["diff_unified"].as_str().expect("diff");
    assert!(diff.starts_with("--- a/main.c\n+++ b/main.c\n"), "{diff}");
    assert!(diff.contains("+int main(){return 0;}"));
    assert!(
        diff.lines()
            .skip(2)
            .all(|line| !line.starts_with('-') && !line.starts_with(' '))
    );
    assert_eq!(ws.contents("main.c"), "int main(){return 0;}");
    assert_eq!(response["meta"]["function_name"], "write_file:overwrite");
    assert_eq!(response["meta"]["parameters"]["file_path"], "main.c");
}

#[test]
fn insert_after_first_line_lands_second() {
    let ws = Workspace::new();
    ws.seed("f.txt", "a\nb\nc");
    let response = ws.write(json!({
        "path": "f.txt",
        "mode": "insert_after_line",
        "content": "x",
        "line": 1
    }));

    assert_eq!(response["status"], "ok", "{response}");
    assert_eq!(ws.contents("f.txt"), "a\nx\nb\nc");
    assert_eq!(
        response["summaries"],
        json!([{ "description": "insert_after_line 1", "affected_lines": [2] }])
    );
}

#[test]
fn insert_diff_matches_unified_format() {
    let ws = Workspace::new();
    ws.seed("f.txt", "a\nb\nc\n");
    let response = ws.write(json!({
        "path": "f.txt",
        "mode": "insert_after_line",
        "content": "x",
        "line": 1
    }));

    insta::assert_snapshot!(response["diff_unified"].as_str().expect("diff"), @r"
    --- a/f.txt
    +++ b/f.txt
    @@ -1,3 +1,4 @@
     a
    +x
     b
     c
    ");
}

#[test]
fn replace_range_collapses_lines() {
    let ws = Workspace::new();
    ws.seed("f.txt", "line1\nline2\nline3\nline4\nline5\n");
    let response = ws.write(json!({
        "path": "f.txt",
        "mode": "replace_range",
        "content": "Y",
        "start_line": 2,
        "end_line": 4
    }));

    assert_eq!(response["status"], "ok", "{response}");
    assert_eq!(ws.contents("f.txt"), "line1\nY\nline5\n");
    let read = ws.read(json!({ "path": "f.txt" }));
    assert_eq!(read["total_lines"], 3);
    assert_eq!(
        response["summaries"][0]["description"],
        "replace_range 2-4"
    );
}

#[test]
fn wrong_base_hash_conflicts_and_leaves_file() {
    let ws = Workspace::new();
    ws.seed("f.txt", "keep\n");
    let response = ws.write(json!({
        "path": "f.txt",
        "mode": "append",
        "content": "more\n",
        "base_sha256": sha256_hex(b"something else")
    }));

    assert_eq!(response["status"], "conflict");
    assert_eq!(response["message"], "sha mismatch (file changed on disk)");
    assert_eq!(response["path"], "f.txt");
    assert!(response.get("new_sha256").is_none());
    assert_eq!(ws.contents("f.txt"), "keep\n");
}

#[test]
fn stale_hash_conflicts_after_first_write() {
    let ws = Workspace::new();
    ws.seed("f.txt", "v0\n");
    let h0 = ws.read(json!({ "path": "f.txt" }))["sha256"].clone();

    let first = ws.write(json!({
        "path": "f.txt",
        "mode": "overwrite",
        "content": "v1\n",
        "base_sha256": h0
    }));
    assert_eq!(first["status"], "ok", "{first}");

    let second = ws.write(json!({
        "path": "f.txt",
        "mode": "overwrite",
        "content": "v2\n",
        "base_sha256": h0
    }));
    assert_eq!(second["status"], "conflict");
    assert_eq!(ws.contents("f.txt"), "v1\n");
}

#[test]
fn overwrite_then_read_round_trips() {
    let ws = Workspace::new();
    let content = "fn main() {\n    println!(\"hi\");\n}\n";
    let write = ws.write(json!({ "path": "src/main.rs", "mode": "overwrite", "content": content }));
    assert_eq!(write["status"], "ok");

    let read = ws.read(json!({ "path": "src/main.rs" }));
    assert_eq!(read["status"], "ok");
    assert_eq!(read["message"], "success");
    assert_eq!(read["content"], content.trim_end_matches('\n'));
    assert_eq!(read["sha256"], sha256_hex(content.as_bytes()));
    assert_eq!(read["sha256"], write["new_sha256"]);
}

#[test]
fn unchanged_result_is_noop_without_touching_disk() {
    let ws = Workspace::new();
    ws.seed("f.txt", "a\nb\n");
    let before = mtime(&ws.path("f.txt"));

    let response = ws.write(json!({
        "path": "f.txt",
        "mode": "replace_range",
        "content": "b",
        "start_line": 2,
        "end_line": 2,
        "make_backup": true
    }));

    assert_eq!(response["status"], "noop");
    assert_eq!(response["message"], "no changes");
    assert_eq!(mtime(&ws.path("f.txt")), before);
    assert!(!ws.path("f.txt.bak").exists());
}

#[test]
fn empty_file_read_ignores_range() {
    let ws = Workspace::new();
    ws.seed("empty.txt", "");
    for args in [
        json!({ "path": "empty.txt" }),
        json!({ "path": "empty.txt", "start_line": 3, "end_line": 7, "with_line_numbers": true }),
    ] {
        let response = ws.read(args);
        assert_eq!(response["status"], "ok");
        assert_eq!(response["message"], "empty file");
        assert_eq!(response["total_lines"], 0);
        assert_eq!(response["content"], "");
        assert_eq!(response["sha256"], sha256_hex(b""));
    }
}

#[test]
fn traversal_never_escapes_root() {
    let ws = Workspace::new();
    for path in ["../outside.txt", "a/../../outside.txt", "./../../../etc/passwd"] {
        let response = ws.write(json!({ "path": path, "mode": "overwrite", "content": "x" }));
        assert_eq!(response["status"], "error", "{path}: {response}");
        let message = response["message"].as_str().expect("message");
        assert!(message.contains("escapes sandbox root"), "{message}");

        let response = ws.read(json!({ "path": path }));
        assert_eq!(response["status"], "error", "{path}");
    }
    assert!(!ws.dir.path().join("../outside.txt").exists());
}

#[cfg(unix)]
#[test]
fn symlink_cannot_reach_outside() {
    use std::os::unix::fs::symlink;

    let ws = Workspace::new();
    let outside = tempdir().expect("outside");
    fs::write(outside.path().join("target.txt"), "secret\n").expect("seed outside");
    symlink(outside.path(), ws.path("escape")).expect("symlink");

    let read = ws.read(json!({ "path": "escape/target.txt" }));
    assert_eq!(read["status"], "error");
    assert!(read.get("content").is_none());

    let write = ws.write(json!({
        "path": "escape/target.txt",
        "mode": "overwrite",
        "content": "pwned\n"
    }));
    assert_eq!(write["status"], "error");
    assert_eq!(
        fs::read_to_string(outside.path().join("target.txt")).expect("read"),
        "secret\n"
    );
}

#[cfg(unix)]
#[test]
fn dotdot_after_symlink_steps_out_of_link_target() {
    use std::os::unix::fs::symlink;

    let ws = Workspace::new();
    ws.seed("sub/deep/keep.txt", "deep\n");
    ws.seed("sub/target.txt", "in sub\n");
    ws.seed("target.txt", "at root\n");
    symlink(ws.path("sub/deep"), ws.path("link")).expect("symlink");

    let read = ws.read(json!({ "path": "link/../target.txt" }));
    assert_eq!(read["status"], "ok");
    assert_eq!(read["content"], "in sub");

    let write = ws.write(json!({
        "path": "link/../target.txt",
        "mode": "overwrite",
        "content": "rewritten\n"
    }));
    assert_eq!(write["status"], "ok");
    assert_eq!(write["path"], "sub/target.txt");
    assert_eq!(ws.contents("sub/target.txt"), "rewritten\n");
    assert_eq!(ws.contents("target.txt"), "at root\n");
}

#[test]
fn missing_file_read_is_soft_error() {
    let ws = Workspace::new();
    let response = ws.read(json!({ "path": "nope.txt" }));
    assert_eq!(response["status"], "error");
    assert_eq!(response["message"], "file not found: nope.txt");
    assert_eq!(response["meta"]["function_name"], "read_file");
}

#[test]
fn backup_written_before_primary() {
    let ws = Workspace::new();
    ws.seed("cfg.ini", "old=1\n");
    let response = ws.write(json!({
        "path": "cfg.ini",
        "mode": "overwrite",
        "content": "new=2\n",
        "make_backup": true
    }));

    assert_eq!(response["status"], "ok");
    assert_eq!(response["backup_path"], "cfg.ini.bak");
    assert_eq!(ws.contents("cfg.ini.bak"), "old=1\n");
    assert_eq!(ws.contents("cfg.ini"), "new=2\n");
}

#[test]
fn failed_backup_aborts_write() {
    let ws = Workspace::new();
    ws.seed("cfg.ini", "old=1\n");
    ws.seed("cfg.ini.bak/blocker", "");

    let response = ws.write(json!({
        "path": "cfg.ini",
        "mode": "append",
        "content": "new=2\n",
        "make_backup": true
    }));

    assert_eq!(response["status"], "error", "{response}");
    assert_eq!(response["path"], "cfg.ini");
    assert_eq!(ws.contents("cfg.ini"), "old=1\n");
}

#[test]
fn validation_happens_before_file_access() {
    let ws = Workspace::new();
    let missing_range = ws.write(json!({
        "path": "new.txt",
        "mode": "replace_range",
        "content": "x",
        "start_line": 2
    }));
    assert_eq!(missing_range["status"], "error");
    assert_eq!(
        missing_range["message"],
        "Bad tool args: replace_range mode requires 'start_line' and 'end_line'"
    );
    assert_eq!(missing_range["meta"]["function_name"], "write_file:replace_range");

    let inverted = ws.write(json!({
        "path": "new.txt",
        "mode": "replace_range",
        "content": "x",
        "start_line": 4,
        "end_line": 2
    }));
    assert_eq!(inverted["status"], "error");

    let zero = ws.write(json!({
        "path": "new.txt",
        "mode": "insert_after_line",
        "content": "x",
        "line": 0
    }));
    assert_eq!(zero["status"], "error");

    let bad_mode = ws.write(json!({ "path": "new.txt", "mode": "prepend", "content": "x" }));
    assert_eq!(bad_mode["status"], "error");

    assert!(!ws.path("new.txt").exists());
}

#[test]
fn explicit_nulls_are_absent() {
    let ws = Workspace::new();
    ws.seed("f.txt", "a\nb\n");
    let read = ws.read(json!({
        "path": "f.txt",
        "start_line": null,
        "end_line": null,
        "with_line_numbers": true
    }));
    assert_eq!(read["content"], "1: a\n2: b");

    let write = ws.write(json!({
        "path": "f.txt",
        "mode": "append",
        "content": "c\n",
        "base_sha256": null,
        "line": null,
        "start_line": null,
        "end_line": null
    }));
    assert_eq!(write["status"], "ok", "{write}");
    assert_eq!(write["summaries"][0]["affected_lines"], json!([3]));
}

#[test]
fn denied_patterns_block_secrets() {
    let ws = Workspace::new();
    let response = ws.write(json!({ "path": ".env", "mode": "overwrite", "content": "TOKEN=1\n" }));
    assert_eq!(response["status"], "error");
    assert!(
        response["message"]
            .as_str()
            .expect("message")
            .contains("denied pattern")
    );
    assert!(!ws.path(".env").exists());
}

#[test]
fn crlf_file_keeps_line_endings() {
    let ws = Workspace::new();
    ws.seed("win.txt", "one\r\ntwo\r\n");
    let response = ws.write(json!({
        "path": "win.txt",
        "mode": "insert_after_line",
        "content": "mid",
        "line": 1
    }));
    assert_eq!(response["status"], "ok");
    assert_eq!(ws.contents("win.txt"), "one\r\nmid\r\ntwo\r\n");
}
