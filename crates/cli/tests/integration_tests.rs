/// End-to-end tests for the cli binary
/// Tests cover: create, info, dump, get, prefix/range scans, verify, merge, usage errors, help
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::tempdir;

/// Helper to run the binary with `args`, feeding `stdin`, and capture output
fn run_cli(args: &[&str], stdin: &str, env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cli"));
    cmd.args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("Failed to spawn CLI");
    let mut pipe = child.stdin.take().expect("Failed to open stdin");
    // The binary may exit before reading stdin (usage or config errors).
    let _ = pipe.write_all(stdin.as_bytes());
    drop(pipe);
    child.wait_with_output().expect("Failed to read output")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

fn path_str(p: &Path) -> &str {
    p.to_str().unwrap()
}

fn create(path: &Path, lines: &str) {
    let out = run_cli(&["create", path_str(path)], lines, &[]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn test_create_and_get() {
    let dir = tempdir().unwrap();
    let t = dir.path().join("t.sst");

    let out = run_cli(&["create", path_str(&t)], "name\tAlice\ncity\tParis\n", &[]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("wrote 2 entries"));

    let out = run_cli(&["get", "name", path_str(&t)], "", &[]);
    assert_eq!(stdout(&out), "Alice\n");

    let out = run_cli(&["get", "nobody", path_str(&t)], "", &[]);
    assert_eq!(stdout(&out), "(nil)\n");
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = tempdir().unwrap();
    let t = dir.path().join("t.sst");
    create(&t, "a\t1\n");

    let out = run_cli(&["create", path_str(&t)], "b\t2\n", &[]);
    assert!(!out.status.success());

    // Original content is untouched.
    let out = run_cli(&["dump", path_str(&t)], "", &[]);
    assert_eq!(stdout(&out), "a\t1\n");
}

#[test]
fn test_info_reports_trailer() {
    let dir = tempdir().unwrap();
    let t = dir.path().join("t.sst");
    let out = run_cli(
        &["create", path_str(&t)],
        "a\t1\nb\t22\nc\t333\n",
        &[("SSTABLE_COMPRESSION", "none"), ("SSTABLE_BLOCK_SIZE", "4096")],
    );
    assert!(out.status.success());

    let out = run_cli(&["info", path_str(&t)], "", &[]);
    let text = stdout(&out);
    assert!(text.contains("count_entries: 3"), "{}", text);
    assert!(text.contains("compression: none"), "{}", text);
    assert!(text.contains("data_block_size: 4096"), "{}", text);
    assert!(text.contains("bytes_keys: 3"), "{}", text);
    assert!(text.contains("bytes_values: 6"), "{}", text);
}

#[test]
fn test_dump_is_sorted() {
    let dir = tempdir().unwrap();
    let t = dir.path().join("t.sst");
    create(&t, "c\t3\na\t1\nb\t2\n");

    let out = run_cli(&["dump", path_str(&t)], "", &[]);
    assert_eq!(stdout(&out), "a\t1\nb\t2\nc\t3\n");
}

#[test]
fn test_scans_across_files() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.sst");
    let b = dir.path().join("b.sst");
    create(&a, "user:1\tann\nuser:3\tcid\n");
    create(&b, "user:2\tbob\nvisitor\tx\n");

    let out = run_cli(&["prefix", "user:", path_str(&a), path_str(&b)], "", &[]);
    assert_eq!(
        stdout(&out),
        "user:1\tann\nuser:2\tbob\nuser:3\tcid\n(3 entries)\n"
    );

    let out = run_cli(
        &["range", "user:2", "user:3", path_str(&a), path_str(&b)],
        "",
        &[],
    );
    assert_eq!(stdout(&out), "user:2\tbob\nuser:3\tcid\n(2 entries)\n");

    let out = run_cli(&["prefix", "admin", path_str(&a), path_str(&b)], "", &[]);
    assert_eq!(stdout(&out), "(empty)\n");
}

#[test]
fn test_merge_combines_colliding_keys() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.sst");
    let b = dir.path().join("b.sst");
    let m = dir.path().join("m.sst");
    create(&a, "k\t5\nonly-a\t1\n");
    create(&b, "k\t7\nonly-b\t2\n");

    let out = run_cli(
        &["merge", path_str(&m), path_str(&a), path_str(&b)],
        "",
        &[("SSTABLE_MERGE", "max")],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("(3 entries)"));

    let out = run_cli(&["dump", path_str(&m)], "", &[]);
    assert_eq!(stdout(&out), "k\t7\nonly-a\t1\nonly-b\t2\n");
}

#[test]
fn test_verify_flags_corruption() {
    let dir = tempdir().unwrap();
    let t = dir.path().join("t.sst");
    let lines: String = (0..500).map(|i| format!("key{:05}\tvalue{}\n", i, i)).collect();
    let out = run_cli(
        &["create", path_str(&t)],
        &lines,
        &[("SSTABLE_COMPRESSION", "none")],
    );
    assert!(out.status.success());

    let out = run_cli(&["verify", path_str(&t)], "", &[]);
    assert!(out.status.success());
    assert!(stdout(&out).starts_with("OK "));

    // Flip one byte inside the first data block's payload.
    let mut bytes = fs::read(&t).unwrap();
    bytes[20] ^= 0xFF;
    fs::write(&t, &bytes).unwrap();

    let out = run_cli(&["verify", path_str(&t)], "", &[]);
    assert!(!out.status.success());
    assert!(stdout(&out).contains("FAILED"));
    assert!(stdout(&out).contains("checksum mismatch"));
}

#[test]
fn test_usage_errors() {
    let out = run_cli(&[], "", &[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage:"));

    let out = run_cli(&["get", "only-a-key"], "", &[]);
    assert_eq!(out.status.code(), Some(2));

    let out = run_cli(&["frobnicate", "x"], "", &[]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unrecognized subcommand"));
}

#[test]
fn test_help_is_not_a_key() {
    let dir = tempdir().unwrap();
    let t = dir.path().join("t.sst");
    create(&t, "-k\tdash\n");

    let out = run_cli(&["--help"], "", &[]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Usage:"));

    let out = run_cli(&["get", "--help", path_str(&t)], "", &[]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Usage: cli get"));
    assert!(!stdout(&out).contains("(nil)"));

    // Flag-looking keys are rejected unless passed after `--`.
    let out = run_cli(&["get", "-k", path_str(&t)], "", &[]);
    assert_eq!(out.status.code(), Some(2));

    let out = run_cli(&["get", "--", "-k", path_str(&t)], "", &[]);
    assert_eq!(stdout(&out), "dash\n");
}

#[test]
fn test_bad_configuration() {
    let dir = tempdir().unwrap();
    let t = dir.path().join("t.sst");
    let out = run_cli(
        &["create", path_str(&t)],
        "a\t1\n",
        &[("SSTABLE_COMPRESSION", "lz4")],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("SSTABLE_COMPRESSION"));
    assert!(!t.exists());
}
