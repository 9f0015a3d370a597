//! End-to-end tests driving the `rewind` binary.

mod common;

use common::{rewind_err, rewind_ok, setup_cli_repo};

#[test]
fn commands_outside_a_repository_explain_init() {
    let dir = tempfile::TempDir::new().unwrap();
    let stderr = rewind_err(dir.path(), &["log"]);
    assert!(stderr.contains("rewind init"), "stderr: {stderr}");
}

#[test]
fn init_twice_is_refused() {
    let dir = setup_cli_repo();
    let stderr = rewind_err(dir.path(), &["init"]);
    assert!(stderr.contains("already initialized"), "stderr: {stderr}");
}

#[test]
fn amend_then_undo_then_redo() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["write", "notes.txt", "hello"]);
    rewind_ok(root, &["commit", "-m", "first"]);
    rewind_ok(root, &["bookmark", "main"]);
    rewind_ok(root, &["write", "notes.txt", "hello, world"]);
    rewind_ok(root, &["amend", "-m", "first, reworded"]);

    let log = rewind_ok(root, &["log"]);
    assert!(log.contains("first, reworded"), "log: {log}");

    let out = rewind_ok(root, &["undo"]);
    assert!(out.starts_with("restored state"), "undo: {out}");
    let log = rewind_ok(root, &["log"]);
    assert!(log.contains("[main] first\n"), "log: {log}");
    assert!(!log.contains("reworded"), "log: {log}");

    rewind_ok(root, &["redo"]);
    let log = rewind_ok(root, &["log"]);
    assert!(log.contains("[main] first, reworded"), "log: {log}");
}

#[test]
fn preview_does_not_change_anything() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["commit", "-m", "one"]);
    rewind_ok(root, &["commit", "-m", "two"]);

    let out = rewind_ok(root, &["undo", "--preview"]);
    assert!(out.starts_with("would restore"), "preview: {out}");
    assert!(out.contains("hide"), "preview: {out}");
    assert!(rewind_ok(root, &["log"]).contains("two"));
}

#[test]
fn history_list_and_index() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["commit", "-m", "one"]);
    rewind_ok(root, &["bookmark", "main"]);

    let list = rewind_ok(root, &["history", "--list"]);
    assert!(list.starts_with("0: bookmark main\n1: commit -m one\n"), "list: {list}");
    assert!(list.contains(" -- gap in log -- "), "list: {list}");

    let detail = rewind_ok(root, &["history", "--index", "0"]);
    assert!(detail.contains("command:\n\tbookmark main"), "detail: {detail}");
    assert!(detail.contains("bookmarks:\n\tmain "), "detail: {detail}");

    let json = rewind_ok(root, &["history", "1", "--format", "json"]);
    let value: serde_json::Value = serde_json::from_str(&json).expect("history --format json should be valid JSON");
    assert_eq!(value["command"][0], "commit");
    assert_eq!(value["reverse"], 1);
}

#[test]
fn history_index_shows_commits_an_undo_would_hide() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["commit", "-m", "one"]);
    rewind_ok(root, &["commit", "-m", "two"]);

    let detail = rewind_ok(root, &["history", "--index", "1"]);
    assert!(detail.contains("undoing to here hides:\n\t"), "detail: {detail}");
    assert!(!detail.contains("restores:"), "detail: {detail}");
    let newest = rewind_ok(root, &["history", "--index", "0"]);
    assert!(!newest.contains("undoing to here"), "detail: {newest}");
}

#[test]
fn history_list_accepts_a_negative_offset() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["commit", "-m", "one"]);
    rewind_ok(root, &["commit", "-m", "two"]);
    let list = rewind_ok(root, &["history", "--list", "--", "-1"]);
    assert!(list.starts_with("1: commit -m one\n"), "list: {list}");
}

#[test]
fn history_first_command_records_the_initial_state() {
    let dir = setup_cli_repo();
    let root = dir.path();
    // The first recorded command finds no entry yet and logs the starting
    // state as a gap boundary.
    assert_eq!(rewind_ok(root, &["history", "--list"]), "0:  -- gap in log -- \n");
    assert_eq!(rewind_ok(root, &["history", "--list", "5"]), "None\n");
}

#[test]
fn undo_with_dirty_working_state_needs_keep() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["commit", "-m", "one"]);
    rewind_ok(root, &["commit", "-m", "two"]);
    rewind_ok(root, &["write", "scratch", "wip"]);

    let stderr = rewind_err(root, &["undo"]);
    assert!(stderr.contains("uncommitted changes"), "stderr: {stderr}");

    rewind_ok(root, &["undo", "--keep"]);
    let status = rewind_ok(root, &["status"]);
    assert!(status.contains("A scratch"), "status: {status}");
}

#[test]
fn out_of_range_undo_reports_the_log_size() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["commit", "-m", "one"]);
    let stderr = rewind_err(root, &["undo", "--step", "9"]);
    assert!(stderr.contains("index out of bounds"), "stderr: {stderr}");
}

#[test]
fn redo_with_nothing_to_redo_fails() {
    let dir = setup_cli_repo();
    let root = dir.path();
    rewind_ok(root, &["commit", "-m", "one"]);
    let stderr = rewind_err(root, &["redo"]);
    assert!(stderr.contains("nothing to redo"), "stderr: {stderr}");
}
