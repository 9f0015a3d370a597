//! Shared test helpers for rewind integration tests.
//!
//! All tests use temp directories. Library-level tests drive a [`TestRepo`],
//! which wires a persisted `MemoryGraph`, the recorder hook, and the undo
//! engine together the same way the binary does. CLI tests run the built
//! binary through [`rewind_in`] / [`rewind_ok`].

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::{Command, Output};

use rewind::args::UndoArgs;
use rewind::config::UndoConfig;
use rewind::snapshot::RepoSnapshot;
use rewind::store::{StorageLayout, UndoLog};
use rewind::{CommandRunner, GRAPH_FILE, META_DIR, Outcome, Recorder, UndoEngine, UndoError};
use rewind_graph::{CommitGraph, CommitId, GraphError, MemoryGraph};
use tempfile::TempDir;

/// A repository in a temp directory with recording enabled.
pub struct TestRepo {
    dir: TempDir,
    pub graph: MemoryGraph,
    runner: CommandRunner<MemoryGraph>,
    pub engine: UndoEngine,
}

impl TestRepo {
    pub fn new() -> Self {
        Self::with_config(UndoConfig::default())
    }

    pub fn with_config(config: UndoConfig) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let graph = MemoryGraph::init(&dir.path().join(META_DIR).join(GRAPH_FILE))
            .expect("failed to init graph");
        let mut runner = CommandRunner::new();
        runner.register(Recorder::for_repo(dir.path(), config));
        let engine = UndoEngine::for_repo(dir.path());
        engine.layout().ensure().expect("failed to create undo log dir");
        Self {
            dir,
            graph,
            runner,
            engine,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> &StorageLayout {
        self.engine.layout()
    }

    pub fn log(&self) -> UndoLog {
        UndoLog::open(self.layout()).expect("failed to open undo log")
    }

    /// Run a recorded command. `line` is split on spaces into the recorded
    /// tokens.
    pub fn exec<T>(
        &mut self,
        line: &str,
        op: impl FnOnce(&mut MemoryGraph) -> Result<T, GraphError>,
    ) -> T {
        let tokens: Vec<String> = line.split(' ').map(str::to_owned).collect();
        self.runner
            .run(&mut self.graph, &tokens, |inv| op(inv.graph_mut()))
            .unwrap_or_else(|err| panic!("`{line}` failed: {err}"))
    }

    /// Make a change without recording it (recording inactive).
    pub fn unrecorded<T>(&mut self, op: impl FnOnce(&mut MemoryGraph) -> Result<T, GraphError>) -> T {
        self.graph
            .transact("unrecorded", op)
            .expect("unrecorded change failed")
    }

    pub fn commit(&mut self, message: &str) -> CommitId {
        self.exec(&format!("commit -m {message}"), |g| {
            g.transact("commit", |g| MemoryGraph::commit(g, message))
        })
    }

    /// Write a file and commit it, so each commit has distinct content.
    pub fn commit_file(&mut self, path: &str, content: &str) -> CommitId {
        self.exec(&format!("commit -m {path}"), |g| {
            g.transact("commit", |g| {
                g.write_file(path, content)?;
                MemoryGraph::commit(g, path)
            })
        })
    }

    pub fn amend(&mut self, message: &str) -> CommitId {
        self.exec(&format!("amend -m {message}"), |g| {
            g.transact("amend", |g| g.amend(message))
        })
    }

    pub fn bookmark(&mut self, name: &str, id: CommitId) {
        self.exec(&format!("bookmark {name}"), |g| {
            g.transact("bookmark", |g| g.set_bookmark(name, id))
        });
    }

    pub fn update(&mut self, id: CommitId) {
        self.exec("update", |g| g.transact("update", |g| g.update_working(&id)));
    }

    pub fn publish(&mut self, id: CommitId) {
        self.exec("publish", |g| g.transact("publish", |g| g.publish(&id)));
    }

    pub fn write(&mut self, path: &str, content: &str) {
        self.exec(&format!("write {path}"), |g| {
            g.transact("write", |g| g.write_file(path, content))
        });
    }

    /// Undo through the runner, recording the canonical tokens like the CLI.
    pub fn undo(&mut self, args: UndoArgs) -> Result<Outcome, UndoError> {
        let mut args = args;
        if let Some(spec) = &args.branch
            && let Ok(id) = self.graph.resolve(spec)
        {
            args.branch = Some(id.to_string());
        }
        let engine = &self.engine;
        self.runner
            .run(&mut self.graph, &args.to_tokens(), |inv| {
                engine.undo(inv.graph_mut(), &args)
            })
    }

    pub fn undo_steps(&mut self, step: i64) -> Result<Outcome, UndoError> {
        self.undo(UndoArgs {
            step,
            ..UndoArgs::default()
        })
    }

    pub fn redo(&mut self) -> Result<Outcome, UndoError> {
        let engine = &self.engine;
        self.runner
            .run(&mut self.graph, &["redo".to_owned()], |inv| {
                engine.redo(inv.graph_mut(), false)
            })
    }

    pub fn working_parent(&self) -> CommitId {
        self.graph.working_parent().expect("working parent")
    }

    pub fn visible(&self) -> BTreeSet<CommitId> {
        self.graph.visible_commits().into_iter().collect()
    }

    pub fn bookmarks(&self) -> BTreeMap<String, CommitId> {
        self.graph.bookmarks().expect("bookmarks")
    }

    pub fn snapshot(&self) -> RepoSnapshot {
        RepoSnapshot::capture(&self.graph).expect("capture")
    }
}

// ---------------------------------------------------------------------------
// CLI helpers
// ---------------------------------------------------------------------------

/// Run rewind against the repository at `dir`.
pub fn rewind_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rewind"))
        .arg("-R")
        .arg(dir)
        .args(args)
        .env_remove("REWIND_REPO")
        .env_remove("REWIND_LOG")
        .output()
        .expect("failed to execute rewind")
}

/// Run rewind and assert it succeeds. Returns stdout as string.
pub fn rewind_ok(dir: &Path, args: &[&str]) -> String {
    let out = rewind_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "rewind {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run rewind and assert it fails. Returns stderr as string.
pub fn rewind_err(dir: &Path, args: &[&str]) -> String {
    let out = rewind_in(dir, args);
    assert!(
        !out.status.success(),
        "rewind {} unexpectedly succeeded:\n{}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout)
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}

/// A fresh repository initialized through the CLI.
pub fn setup_cli_repo() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    rewind_ok(dir.path(), &["init"]);
    dir
}
