//! Undo and redo.
//!
//! An undo picks a target entry in the undo log, plans the changes that
//! reconcile the live repository with it ([`apply::plan`]), and applies them
//! in one graph transaction. The redo pointer file remembers where relative
//! arithmetic resumes, so repeated `undo` walks further back and `redo`
//! walks forward again.
//!
//! # Redo pointer
//!
//! The pointer names the entry last undone or redone to, plus the branch an
//! undo was scoped to. It is staged before the graph transaction commits and
//! installed right after, so a failed undo never moves it. Any recorded
//! command other than undo and redo clears it.

pub mod apply;

use std::collections::BTreeSet;
use std::path::Path;

use rewind_graph::{CommitGraph, CommitId, GraphError, Transaction};
use serde::Serialize;
use tracing::instrument;

use crate::args::UndoArgs;
use crate::error::UndoError;
use crate::gap;
use crate::index;
use crate::query;
use crate::redo_pointer::{PointerUpdate, RedoPointer};
use crate::store::{StorageLayout, UndoLog};
use crate::walker::{self, Direction};

pub use apply::{BookmarkChange, HideCommit, UndoPlan, WorkingMove};

/// Result of an undo or redo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub plan: UndoPlan,
    /// `false` for previews.
    pub applied: bool,
}

/// Runs undo and redo against one repository's undo log.
#[derive(Clone, Debug)]
pub struct UndoEngine {
    layout: StorageLayout,
}

impl UndoEngine {
    #[must_use]
    pub const fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Engine for the repository at `root`.
    #[must_use]
    pub fn for_repo(root: &Path) -> Self {
        Self::new(StorageLayout::for_repo(root))
    }

    #[must_use]
    pub const fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    // -----------------------------------------------------------------------
    // Undo
    // -----------------------------------------------------------------------

    /// Undo to the state `args.step` steps back.
    ///
    /// # Errors
    /// - [`UndoError::InvalidArgument`] for unsupported option combinations
    /// - [`UndoError::OutOfRange`] when the target is outside the log
    /// - [`UndoError::UnfinishedOperation`] / [`UndoError::UncommittedChanges`]
    /// - [`UndoError::RiskyUndo`] when the target lies before a gap and
    ///   `--force` was not given
    /// - graph and storage errors
    #[instrument(skip_all, fields(step = args.step, absolute = args.absolute, branch = ?args.branch))]
    pub fn undo<G: CommitGraph + ?Sized>(
        &self,
        graph: &mut G,
        args: &UndoArgs,
    ) -> Result<Outcome, UndoError> {
        validate(args)?;
        let log = UndoLog::open(&self.layout)?;

        let scope = match &args.branch {
            Some(spec) => {
                let commit = graph.resolve(spec)?;
                Some((commit, graph.local_branch(&commit)?))
            }
            None => None,
        };

        let reverse = if args.absolute {
            args.step
        } else {
            let scope = scope.as_ref().map(|(commit, members)| (*commit, members));
            self.relative(&log, &*graph, args.step, scope)?
        };
        let target = query::entry_at(&log, reverse)?;
        let members = scope.as_ref().map(|(_, members)| members);

        if args.previews() {
            let plan = apply::plan(&*graph, &target, reverse, members, args.keep)?;
            return Ok(Outcome {
                plan,
                applied: false,
            });
        }

        let mut tx = Transaction::begin(graph, "undo")?;
        check_ready(&*tx, args.keep)?;
        if !args.force && !gap::reachable(&log, target.index)? {
            return Err(UndoError::RiskyUndo {
                target: target.index,
                gap: gap::marker(&log)?,
            });
        }

        let plan = apply::plan(&*tx, &target, reverse, members, args.keep)?;
        apply::execute(&mut *tx, &plan)?;
        let pointer = RedoPointer {
            entry: target.id,
            branch: scope.map(|(commit, _)| commit),
        }
        .stage(&self.layout)?;
        tx.commit()?;
        PointerUpdate::Set(pointer).apply(&self.layout)?;

        tracing::info!(target = target.index, reverse, "undo applied");
        Ok(Outcome {
            plan,
            applied: true,
        })
    }

    // -----------------------------------------------------------------------
    // Redo
    // -----------------------------------------------------------------------

    /// Cancel the most recent undo that has not been redone yet.
    ///
    /// Scans from the newest entry: every `redo` seen adds one to a budget,
    /// every `undo` seen spends one. The first `undo` met with an empty
    /// budget is the one cancelled.
    ///
    /// # Errors
    /// - [`UndoError::NothingToRedo`] when the scan meets another command or
    ///   runs off the log
    /// - [`UndoError::CannotRedo`] when the scan would cross an absolute undo
    ///   or an undo whose recorded arguments can't be read
    /// - the same readiness and storage errors as [`undo`](Self::undo)
    #[instrument(skip_all)]
    pub fn redo<G: CommitGraph + ?Sized>(
        &self,
        graph: &mut G,
        preview: bool,
    ) -> Result<Outcome, UndoError> {
        let log = UndoLog::open(&self.layout)?;
        let shifted = self.relative(&log, &*graph, 0, None)?;

        let mut budget = 0_usize;
        let mut reverse = 0_i64;
        let cancelled = loop {
            let entry = query::entry_at(&log, reverse).map_err(|err| match err {
                UndoError::OutOfRange { .. } => UndoError::NothingToRedo,
                other => other,
            })?;
            match entry.command_name() {
                "redo" => budget += 1,
                "undo" => {
                    let args = UndoArgs::from_tokens(&entry.command).ok_or(UndoError::CannotRedo)?;
                    if budget == 0 {
                        break args;
                    }
                    if args.absolute {
                        return Err(UndoError::CannotRedo);
                    }
                    budget -= 1;
                }
                _ => return Err(UndoError::NothingToRedo),
            }
            reverse += 1;
        };

        // The entry just before the cancelled undo is the state it undid.
        let restored = reverse + 1;
        let target = query::entry_at(&log, restored)?;
        // Overflow can only come from a hand-edited step; it lands outside
        // the log like any other out-of-range pointer.
        let shifted = shifted.checked_sub(cancelled.step);

        if preview {
            let plan = apply::plan(&*graph, &target, restored, None, false)?;
            return Ok(Outcome {
                plan,
                applied: false,
            });
        }

        let branch = cancelled
            .branch
            .as_deref()
            .and_then(|spec| spec.parse::<CommitId>().ok().or_else(|| graph.resolve(spec).ok()));

        let mut tx = Transaction::begin(graph, "redo")?;
        check_ready(&*tx, false)?;
        let plan = apply::plan(&*tx, &target, restored, None, false)?;
        apply::execute(&mut *tx, &plan)?;

        let update = if branch.is_some() {
            PointerUpdate::Set(
                RedoPointer {
                    entry: target.id,
                    branch,
                }
                .stage(&self.layout)?,
            )
        } else if let Some(abs) = shifted.and_then(|s| index::absolute(log.len(), s))
            && let Some(entry) = log.index_entry(abs)
        {
            PointerUpdate::Set(
                RedoPointer {
                    entry: entry.id,
                    branch: None,
                }
                .stage(&self.layout)?,
            )
        } else {
            PointerUpdate::Clear
        };
        tx.commit()?;
        update.apply(&self.layout)?;

        tracing::info!(target = target.index, "redo applied");
        Ok(Outcome {
            plan,
            applied: true,
        })
    }

    // -----------------------------------------------------------------------
    // Relative addressing
    // -----------------------------------------------------------------------

    /// Reverse index reached by walking `steps` from the redo pointer.
    ///
    /// Without a branch, the pointer's position is added to `steps`, unless
    /// the last undo was branch-scoped, in which case counting restarts at
    /// the newest entry. With a branch, counting restarts when the branch
    /// differs from the pointer's, and each step moves to the next entry
    /// that changed the branch.
    ///
    /// # Errors
    /// [`UndoError::OutOfRange`] when a branch walk leaves the log, or graph
    /// and storage errors.
    pub fn relative<G: CommitGraph + ?Sized>(
        &self,
        log: &UndoLog,
        graph: &G,
        steps: i64,
        branch: Option<(CommitId, &BTreeSet<CommitId>)>,
    ) -> Result<i64, UndoError> {
        let (mut shift, old_branch) = RedoPointer::read(&self.layout)
            .and_then(|p| {
                let abs = log.position_of(&p.entry)?;
                Some((index::reverse(log.len(), abs)?, p.branch))
            })
            .unwrap_or((0, None));

        let Some((commit, members)) = branch else {
            if old_branch.is_some() {
                return Ok(steps);
            }
            return shift.checked_add(steps).ok_or(UndoError::OutOfRange {
                reverse_index: steps,
                len: log.len(),
            });
        };

        if let Some(old) = old_branch
            && old != commit
            && !same_branch(graph, members, &old)?
        {
            tracing::debug!("undo branch changed; counting from the newest entry");
            shift = 0;
        }
        let direction = Direction::of_steps(steps);
        for _ in 0..steps.unsigned_abs() {
            shift = walker::find_next_delta(log, graph, shift, members, direction)?;
        }
        Ok(shift)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn validate(args: &UndoArgs) -> Result<(), UndoError> {
    if args.branch.is_some() {
        if args.step.unsigned_abs() != 1 {
            return Err(UndoError::InvalidArgument {
                reason: "--branch only supports --step 1 or -1".to_owned(),
            });
        }
        if args.previews() {
            return Err(UndoError::InvalidArgument {
                reason: "--branch can't be combined with --preview".to_owned(),
            });
        }
    }
    Ok(())
}

fn check_ready<G: CommitGraph + ?Sized>(graph: &G, keep: bool) -> Result<(), UndoError> {
    if let Some(operation) = graph.unfinished_operation() {
        return Err(UndoError::UnfinishedOperation { operation });
    }
    if !keep && graph.is_dirty()? {
        return Err(UndoError::UncommittedChanges);
    }
    Ok(())
}

/// Whether the branch of `old` has no root outside `members`' roots. A
/// commit that no longer exists counts as a different branch.
fn same_branch<G: CommitGraph + ?Sized>(
    graph: &G,
    members: &BTreeSet<CommitId>,
    old: &CommitId,
) -> Result<bool, GraphError> {
    let old_members = match graph.local_branch(old) {
        Ok(m) => m,
        Err(GraphError::NotFound { .. }) => return Ok(false),
        Err(err) => return Err(err),
    };
    Ok(roots(graph, members)?.is_subset(&roots(graph, &old_members)?))
}

fn roots<G: CommitGraph + ?Sized>(
    graph: &G,
    members: &BTreeSet<CommitId>,
) -> Result<BTreeSet<CommitId>, GraphError> {
    let mut roots = BTreeSet::new();
    for id in members {
        if !graph.parents(id)?.iter().any(|p| members.contains(p)) {
            roots.insert(*id);
        }
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RepoSnapshot, Timestamp};
    use rewind_graph::MemoryGraph;
    use tempfile::TempDir;

    struct Repo {
        _dir: TempDir,
        engine: UndoEngine,
        graph: MemoryGraph,
    }

    impl Repo {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let engine = UndoEngine::new(StorageLayout::new(dir.path().join("undolog")));
            engine.layout().ensure().unwrap();
            Self {
                _dir: dir,
                engine,
                graph: MemoryGraph::new(),
            }
        }

        fn record(&self, command: &[String]) {
            let mut log = UndoLog::open(self.engine.layout()).unwrap();
            let snap = RepoSnapshot::capture(&self.graph).unwrap();
            if log.latest().unwrap().is_some_and(|e| e.snapshot == snap) {
                return;
            }
            log.append(&Timestamp::now(), command, &snap).unwrap();
            if !matches!(command[0].as_str(), "undo" | "redo") {
                RedoPointer::clear(self.engine.layout()).unwrap();
            }
        }

        fn commit(&mut self, message: &str) -> CommitId {
            let id = self
                .graph
                .transact(message, |g| MemoryGraph::commit(g, message))
                .unwrap();
            self.record(&["commit".to_owned()]);
            id
        }

        fn undo(&mut self, args: &UndoArgs) -> Result<Outcome, UndoError> {
            let out = self.engine.undo(&mut self.graph, args);
            if out.is_ok() {
                self.record(&args.to_tokens());
            }
            out
        }

        fn redo(&mut self) -> Result<Outcome, UndoError> {
            let out = self.engine.redo(&mut self.graph, false);
            if out.is_ok() {
                self.record(&["redo".to_owned()]);
            }
            out
        }
    }

    #[test]
    fn undo_then_redo_round_trips_working_parent() {
        let mut repo = Repo::new();
        let a = repo.commit("a");
        let b = repo.commit("b");

        repo.undo(&UndoArgs::default()).unwrap();
        assert_eq!(repo.graph.working_parent().unwrap(), a);
        assert!(repo.graph.is_hidden(&b));

        repo.redo().unwrap();
        assert_eq!(repo.graph.working_parent().unwrap(), b);
        assert!(!repo.graph.is_hidden(&b));
    }

    #[test]
    fn repeated_undo_walks_further_back() {
        let mut repo = Repo::new();
        let a = repo.commit("a");
        repo.commit("b");
        repo.commit("c");

        repo.undo(&UndoArgs::default()).unwrap();
        repo.undo(&UndoArgs::default()).unwrap();
        assert_eq!(repo.graph.working_parent().unwrap(), a);
        assert_eq!(repo.graph.visible_commits(), vec![a]);
    }

    #[test]
    fn preview_changes_nothing() {
        let mut repo = Repo::new();
        repo.commit("a");
        let b = repo.commit("b");
        let out = repo
            .engine
            .undo(
                &mut repo.graph,
                &UndoArgs {
                    preview: true,
                    ..UndoArgs::default()
                },
            )
            .unwrap();
        assert!(!out.applied);
        assert_eq!(out.plan.hide.len(), 1);
        assert_eq!(repo.graph.working_parent().unwrap(), b);
        assert!(RedoPointer::read(repo.engine.layout()).is_none());
    }

    #[test]
    fn redo_without_undo_is_nothing_to_redo() {
        let mut repo = Repo::new();
        repo.commit("a");
        assert!(matches!(repo.redo(), Err(UndoError::NothingToRedo)));
    }

    #[test]
    fn redo_refuses_to_cross_absolute_undo() {
        let mut repo = Repo::new();
        repo.commit("a");
        repo.commit("b");
        repo.commit("c");
        repo.undo(&UndoArgs {
            absolute: true,
            step: 2,
            ..UndoArgs::default()
        })
        .unwrap();
        repo.redo().unwrap();
        // Budget of one redo now has to skip the absolute undo.
        assert!(matches!(repo.redo(), Err(UndoError::CannotRedo)));
    }

    #[test]
    fn dirty_working_state_blocks_undo_unless_kept() {
        let mut repo = Repo::new();
        let a = repo.commit("a");
        repo.commit("b");
        repo.graph
            .transact("edit", |g| g.write_file("f", "dirty"))
            .unwrap();

        let err = repo.undo(&UndoArgs::default()).unwrap_err();
        assert!(matches!(err, UndoError::UncommittedChanges));

        repo.undo(&UndoArgs {
            keep: true,
            ..UndoArgs::default()
        })
        .unwrap();
        assert_eq!(repo.graph.working_parent().unwrap(), a);
        assert_eq!(
            repo.graph.working().files.get("f").map(String::as_str),
            Some("dirty")
        );
    }

    #[test]
    fn branch_with_large_step_is_rejected() {
        let mut repo = Repo::new();
        repo.commit("a");
        let err = repo
            .undo(&UndoArgs {
                branch: Some(".".to_owned()),
                step: 2,
                ..UndoArgs::default()
            })
            .unwrap_err();
        assert!(matches!(err, UndoError::InvalidArgument { .. }));
    }

    #[test]
    fn out_of_range_step_leaves_everything_alone() {
        let mut repo = Repo::new();
        let a = repo.commit("a");
        let err = repo
            .undo(&UndoArgs {
                step: 5,
                ..UndoArgs::default()
            })
            .unwrap_err();
        assert!(matches!(err, UndoError::OutOfRange { .. }));
        assert_eq!(repo.graph.working_parent().unwrap(), a);
    }

    #[test]
    fn roots_of_a_chain() {
        let mut repo = Repo::new();
        let a = repo.commit("a");
        let b = repo.commit("b");
        let members = BTreeSet::from([a, b]);
        assert_eq!(roots(&repo.graph, &members).unwrap(), BTreeSet::from([a]));
    }
}
