//! Reconciling the live repository with a recorded state.
//!
//! [`plan`] computes every change needed to return to a recorded entry:
//! bookmark edits, the working parent move, and which commits to hide or
//! reveal. [`execute`] applies a plan inside the caller's transaction.
//! Previews render the same plan without executing it.

use std::collections::{BTreeMap, BTreeSet};

use rewind_graph::{CommitGraph, CommitId, GraphError};
use serde::Serialize;

use crate::query;
use crate::snapshot::LogEntry;

/// One bookmark edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookmarkChange {
    pub name: String,
    /// Current target (`None`: the bookmark does not exist now).
    pub from: Option<CommitId>,
    /// Target after the undo (`None`: the bookmark is deleted).
    pub to: Option<CommitId>,
}

/// Move of the working parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WorkingMove {
    pub from: CommitId,
    pub to: CommitId,
    /// Keep on-disk file contents and only re-parent the working state.
    pub keep: bool,
}

/// A commit to hide, with the commit it was undone to when that is
/// unambiguous.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HideCommit {
    pub commit: CommitId,
    pub successor: Option<CommitId>,
}

/// Everything an undo or redo changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UndoPlan {
    /// Absolute index of the target entry.
    pub target: usize,
    /// Reverse index of the target entry when the plan was made.
    pub reverse: i64,
    /// Command recorded at the target entry.
    pub command: Vec<String>,
    /// Local branch the plan is limited to.
    pub branch: Option<BTreeSet<CommitId>>,
    pub bookmarks: Vec<BookmarkChange>,
    pub working: Option<WorkingMove>,
    pub hide: Vec<HideCommit>,
    pub reveal: BTreeSet<CommitId>,
}

impl UndoPlan {
    /// Whether executing the plan would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
            && self.working.is_none()
            && self.hide.is_empty()
            && self.reveal.is_empty()
    }
}

/// Compute the changes that take the repository back to `target`.
///
/// With a `branch`, only that local branch is touched:
///
/// - bookmarks pointing into the branch now are reset to their recorded
///   targets (even if a recorded target lies outside the branch); recorded
///   bookmarks pointing into the branch are restored;
/// - the working parent moves only if the recorded parent is in the branch;
/// - branch commits visible now but not then are hidden, and branch commits
///   visible then but not now are revealed. Commits outside the branch are
///   hidden only when they correspond to a revealed branch commit.
///
/// # Errors
/// Propagates graph errors.
pub fn plan<G: CommitGraph + ?Sized>(
    graph: &G,
    target: &LogEntry,
    reverse: i64,
    branch: Option<&BTreeSet<CommitId>>,
    keep: bool,
) -> Result<UndoPlan, GraphError> {
    let in_scope = |id: &CommitId| branch.is_none_or(|members| members.contains(id));

    let bookmarks = bookmark_changes(&graph.bookmarks()?, &target.snapshot.bookmarks, in_scope);

    let current_parent = graph.working_parent()?;
    let recorded_parent = target.snapshot.working_parent;
    let working = (recorded_parent != current_parent && in_scope(&recorded_parent)).then_some(
        WorkingMove {
            from: current_parent,
            to: recorded_parent,
            keep,
        },
    );

    let now = query::live_drafts(graph)?;
    let then = query::drafts_of(graph, &target.snapshot)?;
    let added: BTreeSet<CommitId> = now.difference(&then).copied().collect();
    let removed: BTreeSet<CommitId> = then.difference(&now).copied().collect();
    let local_removed: BTreeSet<CommitId> = removed.iter().filter(|id| in_scope(*id)).copied().collect();

    let mut hide = Vec::new();
    for commit in &added {
        let local = in_scope(commit);
        let candidates = if local { &removed } else { &local_removed };
        let mut related = graph.predecessors(commit)?;
        related.extend(graph.successors(commit)?);
        let matches: Vec<CommitId> = related.intersection(candidates).copied().collect();
        match matches.as_slice() {
            [only] => hide.push(HideCommit {
                commit: *commit,
                successor: Some(*only),
            }),
            [] if !local => {}
            // No correspondence, or a split/divergence we can't attribute.
            _ => hide.push(HideCommit {
                commit: *commit,
                successor: None,
            }),
        }
    }

    Ok(UndoPlan {
        target: target.index,
        reverse,
        command: target.command.clone(),
        branch: branch.cloned(),
        bookmarks,
        working,
        hide,
        reveal: local_removed,
    })
}

fn bookmark_changes(
    current: &BTreeMap<String, CommitId>,
    recorded: &BTreeMap<String, CommitId>,
    in_scope: impl Fn(&CommitId) -> bool,
) -> Vec<BookmarkChange> {
    let scoped_now: BTreeSet<&String> = current
        .iter()
        .filter(|(_, id)| in_scope(*id))
        .map(|(name, _)| name)
        .collect();
    let restored: BTreeMap<&String, CommitId> = recorded
        .iter()
        .filter(|(name, id)| in_scope(*id) || scoped_now.contains(name))
        .map(|(name, id)| (name, *id))
        .collect();

    let mut changes = Vec::new();
    for name in &scoped_now {
        if !restored.contains_key(name) {
            changes.push(BookmarkChange {
                name: (*name).clone(),
                from: current.get(*name).copied(),
                to: None,
            });
        }
    }
    for (name, id) in restored {
        let from = current.get(name).copied();
        if from != Some(id) {
            changes.push(BookmarkChange {
                name: name.clone(),
                from,
                to: Some(id),
            });
        }
    }
    changes.sort_by(|a, b| a.name.cmp(&b.name));
    changes
}

/// Apply a plan. Call inside a transaction.
///
/// # Errors
/// Propagates graph errors; the caller's transaction rolls everything back.
pub fn execute<G: CommitGraph + ?Sized>(graph: &mut G, plan: &UndoPlan) -> Result<(), GraphError> {
    if !plan.bookmarks.is_empty() {
        let changes: Vec<(String, Option<CommitId>)> = plan
            .bookmarks
            .iter()
            .map(|c| (c.name.clone(), c.to))
            .collect();
        graph.apply_bookmark_changes(&changes)?;
    }

    if let Some(mv) = &plan.working {
        if mv.keep {
            let changes = graph.manifest_diff(&mv.to, None)?;
            graph.rebuild_working_state(&mv.to, &changes)?;
        } else {
            graph.update_working(&mv.to)?;
        }
    }

    for h in &plan.hide {
        graph.hide(&h.commit, h.successor.as_slice())?;
    }
    if !plan.reveal.is_empty() {
        graph.reveal(&plan.reveal)?;
    }
    tracing::debug!(
        bookmarks = plan.bookmarks.len(),
        hidden = plan.hide.len(),
        revealed = plan.reveal.len(),
        moved_working = plan.working.is_some(),
        "applied undo plan"
    );
    Ok(())
}
