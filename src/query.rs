//! Read-only queries over recorded states, addressed by reverse index.
//!
//! "Old drafts" of a state are the draft commits that were visible then: the
//! draft ancestors of its recorded draft heads, hidden ones included. Phases
//! are read from the live graph, so commits published since no longer count
//! as drafts.

use std::collections::BTreeSet;

use rewind_graph::{CommitGraph, CommitId, GraphError};

use crate::error::UndoError;
use crate::index;
use crate::snapshot::{LogEntry, RepoSnapshot};
use crate::store::UndoLog;

/// The entry at a reverse index.
///
/// # Errors
/// [`UndoError::OutOfRange`] when `reverse` is outside the log, or storage
/// corruption.
pub fn entry_at(log: &UndoLog, reverse: i64) -> Result<LogEntry, UndoError> {
    let out_of_range = || UndoError::OutOfRange {
        reverse_index: reverse,
        len: log.len(),
    };
    let absolute = index::absolute(log.len(), reverse).ok_or_else(out_of_range)?;
    log.entry(absolute)?.ok_or_else(out_of_range)
}

/// Draft commits visible in `snapshot`.
///
/// # Errors
/// Propagates graph errors.
pub fn drafts_of<G: CommitGraph + ?Sized>(
    graph: &G,
    snapshot: &RepoSnapshot,
) -> Result<BTreeSet<CommitId>, GraphError> {
    graph.draft_ancestors(&snapshot.draft_heads)
}

/// Draft commits visible right now.
///
/// # Errors
/// Propagates graph errors.
pub fn live_drafts<G: CommitGraph + ?Sized>(graph: &G) -> Result<BTreeSet<CommitId>, GraphError> {
    graph.draft_ancestors(&graph.draft_heads()?)
}

/// Draft commits visible `reverse` states ago.
///
/// # Errors
/// See [`entry_at`].
pub fn old_drafts<G: CommitGraph + ?Sized>(
    log: &UndoLog,
    graph: &G,
    reverse: i64,
) -> Result<BTreeSet<CommitId>, UndoError> {
    let entry = entry_at(log, reverse)?;
    Ok(drafts_of(graph, &entry.snapshot)?)
}

/// Commits that were visible drafts `reverse` states ago.
///
/// # Errors
/// See [`entry_at`].
pub fn done_commits<G: CommitGraph + ?Sized>(
    log: &UndoLog,
    graph: &G,
    reverse: i64,
) -> Result<BTreeSet<CommitId>, UndoError> {
    old_drafts(log, graph, reverse)
}

/// Draft commits that were not visible `reverse` states ago.
///
/// # Errors
/// See [`entry_at`].
pub fn undone_commits<G: CommitGraph + ?Sized>(
    log: &UndoLog,
    graph: &G,
    reverse: i64,
) -> Result<BTreeSet<CommitId>, UndoError> {
    let then = old_drafts(log, graph, reverse)?;
    let all = graph.draft_commits()?;
    Ok(all.difference(&then).copied().collect())
}

/// Bookmarks that pointed at `commit` `reverse` states ago.
///
/// # Errors
/// See [`entry_at`].
pub fn old_bookmarks(log: &UndoLog, reverse: i64, commit: &CommitId) -> Result<Vec<String>, UndoError> {
    let entry = entry_at(log, reverse)?;
    Ok(entry
        .snapshot
        .bookmarks
        .into_iter()
        .filter(|(_, id)| id == commit)
        .map(|(name, _)| name)
        .collect())
}

/// Bookmarks on `commit` now that were not on it `reverse` states ago.
///
/// # Errors
/// See [`entry_at`].
pub fn removed_bookmarks<G: CommitGraph + ?Sized>(
    log: &UndoLog,
    graph: &G,
    reverse: i64,
    commit: &CommitId,
) -> Result<Vec<String>, UndoError> {
    let old: BTreeSet<String> = old_bookmarks(log, reverse, commit)?.into_iter().collect();
    Ok(graph
        .bookmarks()?
        .into_iter()
        .filter(|(name, id)| id == commit && !old.contains(name))
        .map(|(name, _)| name)
        .collect())
}
