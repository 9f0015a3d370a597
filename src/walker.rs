//! Branch-scoped stepping through the undo log.
//!
//! A branch-scoped undo of N steps means "N recorded states that changed this
//! local branch", not N log entries. [`find_next_delta`] finds the next such
//! state from a starting reverse index.

use std::collections::BTreeSet;

use rewind_graph::{CommitGraph, CommitId};
use tracing::instrument;

use crate::error::UndoError;
use crate::query;
use crate::snapshot::LogEntry;
use crate::store::UndoLog;

/// Direction of a walk over reverse indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards older entries (reverse index grows).
    Older,
    /// Towards newer entries (reverse index shrinks).
    Newer,
}

impl Direction {
    /// Direction implied by the sign of a step count (`0` walks older).
    #[must_use]
    pub const fn of_steps(steps: i64) -> Self {
        if steps < 0 { Self::Newer } else { Self::Older }
    }

    const fn delta(self) -> i64 {
        match self {
            Self::Older => 1,
            Self::Newer => -1,
        }
    }
}

/// Reverse index of the nearest entry in `direction` from `start` whose state
/// differs from `start` within `branch`:
///
/// - a draft commit of the branch is visible in one state and not the other,
/// - a bookmark pointing into the branch was added, moved, or removed,
/// - the working parent moved between two commits of the branch.
///
/// # Errors
/// [`UndoError::OutOfRange`] when `start` is outside the log or the walk
/// leaves it before finding a change.
#[instrument(skip(log, graph, branch), fields(branch_size = branch.len()))]
pub fn find_next_delta<G: CommitGraph + ?Sized>(
    log: &UndoLog,
    graph: &G,
    start: i64,
    branch: &BTreeSet<CommitId>,
    direction: Direction,
) -> Result<i64, UndoError> {
    let origin = query::entry_at(log, start)?;
    let origin_drafts = query::drafts_of(graph, &origin.snapshot)?;

    let mut candidate = start;
    loop {
        candidate += direction.delta();
        let entry = query::entry_at(log, candidate)?;
        if changes_branch(graph, &origin, &origin_drafts, &entry, branch)? {
            tracing::debug!(candidate, "found branch delta");
            return Ok(candidate);
        }
    }
}

fn changes_branch<G: CommitGraph + ?Sized>(
    graph: &G,
    origin: &LogEntry,
    origin_drafts: &BTreeSet<CommitId>,
    candidate: &LogEntry,
    branch: &BTreeSet<CommitId>,
) -> Result<bool, UndoError> {
    let drafts = query::drafts_of(graph, &candidate.snapshot)?;
    if drafts
        .symmetric_difference(origin_drafts)
        .any(|id| branch.contains(id))
    {
        return Ok(true);
    }

    let (before, after) = (&origin.snapshot.bookmarks, &candidate.snapshot.bookmarks);
    let bookmark_moved = before
        .iter()
        .filter(|(name, id)| after.get(*name) != Some(*id))
        .chain(after.iter().filter(|(name, id)| before.get(*name) != Some(*id)))
        .any(|(_, id)| branch.contains(id));
    if bookmark_moved {
        return Ok(true);
    }

    let (from, to) = (
        origin.snapshot.working_parent,
        candidate.snapshot.working_parent,
    );
    Ok(from != to && branch.contains(&from) && branch.contains(&to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{RepoSnapshot, Timestamp};
    use crate::store::StorageLayout;
    use rewind_graph::MemoryGraph;
    use tempfile::TempDir;

    fn record(log: &mut UndoLog, graph: &MemoryGraph, command: &str) {
        let snap = RepoSnapshot::capture(graph).unwrap();
        log.append(&Timestamp::now(), &[command.to_owned()], &snap)
            .unwrap();
    }

    #[test]
    fn skips_states_that_only_touch_other_branches() {
        let dir = TempDir::new().unwrap();
        let mut log = UndoLog::open(&StorageLayout::new(dir.path())).unwrap();
        let mut graph = MemoryGraph::new();

        let base = graph
            .transact("base", |g| {
                let p = g.commit("p")?;
                g.publish(&p)?;
                Ok(p)
            })
            .unwrap();
        let a1 = graph.transact("a1", |g| g.commit("a1")).unwrap();
        record(&mut log, &graph, "commit");
        graph
            .transact("b1", |g| {
                g.update_working(&base)?;
                g.commit("b1").map(drop)
            })
            .unwrap();
        record(&mut log, &graph, "commit");
        graph
            .transact("mark", |g| g.set_bookmark("other", base))
            .unwrap();
        record(&mut log, &graph, "bookmark");

        let branch = graph.local_branch(&a1).unwrap();
        // Newest two states only touched b1 and a public bookmark; the state
        // before a1 existed is out of range.
        let err = find_next_delta(&log, &graph, 0, &branch, Direction::Older).unwrap_err();
        assert!(matches!(err, UndoError::OutOfRange { .. }));

        let b1 = graph.resolve(".").unwrap();
        let b_branch = graph.local_branch(&b1).unwrap();
        assert_eq!(
            find_next_delta(&log, &graph, 0, &b_branch, Direction::Older).unwrap(),
            2
        );
        assert_eq!(
            find_next_delta(&log, &graph, 2, &b_branch, Direction::Newer).unwrap(),
            1
        );
    }

    #[test]
    fn direction_from_sign() {
        assert_eq!(Direction::of_steps(3), Direction::Older);
        assert_eq!(Direction::of_steps(-1), Direction::Newer);
    }
}
