//! `rewind history`: listing and inspecting recorded states.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rewind_graph::{CommitGraph, CommitId};
use serde::Serialize;

use crate::error::UndoError;
use crate::query;
use crate::store::UndoLog;

const GAP_LABEL: &str = " -- gap in log -- ";

// ---------------------------------------------------------------------------
// List view
// ---------------------------------------------------------------------------

/// One line of `history --list`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListItem {
    pub reverse: i64,
    pub command: Vec<String>,
    pub gap: bool,
}

/// Recent entries starting at a reverse index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoryList {
    pub offset: i64,
    pub entries: Vec<ListItem>,
}

/// Up to `limit` entries from reverse index `offset` towards older ones.
/// A negative offset counts the same as its magnitude. Entries outside the
/// log are skipped.
///
/// # Errors
/// Storage corruption.
pub fn list(log: &UndoLog, offset: i64, limit: usize) -> Result<HistoryList, UndoError> {
    let offset = offset.saturating_abs();
    let mut entries = Vec::new();
    for reverse in (offset..=i64::MAX).take(limit) {
        match query::entry_at(log, reverse) {
            Ok(entry) => entries.push(ListItem {
                reverse,
                gap: entry.is_gap(),
                command: entry.command,
            }),
            Err(UndoError::OutOfRange { .. }) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(HistoryList { offset, entries })
}

impl fmt::Display for HistoryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(f, "None");
        }
        for item in &self.entries {
            if item.gap {
                writeln!(f, "{}: {GAP_LABEL}", item.reverse)?;
            } else {
                writeln!(f, "{}: {}", item.reverse, item.command.join(" "))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Index view
// ---------------------------------------------------------------------------

/// Draft heads of an entry: relative to the previous entry, or raw for the
/// oldest one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftHeads {
    Raw {
        heads: BTreeSet<CommitId>,
    },
    Delta {
        added: BTreeSet<CommitId>,
        removed: BTreeSet<CommitId>,
    },
}

/// Everything recorded for one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryDetail {
    pub index: usize,
    pub reverse: i64,
    pub command: Vec<String>,
    pub gap: bool,
    pub bookmarks: BTreeMap<String, CommitId>,
    /// ISO 8601, UTC.
    pub date: String,
    pub draft_heads: DraftHeads,
    pub working_parent: CommitId,
    /// How the live repository differs from this entry, when a graph was
    /// consulted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<SinceEntry>,
}

/// A draft commit whose visibility differs between an entry and now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitChange {
    pub commit: CommitId,
    pub bookmarks: Vec<String>,
}

/// What restoring an entry would do to draft commits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SinceEntry {
    /// Visible now, not then; bookmarks are the ones added to it since.
    pub hide: Vec<CommitChange>,
    /// Visible then, hidden now; bookmarks are the ones it had then.
    pub restore: Vec<CommitChange>,
}

/// Draft commits that appeared or disappeared after the entry at `reverse`.
///
/// # Errors
/// [`UndoError::OutOfRange`], graph errors, or storage corruption.
pub fn since_entry<G: CommitGraph + ?Sized>(
    log: &UndoLog,
    graph: &G,
    reverse: i64,
) -> Result<SinceEntry, UndoError> {
    let live = query::live_drafts(graph)?;
    let then = query::done_commits(log, graph, reverse)?;

    let mut since = SinceEntry::default();
    for commit in query::undone_commits(log, graph, reverse)? {
        if live.contains(&commit) {
            since.hide.push(CommitChange {
                commit,
                bookmarks: query::removed_bookmarks(log, graph, reverse, &commit)?,
            });
        }
    }
    for commit in then.difference(&live) {
        since.restore.push(CommitChange {
            commit: *commit,
            bookmarks: query::old_bookmarks(log, reverse, commit)?,
        });
    }
    Ok(since)
}

/// [`detail`] plus the comparison against the live repository.
///
/// # Errors
/// See [`detail`] and [`since_entry`].
pub fn detail_with_changes<G: CommitGraph + ?Sized>(
    log: &UndoLog,
    graph: &G,
    reverse: i64,
) -> Result<EntryDetail, UndoError> {
    let mut detail = detail(log, reverse)?;
    detail.since = Some(since_entry(log, graph, reverse)?);
    Ok(detail)
}

/// Details of the entry at reverse index `reverse`.
///
/// # Errors
/// [`UndoError::OutOfRange`] or storage corruption.
pub fn detail(log: &UndoLog, reverse: i64) -> Result<EntryDetail, UndoError> {
    let entry = query::entry_at(log, reverse)?;
    let previous = match entry.index.checked_sub(1) {
        Some(abs) => log.entry(abs)?,
        None => None,
    };
    let heads = &entry.snapshot.draft_heads;
    let draft_heads = match previous {
        Some(prev) => DraftHeads::Delta {
            added: heads.difference(&prev.snapshot.draft_heads).copied().collect(),
            removed: prev.snapshot.draft_heads.difference(heads).copied().collect(),
        },
        None => DraftHeads::Raw {
            heads: heads.clone(),
        },
    };
    Ok(EntryDetail {
        index: entry.index,
        reverse,
        gap: entry.is_gap(),
        date: entry.timestamp.to_iso8601(),
        command: entry.command,
        bookmarks: entry.snapshot.bookmarks,
        draft_heads,
        working_parent: entry.snapshot.working_parent,
        since: None,
    })
}

impl fmt::Display for EntryDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "command:")?;
        if self.gap {
            writeln!(f, "\tunknown command(s) run, gap in log")?;
        } else {
            writeln!(f, "\t{}", self.command.join(" "))?;
        }

        writeln!(f, "bookmarks:")?;
        for (name, id) in &self.bookmarks {
            writeln!(f, "\t{name} {id}")?;
        }

        writeln!(f, "date:")?;
        writeln!(f, "\t{}", self.date)?;

        writeln!(f, "draft heads:")?;
        match &self.draft_heads {
            DraftHeads::Raw { heads } => {
                for id in heads {
                    writeln!(f, "\t{id}")?;
                }
            }
            DraftHeads::Delta { added, removed } => {
                for id in added {
                    writeln!(f, "\tADDED: {id}")?;
                }
                for id in removed {
                    writeln!(f, "\tREMOVED: {id}")?;
                }
            }
        }

        writeln!(f, "working parent:")?;
        writeln!(f, "\t{}", self.working_parent)?;

        if let Some(since) = &self.since {
            write_changes(f, "undoing to here hides:", &since.hide)?;
            write_changes(f, "undoing to here restores:", &since.restore)?;
        }
        Ok(())
    }
}

fn write_changes(f: &mut fmt::Formatter<'_>, title: &str, changes: &[CommitChange]) -> fmt::Result {
    if changes.is_empty() {
        return Ok(());
    }
    writeln!(f, "{title}")?;
    for change in changes {
        if change.bookmarks.is_empty() {
            writeln!(f, "\t{}", change.commit.short())?;
        } else {
            writeln!(f, "\t{} ({})", change.commit.short(), change.bookmarks.join(", "))?;
        }
    }
    Ok(())
}
