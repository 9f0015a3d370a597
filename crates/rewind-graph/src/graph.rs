//! The [`CommitGraph`] trait, the boundary between the undo subsystem and the
//! engine that actually stores commits, bookmarks, and visibility.
//!
//! The undo subsystem only orchestrates: it reads the three tracked facets
//! (bookmarks, visible draft heads, working parent), queries topology and
//! obsolescence, and applies reconciled state back through these methods.
//!
//! | Group          | Methods                                                        |
//! |----------------|----------------------------------------------------------------|
//! | Bookmarks      | `bookmarks`, `apply_bookmark_changes`                          |
//! | Topology       | `resolve`, `parents`, `phase`, `draft_heads`, `draft_ancestors`, `draft_commits`, `local_branch` |
//! | Working state  | `working_parent`, `is_dirty`, `unfinished_operation`, `update_working`, `manifest_diff`, `rebuild_working_state` |
//! | Obsolescence   | `predecessors`, `successors`, `hide`, `reveal`                 |
//! | Transactions   | `begin_transaction`, `commit_transaction`, `rollback_transaction` |
//!
//! Mutating methods must be called inside a transaction; implementations
//! return [`GraphError::NoTransaction`] otherwise. Use
//! [`Transaction`](crate::Transaction) rather than calling the transaction
//! primitives directly.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::GraphError;
use crate::types::{CommitId, ManifestChange, Phase};

/// Commit-graph capabilities required by the undo subsystem.
///
/// Object-safe: callers may use `&dyn CommitGraph`.
pub trait CommitGraph {
    // -----------------------------------------------------------------------
    // Bookmarks
    // -----------------------------------------------------------------------

    /// Current bookmark mapping, name → commit.
    fn bookmarks(&self) -> Result<BTreeMap<String, CommitId>, GraphError>;

    /// Apply bookmark edits in order: `Some(id)` sets, `None` deletes
    /// (deleting a missing bookmark is a no-op).
    fn apply_bookmark_changes(
        &mut self,
        changes: &[(String, Option<CommitId>)],
    ) -> Result<(), GraphError>;

    // -----------------------------------------------------------------------
    // Topology and phases
    // -----------------------------------------------------------------------

    /// Resolve a user-supplied revision: a full id, a unique id prefix, a
    /// bookmark name, `.` for the working parent, or `null`.
    fn resolve(&self, spec: &str) -> Result<CommitId, GraphError>;

    /// Parents of a commit (empty for roots).
    fn parents(&self, id: &CommitId) -> Result<Vec<CommitId>, GraphError>;

    /// Publication state of a commit. The null commit is public.
    fn phase(&self, id: &CommitId) -> Result<Phase, GraphError>;

    /// Heads of the visible draft commits.
    fn draft_heads(&self) -> Result<BTreeSet<CommitId>, GraphError>;

    /// Draft commits that are ancestors of (or equal to) any of `heads`,
    /// hidden ones included.
    fn draft_ancestors(&self, heads: &BTreeSet<CommitId>) -> Result<BTreeSet<CommitId>, GraphError>;

    /// Every draft commit, hidden ones included.
    fn draft_commits(&self) -> Result<BTreeSet<CommitId>, GraphError>;

    /// The local branch identified by `id`: the maximal connected set of draft
    /// commits reachable from it without crossing a public commit. A public
    /// commit identifies the branch grown from its draft children.
    fn local_branch(&self, id: &CommitId) -> Result<BTreeSet<CommitId>, GraphError>;

    // -----------------------------------------------------------------------
    // Working state
    // -----------------------------------------------------------------------

    /// The commit the working state is based on.
    fn working_parent(&self) -> Result<CommitId, GraphError>;

    /// Whether the working state has uncommitted changes.
    fn is_dirty(&self) -> Result<bool, GraphError>;

    /// Name of an interrupted multi-step operation, if one is pending.
    fn unfinished_operation(&self) -> Option<String>;

    /// Move the working state to `target`, replacing tracked file contents.
    fn update_working(&mut self, target: &CommitId) -> Result<(), GraphError>;

    /// Paths that differ between `from` and `to`; `to = None` compares against
    /// the working state.
    fn manifest_diff(
        &self,
        from: &CommitId,
        to: Option<&CommitId>,
    ) -> Result<Vec<ManifestChange>, GraphError>;

    /// Re-parent the working state onto `parent` while keeping on-disk file
    /// contents. `changes` is `manifest_diff(parent, None)`: paths absent from
    /// `parent` become added, paths absent from disk become removed.
    fn rebuild_working_state(
        &mut self,
        parent: &CommitId,
        changes: &[ManifestChange],
    ) -> Result<(), GraphError>;

    // -----------------------------------------------------------------------
    // Obsolescence and visibility
    // -----------------------------------------------------------------------

    /// All transitive predecessors of a commit.
    fn predecessors(&self, id: &CommitId) -> Result<BTreeSet<CommitId>, GraphError>;

    /// All transitive successors of a commit.
    fn successors(&self, id: &CommitId) -> Result<BTreeSet<CommitId>, GraphError>;

    /// Hide a commit, recording `successors` as what it was replaced by
    /// (empty: hidden without linkage).
    fn hide(&mut self, id: &CommitId, successors: &[CommitId]) -> Result<(), GraphError>;

    /// Make hidden commits visible again.
    fn reveal(&mut self, ids: &BTreeSet<CommitId>) -> Result<(), GraphError>;

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Take the repository locks and open a transaction.
    fn begin_transaction(&mut self, description: &str) -> Result<(), GraphError>;

    /// Make every mutation since `begin_transaction` durable and release locks.
    fn commit_transaction(&mut self) -> Result<(), GraphError>;

    /// Discard every mutation since `begin_transaction` and release locks.
    fn rollback_transaction(&mut self);
}
