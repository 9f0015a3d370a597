//! [`MemoryGraph`]: an in-memory commit graph persisted as one JSON file.
//!
//! This is the reference [`CommitGraph`] implementation used by the `rewind`
//! binary and by tests. State lives in memory; a transaction snapshots it on
//! `begin`, holds the repository lock file, and writes the whole state
//! atomically (temp file + fsync + rename) on `commit`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::GraphError;
use crate::graph::CommitGraph;
use crate::txn::Transaction;
use crate::types::{CommitId, ManifestChange, Phase};

// ---------------------------------------------------------------------------
// Persisted state
// ---------------------------------------------------------------------------

/// A stored commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Parent commits (empty for roots).
    pub parents: Vec<CommitId>,
    /// Publication state.
    pub phase: Phase,
    /// Commit message.
    pub message: String,
    /// Tracked files, path → content.
    pub manifest: BTreeMap<String, String>,
}

/// An obsolescence marker: `predecessor` was replaced by `successors`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObsMarker {
    /// The replaced commit.
    pub predecessor: CommitId,
    /// Its replacements (empty when it was simply pruned).
    pub successors: Vec<CommitId>,
    /// The transaction that created the marker.
    pub operation: String,
}

/// The working state: its parent commit, the on-disk file contents, and
/// pending add/remove marks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingState {
    /// Parent commit of the working state.
    pub parent: CommitId,
    /// On-disk tracked files, path → content.
    pub files: BTreeMap<String, String>,
    /// Paths marked added relative to `parent`.
    pub added: BTreeSet<String>,
    /// Paths marked removed relative to `parent`.
    pub removed: BTreeSet<String>,
}

impl Default for WorkingState {
    fn default() -> Self {
        Self {
            parent: CommitId::NULL,
            files: BTreeMap::new(),
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
        }
    }
}

/// Everything persisted in `graph.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphState {
    #[serde(default)]
    commits: BTreeMap<CommitId, CommitRecord>,
    #[serde(default)]
    bookmarks: BTreeMap<String, CommitId>,
    #[serde(default)]
    hidden: BTreeSet<CommitId>,
    #[serde(default)]
    markers: Vec<ObsMarker>,
    #[serde(default)]
    working: WorkingState,
    #[serde(default)]
    unfinished: Option<String>,
    #[serde(default)]
    next_seq: u64,
}

// ---------------------------------------------------------------------------
// MemoryGraph
// ---------------------------------------------------------------------------

struct OpenTransaction {
    description: String,
    backup: GraphState,
    _lock: Option<File>,
}

/// In-memory commit graph, optionally backed by a JSON file.
pub struct MemoryGraph {
    state: GraphState,
    path: Option<PathBuf>,
    txn: Option<OpenTransaction>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    /// An empty graph that is never persisted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: GraphState::default(),
            path: None,
            txn: None,
        }
    }

    /// Load the graph stored at `path`; a missing file yields an empty graph
    /// that will be written there on the first commit.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        let state = match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).map_err(|source| GraphError::Serialize {
                path: path.to_owned(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => GraphState::default(),
            Err(source) => {
                return Err(GraphError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        Ok(Self {
            state,
            path: Some(path.to_owned()),
            txn: None,
        })
    }

    /// Create an empty persisted graph at `path`.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn init(path: &Path) -> Result<Self, GraphError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| GraphError::Io {
                path: dir.to_owned(),
                source,
            })?;
        }
        let graph = Self {
            state: GraphState::default(),
            path: Some(path.to_owned()),
            txn: None,
        };
        write_state_atomic(path, &graph.state)?;
        Ok(graph)
    }

    /// Run `f` inside a transaction, committing on success.
    ///
    /// # Errors
    /// Returns the error from `f` (after rolling back) or from the commit.
    pub fn transact<T>(
        &mut self,
        description: &str,
        f: impl FnOnce(&mut Self) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let mut tx = Transaction::begin(self, description)?;
        let value = f(&mut *tx)?;
        tx.commit()?;
        Ok(value)
    }

    // -- read accessors ------------------------------------------------------

    /// Look up a stored commit.
    #[must_use]
    pub fn commit_record(&self, id: &CommitId) -> Option<&CommitRecord> {
        self.state.commits.get(id)
    }

    /// Whether a commit is currently hidden.
    #[must_use]
    pub fn is_hidden(&self, id: &CommitId) -> bool {
        self.state.hidden.contains(id)
    }

    /// Every visible commit, ordered by id.
    #[must_use]
    pub fn visible_commits(&self) -> Vec<CommitId> {
        self.state
            .commits
            .keys()
            .filter(|id| !self.state.hidden.contains(id))
            .copied()
            .collect()
    }

    /// The working state.
    #[must_use]
    pub const fn working(&self) -> &WorkingState {
        &self.state.working
    }

    /// Obsolescence markers in creation order.
    #[must_use]
    pub fn markers(&self) -> &[ObsMarker] {
        &self.state.markers
    }

    // -- mutators (transaction required) ------------------------------------

    /// Commit the working state as a new draft child of the working parent.
    ///
    /// # Errors
    /// Returns [`GraphError::NoTransaction`] outside a transaction.
    pub fn commit(&mut self, message: &str) -> Result<CommitId, GraphError> {
        self.require_txn("commit")?;
        let parent = self.state.working.parent;
        let parents = if parent.is_null() { Vec::new() } else { vec![parent] };
        let record = CommitRecord {
            parents,
            phase: Phase::Draft,
            message: message.to_owned(),
            manifest: self.state.working.files.clone(),
        };
        let id = self.insert_commit(record);
        self.reset_working_marks(id);
        tracing::debug!(commit = %id.short(), "created commit");
        Ok(id)
    }

    /// Replace the working parent with a new commit holding the working
    /// state, obsoleting the old one and moving its bookmarks.
    ///
    /// # Errors
    /// Returns [`GraphError::NotFound`] when there is nothing to amend.
    pub fn amend(&mut self, message: &str) -> Result<CommitId, GraphError> {
        self.require_txn("amend")?;
        let old = self.state.working.parent;
        let old_record = self
            .state
            .commits
            .get(&old)
            .cloned()
            .ok_or_else(|| GraphError::not_found("no working parent to amend"))?;
        let record = CommitRecord {
            parents: old_record.parents,
            phase: Phase::Draft,
            message: message.to_owned(),
            manifest: self.state.working.files.clone(),
        };
        let new = self.insert_commit(record);
        self.push_marker(old, vec![new]);
        self.state.hidden.insert(old);
        for target in self.state.bookmarks.values_mut() {
            if *target == old {
                *target = new;
            }
        }
        self.reset_working_marks(new);
        tracing::debug!(old = %old.short(), new = %new.short(), "amended commit");
        Ok(new)
    }

    /// Make `id` and all of its ancestors public.
    ///
    /// # Errors
    /// Returns [`GraphError::NotFound`] for an unknown commit.
    pub fn publish(&mut self, id: &CommitId) -> Result<(), GraphError> {
        self.require_txn("publish")?;
        self.ensure_known(id)?;
        let mut queue = VecDeque::from([*id]);
        while let Some(next) = queue.pop_front() {
            if let Some(record) = self.state.commits.get_mut(&next)
                && record.phase == Phase::Draft
            {
                record.phase = Phase::Public;
                queue.extend(record.parents.iter().copied());
            }
        }
        Ok(())
    }

    /// Point bookmark `name` at `id`.
    ///
    /// # Errors
    /// Returns [`GraphError::NotFound`] for an unknown commit.
    pub fn set_bookmark(&mut self, name: &str, id: CommitId) -> Result<(), GraphError> {
        self.apply_bookmark_changes(&[(name.to_owned(), Some(id))])
    }

    /// Delete bookmark `name`.
    ///
    /// # Errors
    /// Returns [`GraphError::NotFound`] if no such bookmark exists.
    pub fn delete_bookmark(&mut self, name: &str) -> Result<(), GraphError> {
        if !self.state.bookmarks.contains_key(name) {
            return Err(GraphError::not_found(format!("bookmark '{name}'")));
        }
        self.apply_bookmark_changes(&[(name.to_owned(), None)])
    }

    /// Write a file in the working state.
    ///
    /// # Errors
    /// Returns [`GraphError::NoTransaction`] outside a transaction.
    pub fn write_file(&mut self, path: &str, content: &str) -> Result<(), GraphError> {
        self.require_txn("write_file")?;
        self.state
            .working
            .files
            .insert(path.to_owned(), content.to_owned());
        Ok(())
    }

    /// Delete a file from the working state.
    ///
    /// # Errors
    /// Returns [`GraphError::NotFound`] if the file is not present.
    pub fn remove_file(&mut self, path: &str) -> Result<(), GraphError> {
        self.require_txn("remove_file")?;
        self.state
            .working
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| GraphError::not_found(format!("file '{path}'")))
    }

    /// Mark (or clear) an interrupted multi-step operation.
    ///
    /// # Errors
    /// Returns [`GraphError::NoTransaction`] outside a transaction.
    pub fn set_unfinished(&mut self, operation: Option<&str>) -> Result<(), GraphError> {
        self.require_txn("set_unfinished")?;
        self.state.unfinished = operation.map(ToOwned::to_owned);
        Ok(())
    }

    // -- internals -----------------------------------------------------------

    fn require_txn(&self, operation: &'static str) -> Result<(), GraphError> {
        if self.txn.is_some() {
            Ok(())
        } else {
            Err(GraphError::NoTransaction { operation })
        }
    }

    fn ensure_known(&self, id: &CommitId) -> Result<(), GraphError> {
        if id.is_null() || self.state.commits.contains_key(id) {
            Ok(())
        } else {
            Err(GraphError::not_found(format!("commit {id}")))
        }
    }

    fn insert_commit(&mut self, record: CommitRecord) -> CommitId {
        let mut hasher = Sha256::new();
        hasher.update(self.state.next_seq.to_le_bytes());
        for parent in &record.parents {
            hasher.update(parent.as_bytes());
        }
        hasher.update(record.message.as_bytes());
        for (path, content) in &record.manifest {
            hasher.update(path.as_bytes());
            hasher.update([0]);
            hasher.update(content.as_bytes());
            hasher.update([0]);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[..20]);
        let id = CommitId::from_bytes(bytes);
        self.state.next_seq += 1;
        self.state.commits.insert(id, record);
        id
    }

    fn push_marker(&mut self, predecessor: CommitId, successors: Vec<CommitId>) {
        let operation = self
            .txn
            .as_ref()
            .map_or_else(String::new, |t| t.description.clone());
        self.state.markers.push(ObsMarker {
            predecessor,
            successors,
            operation,
        });
    }

    fn reset_working_marks(&mut self, parent: CommitId) {
        self.state.working.parent = parent;
        self.state.working.added.clear();
        self.state.working.removed.clear();
    }

    fn manifest(&self, id: &CommitId) -> Result<&BTreeMap<String, String>, GraphError> {
        static EMPTY: BTreeMap<String, String> = BTreeMap::new();
        if id.is_null() {
            return Ok(&EMPTY);
        }
        self.state
            .commits
            .get(id)
            .map(|record| &record.manifest)
            .ok_or_else(|| GraphError::not_found(format!("commit {id}")))
    }

    fn children(&self, id: &CommitId) -> Vec<CommitId> {
        self.state
            .commits
            .iter()
            .filter(|(_, record)| {
                if id.is_null() {
                    record.parents.is_empty()
                } else {
                    record.parents.contains(id)
                }
            })
            .map(|(child, _)| *child)
            .collect()
    }

    fn is_draft(&self, id: &CommitId) -> bool {
        self.state
            .commits
            .get(id)
            .is_some_and(|record| record.phase == Phase::Draft)
    }

    fn descendants(&self, roots: impl IntoIterator<Item = CommitId>) -> BTreeSet<CommitId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<CommitId> = roots.into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next) {
                queue.extend(self.children(&next));
            }
        }
        seen
    }

    fn follow_markers(&self, start: &CommitId, forward: bool) -> BTreeSet<CommitId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([*start]);
        while let Some(next) = queue.pop_front() {
            for marker in &self.state.markers {
                let related: Vec<CommitId> = if forward {
                    if marker.predecessor == next {
                        marker.successors.clone()
                    } else {
                        Vec::new()
                    }
                } else if marker.successors.contains(&next) {
                    vec![marker.predecessor]
                } else {
                    Vec::new()
                };
                for id in related {
                    if id != *start && seen.insert(id) {
                        queue.push_back(id);
                    }
                }
            }
        }
        seen
    }
}

fn digest(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hash.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn lock_path(state_path: &Path) -> PathBuf {
    state_path.with_file_name("lock")
}

fn acquire_lock(path: &Path) -> Result<File, GraphError> {
    let io_err = |source| GraphError::Io {
        path: path.to_owned(),
        source,
    };
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(io_err)?;
    file.lock_exclusive().map_err(io_err)?;
    Ok(file)
}

fn write_state_atomic(path: &Path, state: &GraphState) -> Result<(), GraphError> {
    let json = serde_json::to_string_pretty(state).map_err(|source| GraphError::Serialize {
        path: path.to_owned(),
        source,
    })?;
    let tmp_path = path.with_extension("json.tmp");
    let io_err = |p: &Path| {
        let p = p.to_owned();
        move |source: std::io::Error| GraphError::Io { path: p, source }
    };
    let mut file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
    file.write_all(json.as_bytes()).map_err(io_err(&tmp_path))?;
    file.sync_all().map_err(io_err(&tmp_path))?;
    drop(file);
    fs::rename(&tmp_path, path).map_err(io_err(path))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CommitGraph impl
// ---------------------------------------------------------------------------

impl CommitGraph for MemoryGraph {
    fn bookmarks(&self) -> Result<BTreeMap<String, CommitId>, GraphError> {
        Ok(self.state.bookmarks.clone())
    }

    fn apply_bookmark_changes(
        &mut self,
        changes: &[(String, Option<CommitId>)],
    ) -> Result<(), GraphError> {
        self.require_txn("apply_bookmark_changes")?;
        for (name, target) in changes {
            match target {
                Some(id) => {
                    self.ensure_known(id)?;
                    self.state.bookmarks.insert(name.clone(), *id);
                }
                None => {
                    self.state.bookmarks.remove(name);
                }
            }
        }
        Ok(())
    }

    fn resolve(&self, spec: &str) -> Result<CommitId, GraphError> {
        match spec {
            "." => return Ok(self.state.working.parent),
            "null" => return Ok(CommitId::NULL),
            _ => {}
        }
        if let Some(id) = self.state.bookmarks.get(spec) {
            return Ok(*id);
        }
        if let Ok(id) = spec.parse::<CommitId>() {
            self.ensure_known(&id)?;
            return Ok(id);
        }
        let matches: Vec<CommitId> = self
            .state
            .commits
            .keys()
            .filter(|id| !spec.is_empty() && id.to_string().starts_with(spec))
            .copied()
            .collect();
        match matches.as_slice() {
            [] => Err(GraphError::not_found(format!("revision '{spec}'"))),
            [id] => Ok(*id),
            _ => Err(GraphError::Ambiguous {
                spec: spec.to_owned(),
                count: matches.len(),
            }),
        }
    }

    fn parents(&self, id: &CommitId) -> Result<Vec<CommitId>, GraphError> {
        if id.is_null() {
            return Ok(Vec::new());
        }
        self.state
            .commits
            .get(id)
            .map(|record| record.parents.clone())
            .ok_or_else(|| GraphError::not_found(format!("commit {id}")))
    }

    fn phase(&self, id: &CommitId) -> Result<Phase, GraphError> {
        if id.is_null() {
            return Ok(Phase::Public);
        }
        self.state
            .commits
            .get(id)
            .map(|record| record.phase)
            .ok_or_else(|| GraphError::not_found(format!("commit {id}")))
    }

    fn draft_heads(&self) -> Result<BTreeSet<CommitId>, GraphError> {
        let visible_drafts: BTreeSet<CommitId> = self
            .state
            .commits
            .keys()
            .filter(|id| self.is_draft(id) && !self.state.hidden.contains(id))
            .copied()
            .collect();
        let mut heads = visible_drafts.clone();
        for id in &visible_drafts {
            for parent in &self.state.commits[id].parents {
                heads.remove(parent);
            }
        }
        Ok(heads)
    }

    fn draft_ancestors(&self, heads: &BTreeSet<CommitId>) -> Result<BTreeSet<CommitId>, GraphError> {
        let mut result = BTreeSet::new();
        let mut queue: VecDeque<CommitId> = VecDeque::new();
        for head in heads {
            self.ensure_known(head)?;
            queue.push_back(*head);
        }
        while let Some(next) = queue.pop_front() {
            if self.is_draft(&next) && result.insert(next) {
                queue.extend(self.state.commits[&next].parents.iter().copied());
            }
        }
        Ok(result)
    }

    fn draft_commits(&self) -> Result<BTreeSet<CommitId>, GraphError> {
        Ok(self
            .state
            .commits
            .keys()
            .filter(|id| self.is_draft(id))
            .copied()
            .collect())
    }

    fn local_branch(&self, id: &CommitId) -> Result<BTreeSet<CommitId>, GraphError> {
        let roots: Vec<CommitId> = if self.phase(id)? == Phase::Public {
            self.children(id)
                .into_iter()
                .filter(|child| self.is_draft(child))
                .collect()
        } else {
            self.draft_ancestors(&BTreeSet::from([*id]))?
                .into_iter()
                .collect()
        };
        Ok(self.descendants(roots))
    }

    fn working_parent(&self) -> Result<CommitId, GraphError> {
        Ok(self.state.working.parent)
    }

    fn is_dirty(&self) -> Result<bool, GraphError> {
        let working = &self.state.working;
        Ok(!working.added.is_empty()
            || !working.removed.is_empty()
            || working.files != *self.manifest(&working.parent)?)
    }

    fn unfinished_operation(&self) -> Option<String> {
        self.state.unfinished.clone()
    }

    fn update_working(&mut self, target: &CommitId) -> Result<(), GraphError> {
        self.require_txn("update_working")?;
        let files = self.manifest(target)?.clone();
        self.state.working = WorkingState {
            parent: *target,
            files,
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
        };
        Ok(())
    }

    fn manifest_diff(
        &self,
        from: &CommitId,
        to: Option<&CommitId>,
    ) -> Result<Vec<ManifestChange>, GraphError> {
        let left = self.manifest(from)?;
        let right = match to {
            Some(id) => self.manifest(id)?,
            None => &self.state.working.files,
        };
        let paths: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
        Ok(paths
            .into_iter()
            .filter_map(|path| {
                let a = left.get(path);
                let b = right.get(path);
                (a != b).then(|| ManifestChange {
                    path: path.clone(),
                    from: a.map(|c| digest(c)),
                    to: b.map(|c| digest(c)),
                })
            })
            .collect())
    }

    fn rebuild_working_state(
        &mut self,
        parent: &CommitId,
        changes: &[ManifestChange],
    ) -> Result<(), GraphError> {
        self.require_txn("rebuild_working_state")?;
        self.ensure_known(parent)?;
        let working = &mut self.state.working;
        working.parent = *parent;
        working.added = changes
            .iter()
            .filter(|c| c.from.is_none())
            .map(|c| c.path.clone())
            .collect();
        working.removed = changes
            .iter()
            .filter(|c| c.to.is_none())
            .map(|c| c.path.clone())
            .collect();
        Ok(())
    }

    fn predecessors(&self, id: &CommitId) -> Result<BTreeSet<CommitId>, GraphError> {
        self.ensure_known(id)?;
        Ok(self.follow_markers(id, false))
    }

    fn successors(&self, id: &CommitId) -> Result<BTreeSet<CommitId>, GraphError> {
        self.ensure_known(id)?;
        Ok(self.follow_markers(id, true))
    }

    fn hide(&mut self, id: &CommitId, successors: &[CommitId]) -> Result<(), GraphError> {
        self.require_txn("hide")?;
        self.ensure_known(id)?;
        self.push_marker(*id, successors.to_vec());
        self.state.hidden.insert(*id);
        Ok(())
    }

    fn reveal(&mut self, ids: &BTreeSet<CommitId>) -> Result<(), GraphError> {
        self.require_txn("reveal")?;
        for id in ids {
            self.state.hidden.remove(id);
        }
        Ok(())
    }

    fn begin_transaction(&mut self, description: &str) -> Result<(), GraphError> {
        if let Some(open) = &self.txn {
            return Err(GraphError::TransactionActive {
                active: open.description.clone(),
            });
        }
        let lock = match &self.path {
            Some(path) => Some(acquire_lock(&lock_path(path))?),
            None => None,
        };
        self.txn = Some(OpenTransaction {
            description: description.to_owned(),
            backup: self.state.clone(),
            _lock: lock,
        });
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<(), GraphError> {
        let Some(open) = self.txn.take() else {
            return Err(GraphError::NoTransaction {
                operation: "commit_transaction",
            });
        };
        if let Some(path) = &self.path
            && let Err(e) = write_state_atomic(path, &self.state)
        {
            self.state = open.backup;
            return Err(e);
        }
        tracing::debug!(transaction = %open.description, "graph transaction committed");
        Ok(())
    }

    fn rollback_transaction(&mut self) {
        if let Some(open) = self.txn.take() {
            self.state = open.backup;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_stack() -> (MemoryGraph, CommitId, CommitId) {
        let mut graph = MemoryGraph::new();
        let (a, b) = graph
            .transact("setup", |g| {
                g.write_file("f", "1")?;
                let a = g.commit("a")?;
                g.write_file("f", "2")?;
                let b = g.commit("b")?;
                Ok((a, b))
            })
            .unwrap();
        (graph, a, b)
    }

    #[test]
    fn mutators_require_a_transaction() {
        let mut graph = MemoryGraph::new();
        let err = graph.commit("x").unwrap_err();
        assert!(matches!(err, GraphError::NoTransaction { operation: "commit" }));
    }

    #[test]
    fn rollback_restores_previous_state() {
        let (mut graph, _, b) = graph_with_stack();
        {
            let mut tx = Transaction::begin(&mut graph, "doomed").unwrap();
            tx.hide(&b, &[]).unwrap();
            assert!(tx.is_hidden(&b));
        }
        assert!(!graph.is_hidden(&b));
    }

    #[test]
    fn draft_heads_ignore_hidden_commits() {
        let (mut graph, a, b) = graph_with_stack();
        assert_eq!(graph.draft_heads().unwrap(), BTreeSet::from([b]));
        graph.transact("hide", |g| g.hide(&b, &[])).unwrap();
        assert_eq!(graph.draft_heads().unwrap(), BTreeSet::from([a]));
    }

    #[test]
    fn amend_links_predecessor_and_moves_bookmarks() {
        let (mut graph, _, b) = graph_with_stack();
        let b2 = graph
            .transact("amend", |g| {
                g.set_bookmark("x", b)?;
                g.amend("b2")
            })
            .unwrap();
        assert!(graph.is_hidden(&b));
        assert_eq!(graph.predecessors(&b2).unwrap(), BTreeSet::from([b]));
        assert_eq!(graph.successors(&b).unwrap(), BTreeSet::from([b2]));
        assert_eq!(graph.bookmarks().unwrap()["x"], b2);
    }

    #[test]
    fn local_branch_stops_at_public_commits() {
        let (mut graph, a, b) = graph_with_stack();
        let c = graph
            .transact("fork", |g| {
                g.publish(&a)?;
                g.update_working(&a)?;
                g.write_file("g", "side")?;
                g.commit("c")
            })
            .unwrap();
        assert_eq!(graph.local_branch(&b).unwrap(), BTreeSet::from([b]));
        assert_eq!(graph.local_branch(&c).unwrap(), BTreeSet::from([c]));
        assert_eq!(graph.local_branch(&a).unwrap(), BTreeSet::from([b, c]));
    }

    #[test]
    fn manifest_diff_against_working_state() {
        let (mut graph, a, _) = graph_with_stack();
        graph.transact("edit", |g| g.write_file("new", "n")).unwrap();
        let diff = graph.manifest_diff(&a, None).unwrap();
        let paths: Vec<&str> = diff.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["f", "new"]);
        assert!(diff[1].is_addition());
        assert!(graph.is_dirty().unwrap());
    }

    #[test]
    fn resolve_accepts_prefix_bookmark_and_dot() {
        let (mut graph, a, b) = graph_with_stack();
        graph.transact("bm", |g| g.set_bookmark("main", a)).unwrap();
        assert_eq!(graph.resolve("main").unwrap(), a);
        assert_eq!(graph.resolve(".").unwrap(), b);
        assert_eq!(graph.resolve(&b.to_string()[..10]).unwrap(), b);
        assert!(graph.resolve("zzzz").is_err());
    }

    #[test]
    fn nested_transactions_are_rejected() {
        let mut graph = MemoryGraph::new();
        graph.begin_transaction("outer").unwrap();
        let err = graph.begin_transaction("inner").unwrap_err();
        assert!(matches!(err, GraphError::TransactionActive { .. }));
        graph.rollback_transaction();
    }
}
