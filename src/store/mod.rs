//! The undo log: one append-only record store per tracked field plus a chained
//! index store that ties them together by position.
//!
//! ```text
//! .rewind/undolog/
//!   bookmarks.log command.log date.log draftheads.log workingparent.log
//!   index.log     position N = absolute index N, lines "<field> <record id>"
//!   gap           gap marker
//!   redonode      redo pointer
//!   lock          recorder lock
//! ```
//!
//! Opening the log verifies every record. On corruption the whole storage
//! directory is discarded and recreated empty: undo history is lost, the
//! repository itself is never touched.

pub mod record;
pub mod txn;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::snapshot::{self, LogEntry, RepoSnapshot, Timestamp};

pub use record::{Addressing, RecordId, RecordStore};
pub use txn::LogTransaction;

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A tracked field with its own record store. Ordered by store name, which is
/// the order index lines are written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Bookmarks,
    Command,
    Date,
    DraftHeads,
    WorkingParent,
}

impl Field {
    /// Every field, in index-line order.
    pub const ALL: [Self; 5] = [
        Self::Bookmarks,
        Self::Command,
        Self::Date,
        Self::DraftHeads,
        Self::WorkingParent,
    ];

    /// Store name, also used as the key in index lines.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bookmarks => "bookmarks",
            Self::Command => "command",
            Self::Date => "date",
            Self::DraftHeads => "draftheads",
            Self::WorkingParent => "workingparent",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    const fn slot(self) -> usize {
        self as usize
    }

    /// Check that `data` is a valid encoding for this field.
    fn validate(self, data: &str) -> Result<(), String> {
        match self {
            Self::Bookmarks => snapshot::parse_bookmarks(data).map(drop),
            Self::Command => Ok(()),
            Self::Date => Timestamp::parse(data)
                .map(drop)
                .ok_or_else(|| format!("invalid date record {data:?}")),
            Self::DraftHeads => snapshot::parse_draft_heads(data).map(drop),
            Self::WorkingParent => snapshot::parse_working_parent(data).map(drop),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// StorageLayout
// ---------------------------------------------------------------------------

/// Paths inside the subsystem storage directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLayout {
    dir: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at an explicit directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Layout for the repository at `root` (`<root>/.rewind/undolog`).
    #[must_use]
    pub fn for_repo(root: &Path) -> Self {
        Self::new(root.join(crate::META_DIR).join("undolog"))
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a record store file.
    #[must_use]
    pub fn store_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.log"))
    }

    /// Path of the gap marker file.
    #[must_use]
    pub fn gap_path(&self) -> PathBuf {
        self.dir.join("gap")
    }

    /// Path of the redo pointer file.
    #[must_use]
    pub fn redo_path(&self) -> PathBuf {
        self.dir.join("redonode")
    }

    /// Path of the recorder lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join("lock")
    }

    /// Create the storage directory if needed.
    ///
    /// # Errors
    /// I/O failures.
    pub fn ensure(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))
    }
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors from the undo log storage.
#[derive(Debug)]
pub enum StoreError {
    /// A record store or index entry failed verification.
    Corrupt {
        /// The offending file.
        path: PathBuf,
        /// What failed.
        detail: String,
    },

    /// An I/O error on a storage file.
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn corrupt(path: &Path, detail: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_owned(),
            detail: detail.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_owned(),
            source,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt { path, detail } => write!(
                f,
                "undo log record store {} is corrupt: {detail}\n  To fix: run any rewind command; the undo log is discarded and rebuilt automatically.",
                path.display()
            ),
            Self::Io { path, source } => write!(
                f,
                "I/O error on undo log file {}: {source}\n  To fix: check permissions and free space in {}.",
                path.display(),
                path.parent().unwrap_or(path).display()
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Corrupt { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// IndexEntry
// ---------------------------------------------------------------------------

/// Parsed index record: the field record ids making up one log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    /// Chained id of the index record itself.
    pub id: RecordId,
    fields: [RecordId; 5],
}

impl IndexEntry {
    /// Record id of one field.
    #[must_use]
    pub const fn field(&self, field: Field) -> RecordId {
        self.fields[field.slot()]
    }

    fn encode(fields: &[RecordId; 5]) -> String {
        Field::ALL
            .iter()
            .map(|f| format!("{} {}", f.name(), fields[f.slot()]))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn parse(id: RecordId, text: &str) -> Result<Self, String> {
        let mut fields: [Option<RecordId>; 5] = [None; 5];
        for line in text.lines() {
            let (name, rec) = line
                .split_once(' ')
                .ok_or_else(|| format!("malformed index line {line:?}"))?;
            let field =
                Field::from_name(name).ok_or_else(|| format!("unknown field {name:?}"))?;
            fields[field.slot()] = Some(rec.parse()?);
        }
        let mut out = [id; 5];
        for field in Field::ALL {
            out[field.slot()] =
                fields[field.slot()].ok_or_else(|| format!("missing field {field}"))?;
        }
        Ok(Self { id, fields: out })
    }
}

// ---------------------------------------------------------------------------
// UndoLog
// ---------------------------------------------------------------------------

/// The loaded undo log.
#[derive(Debug)]
pub struct UndoLog {
    layout: StorageLayout,
    fields: [RecordStore; 5],
    index: RecordStore,
    entries: Vec<IndexEntry>,
}

impl UndoLog {
    /// Open the log, discarding and recreating the storage directory if any
    /// store is corrupt.
    ///
    /// # Errors
    /// I/O failures that persist after recovery.
    #[instrument(skip_all, fields(dir = %layout.dir().display()))]
    pub fn open(layout: &StorageLayout) -> Result<Self, StoreError> {
        layout.ensure()?;
        match Self::load(layout) {
            Err(err @ StoreError::Corrupt { .. }) => {
                tracing::warn!(%err, "undo log is corrupt; discarding undo history");
                fs::remove_dir_all(layout.dir()).map_err(|e| StoreError::io(layout.dir(), e))?;
                layout.ensure()?;
                Self::load(layout)
            }
            other => other,
        }
    }

    fn load(layout: &StorageLayout) -> Result<Self, StoreError> {
        let fields = [
            Self::load_field(layout, Field::Bookmarks)?,
            Self::load_field(layout, Field::Command)?,
            Self::load_field(layout, Field::Date)?,
            Self::load_field(layout, Field::DraftHeads)?,
            Self::load_field(layout, Field::WorkingParent)?,
        ];
        let index_path = layout.store_path("index");
        let index = RecordStore::load(&index_path, Addressing::Chained)?;

        let mut entries = Vec::with_capacity(index.len());
        for position in 0..index.len() {
            let Some((id, text)) = index.at(position) else {
                break;
            };
            let entry = IndexEntry::parse(*id, text).map_err(|detail| {
                StoreError::corrupt(&index_path, format!("entry {position}: {detail}"))
            })?;
            for field in Field::ALL {
                if fields[field.slot()].get(&entry.field(field)).is_none() {
                    return Err(StoreError::corrupt(
                        &index_path,
                        format!("entry {position}: {field} record is missing"),
                    ));
                }
            }
            entries.push(entry);
        }
        tracing::debug!(entries = entries.len(), "undo log loaded");

        Ok(Self {
            layout: layout.clone(),
            fields,
            index,
            entries,
        })
    }

    fn load_field(layout: &StorageLayout, field: Field) -> Result<RecordStore, StoreError> {
        let path = layout.store_path(field.name());
        let store = RecordStore::load(&path, Addressing::Content)?;
        for position in 0..store.len() {
            if let Some((_, data)) = store.at(position) {
                field.validate(data).map_err(|detail| {
                    StoreError::corrupt(&path, format!("record {position}: {detail}"))
                })?;
            }
        }
        Ok(store)
    }

    /// Storage layout this log was opened from.
    #[must_use]
    pub const fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index record at an absolute position.
    #[must_use]
    pub fn index_entry(&self, absolute: usize) -> Option<&IndexEntry> {
        self.entries.get(absolute)
    }

    /// Absolute position of an index record id.
    #[must_use]
    pub fn position_of(&self, id: &RecordId) -> Option<usize> {
        self.index.position(id)
    }

    /// Raw text of a field record.
    #[must_use]
    pub fn field_text(&self, field: Field, id: &RecordId) -> Option<&str> {
        self.fields[field.slot()].get(id)
    }

    /// Decode the entry at an absolute position (`None` when out of bounds).
    ///
    /// # Errors
    /// Corruption, which cannot happen for a log that passed `open`.
    pub fn entry(&self, absolute: usize) -> Result<Option<LogEntry>, StoreError> {
        let Some(ids) = self.entries.get(absolute) else {
            return Ok(None);
        };
        let text = |field: Field| {
            self.field_text(field, &ids.field(field)).ok_or_else(|| {
                StoreError::corrupt(
                    &self.layout.store_path(field.name()),
                    format!("record for entry {absolute} is missing"),
                )
            })
        };
        let corrupt = |field: Field, detail: String| {
            StoreError::corrupt(&self.layout.store_path(field.name()), detail)
        };

        let date = text(Field::Date)?;
        let timestamp = Timestamp::parse(date)
            .ok_or_else(|| corrupt(Field::Date, format!("invalid date {date:?}")))?;
        let snapshot = RepoSnapshot {
            bookmarks: snapshot::parse_bookmarks(text(Field::Bookmarks)?)
                .map_err(|d| corrupt(Field::Bookmarks, d))?,
            draft_heads: snapshot::parse_draft_heads(text(Field::DraftHeads)?)
                .map_err(|d| corrupt(Field::DraftHeads, d))?,
            working_parent: snapshot::parse_working_parent(text(Field::WorkingParent)?)
                .map_err(|d| corrupt(Field::WorkingParent, d))?,
        };
        Ok(Some(LogEntry {
            index: absolute,
            id: ids.id,
            timestamp,
            command: snapshot::parse_command(text(Field::Command)?),
            snapshot,
        }))
    }

    /// Decode the newest entry.
    ///
    /// # Errors
    /// See [`entry`](Self::entry).
    pub fn latest(&self) -> Result<Option<LogEntry>, StoreError> {
        match self.len().checked_sub(1) {
            Some(last) => self.entry(last),
            None => Ok(None),
        }
    }

    /// Open a lightweight append transaction.
    pub fn transaction(&mut self) -> LogTransaction<'_> {
        LogTransaction::new(self)
    }

    /// Append one entry and return its absolute index.
    ///
    /// # Errors
    /// I/O failures; nothing is visible in memory unless every store was
    /// written.
    pub fn append(
        &mut self,
        timestamp: &Timestamp,
        command: &[String],
        snapshot: &RepoSnapshot,
    ) -> Result<usize, StoreError> {
        let mut tx = self.transaction();
        let fields = [
            tx.stage(Field::Bookmarks, snapshot.encode_bookmarks()),
            tx.stage(Field::Command, snapshot::encode_command(command)),
            tx.stage(Field::Date, timestamp.encode()),
            tx.stage(Field::DraftHeads, snapshot.encode_draft_heads()),
            tx.stage(Field::WorkingParent, snapshot.encode_working_parent()),
        ];
        tx.stage_entry(fields);
        tx.commit()?;
        Ok(self.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_graph::CommitId;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn id(byte: u8) -> CommitId {
        CommitId::from_bytes([byte; 20])
    }

    fn snapshot(bookmark: u8) -> RepoSnapshot {
        RepoSnapshot {
            bookmarks: BTreeMap::from([("main".to_owned(), id(bookmark))]),
            draft_heads: [id(bookmark)].into_iter().collect(),
            working_parent: id(bookmark),
        }
    }

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_owned()).collect()
    }

    #[test]
    fn append_and_reload() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().join("undolog"));
        let mut log = UndoLog::open(&layout).unwrap();
        let ts = Timestamp::parse("100.000000005 0").unwrap();
        assert_eq!(log.append(&ts, &tokens(&["commit", "-m", "a"]), &snapshot(1)).unwrap(), 0);
        assert_eq!(log.append(&ts, &tokens(&["commit", "-m", "b"]), &snapshot(2)).unwrap(), 1);

        let log = UndoLog::open(&layout).unwrap();
        assert_eq!(log.len(), 2);
        let entry = log.entry(1).unwrap().unwrap();
        assert_eq!(entry.command, tokens(&["commit", "-m", "b"]));
        assert_eq!(entry.snapshot, snapshot(2));
        assert_eq!(entry.timestamp, ts);
        assert!(log.entry(2).unwrap().is_none());
    }

    #[test]
    fn identical_snapshots_are_stored_once() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let mut log = UndoLog::open(&layout).unwrap();
        let ts = Timestamp::parse("1.000000000 0").unwrap();
        log.append(&ts, &tokens(&["x"]), &snapshot(1)).unwrap();
        log.append(&ts, &tokens(&["x"]), &snapshot(1)).unwrap();

        let bookmarks = fs::read_to_string(layout.store_path("bookmarks")).unwrap();
        assert_eq!(bookmarks.lines().count(), 1);
        let index = fs::read_to_string(layout.store_path("index")).unwrap();
        assert_eq!(index.lines().count(), 2);
        let (a, b) = (log.index_entry(0).unwrap(), log.index_entry(1).unwrap());
        assert_ne!(a.id, b.id);
        assert_eq!(log.position_of(&b.id), Some(1));
    }

    #[test]
    fn corrupt_store_is_discarded() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().join("undolog"));
        let mut log = UndoLog::open(&layout).unwrap();
        let ts = Timestamp::parse("1.000000000 0").unwrap();
        log.append(&ts, &tokens(&["commit"]), &snapshot(1)).unwrap();
        fs::write(layout.redo_path(), "stale").unwrap();
        fs::write(layout.store_path("draftheads"), "not json\n").unwrap();

        let log = UndoLog::open(&layout).unwrap();
        assert!(log.is_empty());
        assert!(!layout.redo_path().exists());
    }

    #[test]
    fn non_hex_record_id_discards_the_log() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().join("undolog"));
        let mut log = UndoLog::open(&layout).unwrap();
        let ts = Timestamp::parse("1.000000000 0").unwrap();
        log.append(&ts, &tokens(&["commit"]), &snapshot(1)).unwrap();
        let line = format!("{{\"id\":\"a{}b\",\"data\":\"x\"}}\n", "é".repeat(31));
        fs::write(layout.store_path(Field::Command.name()), line).unwrap();

        let log = UndoLog::open(&layout).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn index_referencing_missing_record_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let mut log = UndoLog::open(&layout).unwrap();
        let ts = Timestamp::parse("1.000000000 0").unwrap();
        log.append(&ts, &tokens(&["commit"]), &snapshot(1)).unwrap();
        fs::remove_file(layout.store_path("workingparent")).unwrap();

        let err = UndoLog::load(&layout).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "{err}");
    }
}
