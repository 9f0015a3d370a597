//! Append-only record files.
//!
//! A record file is JSON lines, one `{"id": ..., "data": ...}` object per
//! line. Two addressing modes:
//!
//! - [`Addressing::Content`]: `id = sha256(data)`. Appending data that is
//!   already stored is a no-op, so identical snapshots are stored once.
//! - [`Addressing::Chained`]: `id = sha256(previous id || data)`. Every
//!   position gets a distinct id, which makes ids usable as stable position
//!   references (the index store).
//!
//! Ids are re-derived on load; any mismatch is corruption.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::StoreError;

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// SHA-256 record identifier, displayed as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId([u8; 32]);

impl RecordId {
    fn content(data: &str) -> Self {
        Self(Sha256::digest(data.as_bytes()).into())
    }

    fn chained(previous: Option<&Self>, data: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(previous.map_or([0u8; 32], |p| p.0));
        hasher.update(data.as_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", &self.to_string()[..12])
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(format!("expected 64 hex characters, got {}", s.len()));
        }
        let mut bytes = [0u8; 32];
        for (byte, pair) in bytes.iter_mut().zip(s.as_bytes().chunks(2)) {
            let (Some(hi), Some(lo)) = (hex_digit(pair[0]), hex_digit(pair[1])) else {
                return Err(format!("invalid hex pair {:?}", String::from_utf8_lossy(pair)));
            };
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

/// Lowercase hex only; ids are always written lowercase.
const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// How record ids are derived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Addressing {
    /// `sha256(data)`, deduplicating.
    Content,
    /// `sha256(previous id || data)`, one record per append.
    Chained,
}

#[derive(Serialize, Deserialize)]
struct RecordLine {
    id: String,
    data: String,
}

/// One append-only record file, fully loaded in memory.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    addressing: Addressing,
    records: Vec<(RecordId, String)>,
    positions: HashMap<RecordId, usize>,
}

impl RecordStore {
    /// Load `path` (missing file = empty store).
    ///
    /// A trailing line without its newline is a torn append from a crash; it
    /// is truncated away. Anything else that fails to parse or verify is
    /// [`StoreError::Corrupt`].
    ///
    /// # Errors
    /// I/O failures and corruption.
    pub fn load(path: &Path, addressing: Addressing) -> Result<Self, StoreError> {
        let mut store = Self {
            path: path.to_owned(),
            addressing,
            records: Vec::new(),
            positions: HashMap::new(),
        };
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(StoreError::corrupt(path, "file is not valid UTF-8"));
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let complete = contents.rfind('\n').map_or(0, |i| i + 1);
        if complete < contents.len() {
            tracing::debug!(
                path = %path.display(),
                dropped_bytes = contents.len() - complete,
                "truncating torn trailing record"
            );
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| StoreError::io(path, e))?;
            file.set_len(complete as u64)
                .map_err(|e| StoreError::io(path, e))?;
        }

        for (lineno, line) in contents[..complete].lines().enumerate() {
            let parsed: RecordLine = serde_json::from_str(line).map_err(|e| {
                StoreError::corrupt(path, format!("line {}: {e}", lineno + 1))
            })?;
            let id: RecordId = parsed.id.parse().map_err(|e| {
                StoreError::corrupt(path, format!("line {}: bad record id: {e}", lineno + 1))
            })?;
            let expected = store.derive_id(store.last_id(), &parsed.data);
            if id != expected {
                return Err(StoreError::corrupt(
                    path,
                    format!("line {}: record id does not match its content", lineno + 1),
                ));
            }
            store.push_loaded(id, parsed.data);
        }
        Ok(store)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record data by id.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&str> {
        self.positions
            .get(id)
            .map(|&pos| self.records[pos].1.as_str())
    }

    /// Record at a position.
    #[must_use]
    pub fn at(&self, position: usize) -> Option<(&RecordId, &str)> {
        self.records
            .get(position)
            .map(|(id, data)| (id, data.as_str()))
    }

    /// Position of a record id.
    #[must_use]
    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Id of the newest record.
    #[must_use]
    pub fn last_id(&self) -> Option<&RecordId> {
        self.records.last().map(|(id, _)| id)
    }

    /// Id `data` would get if appended after `previous` (chained) or anywhere
    /// (content).
    #[must_use]
    pub fn derive_id(&self, previous: Option<&RecordId>, data: &str) -> RecordId {
        match self.addressing {
            Addressing::Content => RecordId::content(data),
            Addressing::Chained => RecordId::chained(previous, data),
        }
    }

    /// Append already-derived records and fsync.
    ///
    /// # Errors
    /// I/O failures; the in-memory view is only updated after the write.
    pub fn append(&mut self, batch: &[(RecordId, String)]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for (id, data) in batch {
            let line = RecordLine {
                id: id.to_string(),
                data: data.clone(),
            };
            let json = serde_json::to_string(&line)
                .map_err(|e| StoreError::corrupt(&self.path, format!("serialize: {e}")))?;
            buf.push_str(&json);
            buf.push('\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&self.path, e))?;

        for (id, data) in batch {
            self.push_loaded(*id, data.clone());
        }
        Ok(())
    }

    fn push_loaded(&mut self, id: RecordId, data: String) {
        self.positions.entry(id).or_insert(self.records.len());
        self.records.push((id, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn content_ids_are_stable_and_deduplicated_by_caller() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmarks.log");
        let mut store = RecordStore::load(&path, Addressing::Content).unwrap();
        let id = store.derive_id(None, "main abc");
        assert_eq!(id, store.derive_id(store.last_id(), "main abc"));
        store.append(&[(id, "main abc".to_owned())]).unwrap();

        let reloaded = RecordStore::load(&path, Addressing::Content).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(&id), Some("main abc"));
    }

    #[test]
    fn chained_ids_differ_for_repeated_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.log");
        let mut store = RecordStore::load(&path, Addressing::Chained).unwrap();
        let first = store.derive_id(store.last_id(), "same");
        store.append(&[(first, "same".to_owned())]).unwrap();
        let second = store.derive_id(store.last_id(), "same");
        store.append(&[(second, "same".to_owned())]).unwrap();

        assert_ne!(first, second);
        let reloaded = RecordStore::load(&path, Addressing::Chained).unwrap();
        assert_eq!(reloaded.position(&second), Some(1));
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("date.log");
        let mut store = RecordStore::load(&path, Addressing::Content).unwrap();
        let id = store.derive_id(None, "1 0");
        store.append(&[(id, "1 0".to_owned())]).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"id\":\"ab").unwrap();
        drop(file);

        let reloaded = RecordStore::load(&path, Addressing::Content).unwrap();
        assert_eq!(reloaded.len(), 1);
        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.ends_with('\n'));
    }

    #[test]
    fn tampered_record_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("command.log");
        let mut store = RecordStore::load(&path, Addressing::Content).unwrap();
        let id = store.derive_id(None, "commit");
        store.append(&[(id, "commit".to_owned())]).unwrap();
        let text = fs::read_to_string(&path).unwrap().replace("commit", "amend!");
        fs::write(&path, text).unwrap();

        let err = RecordStore::load(&path, Addressing::Content).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn record_id_parse_round_trip() {
        let id = RecordId::content("x");
        assert_eq!(id.to_string().parse::<RecordId>().unwrap(), id);
        assert!("zz".parse::<RecordId>().is_err());
    }

    #[test]
    fn multibyte_id_of_the_right_length_is_rejected() {
        // 64 bytes, with two-byte characters straddling every hex pair.
        let id = format!("a{}b", "é".repeat(31));
        assert_eq!(id.len(), 64);
        assert!(id.parse::<RecordId>().is_err());
    }

    #[test]
    fn multibyte_id_in_a_store_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("command.log");
        let line = format!("{{\"id\":\"a{}b\",\"data\":\"x\"}}\n", "é".repeat(31));
        fs::write(&path, line).unwrap();

        let err = RecordStore::load(&path, Addressing::Content).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "{err}");
    }
}
