//! The redo pointer: where relative undo/redo arithmetic resumes from.
//!
//! File format: `<index record id>\0<branch commit id or empty>`. The index
//! record id pins a log position that stays valid as new entries are appended.
//! A missing or malformed file means "no pointer".

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use rewind_graph::CommitId;
use tempfile::NamedTempFile;

use crate::store::{RecordId, StorageLayout, StoreError};

/// A persisted redo pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedoPointer {
    /// Index record of the entry last undone or redone to.
    pub entry: RecordId,
    /// Local branch the last undo was scoped to.
    pub branch: Option<CommitId>,
}

impl RedoPointer {
    /// Read the pointer, if present and well-formed.
    #[must_use]
    pub fn read(layout: &StorageLayout) -> Option<Self> {
        let text = fs::read_to_string(layout.redo_path()).ok()?;
        let parsed = Self::parse(&text);
        if parsed.is_none() {
            tracing::debug!("ignoring malformed redo pointer");
        }
        parsed
    }

    fn parse(text: &str) -> Option<Self> {
        let (entry, branch) = text.split_once('\0').unwrap_or((text, ""));
        let entry = entry.parse().ok()?;
        let branch = if branch.is_empty() {
            None
        } else {
            Some(branch.parse().ok()?)
        };
        Some(Self { entry, branch })
    }

    /// On-disk encoding.
    #[must_use]
    pub fn encode(&self) -> String {
        let branch = self.branch.map(|b| b.to_string()).unwrap_or_default();
        format!("{}\0{branch}", self.entry)
    }

    /// Write the pointer to a temporary file next to its final location.
    /// Nothing is visible until [`StagedPointer::install`].
    ///
    /// # Errors
    /// I/O failures.
    pub fn stage(&self, layout: &StorageLayout) -> Result<StagedPointer, StoreError> {
        let mut file =
            NamedTempFile::new_in(layout.dir()).map_err(|e| StoreError::io(layout.dir(), e))?;
        file.write_all(self.encode().as_bytes())
            .and_then(|()| file.as_file().sync_all())
            .map_err(|e| StoreError::io(file.path(), e))?;
        Ok(StagedPointer {
            file,
            target: layout.redo_path(),
        })
    }

    /// Remove the pointer. Missing is fine.
    ///
    /// # Errors
    /// I/O failures other than not-found.
    pub fn clear(layout: &StorageLayout) -> Result<(), StoreError> {
        let path = layout.redo_path();
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("cleared redo pointer");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

/// A pointer written to disk but not yet moved into place.
#[derive(Debug)]
pub struct StagedPointer {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedPointer {
    /// Atomically replace the redo pointer file.
    ///
    /// # Errors
    /// Rename failures.
    pub fn install(self) -> Result<(), StoreError> {
        let target = self.target;
        self.file
            .persist(&target)
            .map_err(|e| StoreError::io(&target, e.error))?;
        Ok(())
    }
}

/// Pointer update decided by an undo or redo, applied after the graph commit.
#[derive(Debug)]
pub enum PointerUpdate {
    Set(StagedPointer),
    Clear,
}

impl PointerUpdate {
    /// Make the update visible.
    ///
    /// # Errors
    /// I/O failures.
    pub fn apply(self, layout: &StorageLayout) -> Result<(), StoreError> {
        match self {
            Self::Set(staged) => staged.install(),
            Self::Clear => RedoPointer::clear(layout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry() -> RecordId {
        "ab".repeat(32).parse().unwrap()
    }

    #[test]
    fn staged_pointer_is_invisible_until_installed() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let pointer = RedoPointer {
            entry: entry(),
            branch: Some(CommitId::from_bytes([7; 20])),
        };
        let staged = pointer.stage(&layout).unwrap();
        assert_eq!(RedoPointer::read(&layout), None);
        staged.install().unwrap();
        assert_eq!(RedoPointer::read(&layout), Some(pointer));
    }

    #[test]
    fn dropped_stage_leaves_old_pointer() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let old = RedoPointer {
            entry: entry(),
            branch: None,
        };
        old.stage(&layout).unwrap().install().unwrap();
        let new = RedoPointer {
            entry: "cd".repeat(32).parse().unwrap(),
            branch: None,
        };
        drop(new.stage(&layout).unwrap());
        assert_eq!(RedoPointer::read(&layout), Some(old));
    }

    #[test]
    fn malformed_or_missing_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        assert_eq!(RedoPointer::read(&layout), None);
        fs::write(layout.redo_path(), "garbage\0").unwrap();
        assert_eq!(RedoPointer::read(&layout), None);
        fs::write(layout.redo_path(), format!("a{}b\0", "é".repeat(31))).unwrap();
        assert_eq!(RedoPointer::read(&layout), None);
    }

    #[test]
    fn pointer_without_branch_separator_is_accepted() {
        let parsed = RedoPointer::parse(&entry().to_string()).unwrap();
        assert_eq!(parsed.branch, None);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        RedoPointer::clear(&layout).unwrap();
        RedoPointer {
            entry: entry(),
            branch: None,
        }
        .stage(&layout)
        .unwrap()
        .install()
        .unwrap();
        RedoPointer::clear(&layout).unwrap();
        assert!(!layout.redo_path().exists());
    }
}
