//! Lightweight append transaction over the undo log.
//!
//! Records are staged in memory and flushed on [`LogTransaction::commit`]:
//! field stores first, the index store last. An index record only ever
//! references field records that are already durable, so a crash between the
//! two phases leaves orphan field records at worst. Dropping an uncommitted
//! transaction writes nothing.

use super::{Field, IndexEntry, RecordId, StoreError, UndoLog};

/// Staged appends to an [`UndoLog`].
pub struct LogTransaction<'a> {
    log: &'a mut UndoLog,
    staged: [Vec<(RecordId, String)>; 5],
    index: Vec<(RecordId, String)>,
    entries: Vec<IndexEntry>,
}

impl<'a> LogTransaction<'a> {
    pub(super) fn new(log: &'a mut UndoLog) -> Self {
        Self {
            log,
            staged: Default::default(),
            index: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Stage a field value and return its record id. Values already stored
    /// (or already staged) are not staged twice.
    pub fn stage(&mut self, field: Field, data: String) -> RecordId {
        let store = &self.log.fields[field.slot()];
        let id = store.derive_id(None, &data);
        let pending = &mut self.staged[field.slot()];
        if store.get(&id).is_none() && !pending.iter().any(|(p, _)| *p == id) {
            pending.push((id, data));
        }
        id
    }

    /// Stage an index record referencing one record per field, in
    /// [`Field::ALL`] order. Returns the new entry's chained id.
    pub fn stage_entry(&mut self, fields: [RecordId; 5]) -> RecordId {
        let text = IndexEntry::encode(&fields);
        let previous = self
            .index
            .last()
            .map(|(id, _)| id)
            .or_else(|| self.log.index.last_id());
        let id = self.log.index.derive_id(previous, &text);
        self.index.push((id, text));
        self.entries.push(IndexEntry { id, fields });
        id
    }

    /// Flush every staged record.
    ///
    /// # Errors
    /// I/O failures. Field records written before the failure stay on disk
    /// unreferenced; the index is untouched.
    pub fn commit(self) -> Result<(), StoreError> {
        for field in Field::ALL {
            self.log.fields[field.slot()].append(&self.staged[field.slot()])?;
        }
        self.log.index.append(&self.index)?;
        tracing::debug!(
            appended = self.entries.len(),
            total = self.log.entries.len() + self.entries.len(),
            "undo log transaction committed"
        );
        self.log.entries.extend(self.entries);
        Ok(())
    }
}
