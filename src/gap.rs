//! Gap marker: the oldest absolute index with continuous recorded history.
//!
//! The recorder writes a marker whenever it finds unrecorded changes at the
//! start of a command (recording was off or skipped). Entries below the marker
//! may not be connected to their successors, so undoing to them is risky.

use std::fs;
use std::io::Write;

use tempfile::NamedTempFile;

use crate::store::{StorageLayout, StoreError, UndoLog};

/// Persist `absolute` as the new gap marker.
///
/// # Errors
/// I/O failures writing the marker file.
pub fn record_new_gap(layout: &StorageLayout, absolute: usize) -> Result<(), StoreError> {
    let path = layout.gap_path();
    let mut tmp =
        NamedTempFile::new_in(layout.dir()).map_err(|e| StoreError::io(layout.dir(), e))?;
    tmp.write_all(absolute.to_string().as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(&path)
        .map_err(|e| StoreError::io(&path, e.error))?;
    tracing::debug!(absolute, "recorded new gap");
    Ok(())
}

/// Current gap marker. An unreadable marker is recomputed from the log and
/// rewritten.
///
/// # Errors
/// I/O failures rewriting a recomputed marker, or log corruption.
pub fn marker(log: &UndoLog) -> Result<usize, StoreError> {
    let layout = log.layout();
    let parsed = fs::read_to_string(layout.gap_path())
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok());
    if let Some(marker) = parsed {
        return Ok(marker);
    }
    tracing::debug!(
        path = %layout.gap_path().display(),
        "gap marker unreadable; recomputing"
    );
    let marker = recompute(log)?;
    record_new_gap(layout, marker)?;
    Ok(marker)
}

/// Position of the oldest entry recording a real command, or the log length
/// when there is none. Everything before it is treated as possibly
/// incomplete.
///
/// # Errors
/// Log corruption.
pub fn recompute(log: &UndoLog) -> Result<usize, StoreError> {
    for absolute in 0..log.len() {
        if let Some(entry) = log.entry(absolute)?
            && !entry.is_gap()
        {
            return Ok(absolute);
        }
    }
    Ok(log.len())
}

/// Whether `absolute` lies at or after the gap marker.
///
/// # Errors
/// See [`marker`].
pub fn reachable(log: &UndoLog, absolute: usize) -> Result<bool, StoreError> {
    Ok(absolute >= marker(log)?)
}
