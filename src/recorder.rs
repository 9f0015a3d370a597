//! The command recorder: snapshots the tracked facets around every top-level
//! command and appends an undo log entry whenever they changed.
//!
//! Recording is best effort. It takes the undo log's own lock (never the
//! repository lock) with a bounded wait; on timeout or missing permissions it
//! skips silently, which leaves a gap that the next recording detects.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs4::fs_std::FileExt;
use rewind_graph::CommitGraph;
use tracing::instrument;

use crate::config::UndoConfig;
use crate::error::UndoError;
use crate::gap;
use crate::hooks::CommandHook;
use crate::redo_pointer::RedoPointer;
use crate::snapshot::{RepoSnapshot, Timestamp};
use crate::store::{StorageLayout, UndoLog};

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Records repository state into the undo log. Register it on the
/// [`CommandRunner`](crate::hooks::CommandRunner).
#[derive(Clone, Debug)]
pub struct Recorder {
    layout: StorageLayout,
    config: UndoConfig,
}

impl Recorder {
    #[must_use]
    pub const fn new(layout: StorageLayout, config: UndoConfig) -> Self {
        Self { layout, config }
    }

    /// Recorder for the repository at `root`.
    #[must_use]
    pub fn for_repo(root: &Path, config: UndoConfig) -> Self {
        Self::new(StorageLayout::for_repo(root), config)
    }

    /// Storage layout entries are written to.
    #[must_use]
    pub const fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Append an entry for `command` if the tracked facets differ from the
    /// newest entry. Returns the new entry's absolute index, or `None` when
    /// nothing changed or recording was skipped.
    #[instrument(skip_all, fields(command = %command.join(" ")))]
    pub fn record<G: CommitGraph + ?Sized>(&self, graph: &G, command: &[String]) -> Option<usize> {
        if !self.config.enabled {
            return None;
        }
        if let Err(err) = self.layout.ensure() {
            tracing::debug!(%err, "can't create undo log directory; skipping");
            return None;
        }
        let _lock = self.acquire_lock()?;
        match self.record_locked(graph, command) {
            Ok(appended) => appended,
            Err(err) => {
                tracing::debug!(%err, "recording failed; skipping");
                None
            }
        }
    }

    fn record_locked<G: CommitGraph + ?Sized>(
        &self,
        graph: &G,
        command: &[String],
    ) -> Result<Option<usize>, UndoError> {
        let mut log = UndoLog::open(&self.layout)?;
        let snapshot = RepoSnapshot::capture(graph)?;
        if let Some(latest) = log.latest()?
            && latest.snapshot == snapshot
        {
            tracing::debug!("no tracked changes; nothing recorded");
            return Ok(None);
        }

        let absolute = log.append(&Timestamp::now(), command, &snapshot)?;
        tracing::debug!(absolute, "recorded undo log entry");
        if !matches!(command.first().map(String::as_str), Some("undo" | "redo")) {
            RedoPointer::clear(&self.layout)?;
        }
        Ok(Some(absolute))
    }

    /// Take the recorder lock, retrying until the configured timeout.
    fn acquire_lock(&self) -> Option<File> {
        let path = self.layout.lock_path();
        let file = match OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
        {
            Ok(f) => f,
            Err(err) => {
                tracing::debug!(%err, "undo log lacks write permission; skipping");
                return None;
            }
        };

        let deadline = Instant::now() + self.config.lock_timeout();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Some(file),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        tracing::debug!("undo log lock timeout; skipping");
                        return None;
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(err) => {
                    tracing::debug!(%err, "undo log lock unavailable; skipping");
                    return None;
                }
            }
        }
    }
}

impl<G: CommitGraph + ?Sized> CommandHook<G> for Recorder {
    fn name(&self) -> &'static str {
        "undo-recorder"
    }

    /// Catch changes made while recording was inactive. They are logged as an
    /// entry with the empty command, and the gap marker moves to it.
    fn before_command(&self, graph: &G, _command: &[String]) {
        if let Some(absolute) = self.record(graph, &[String::new()])
            && let Err(err) = gap::record_new_gap(&self.layout, absolute)
        {
            tracing::debug!(%err, "failed to record gap");
        }
    }

    fn after_command(&self, graph: &G, command: &[String], _succeeded: bool) {
        self.record(graph, command);
    }
}
