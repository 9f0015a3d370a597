//! Error types for undo, redo, and history queries.
//!
//! Defines [`UndoError`]. Every user-facing variant says what went wrong and
//! how to proceed. Internal bounds checks elsewhere in the crate return
//! `Option`; only the engine boundary turns a miss into
//! [`UndoError::OutOfRange`].

use std::fmt;

use rewind_graph::GraphError;

use crate::store::StoreError;

// ---------------------------------------------------------------------------
// UndoError
// ---------------------------------------------------------------------------

/// Error type for undo subsystem operations.
#[derive(Debug)]
pub enum UndoError {
    /// Index arithmetic left the bounds of the undo log.
    OutOfRange {
        /// The reverse index that was requested.
        reverse_index: i64,
        /// Number of entries in the log.
        len: usize,
    },

    /// The target lies before a gap in recorded history.
    RiskyUndo {
        /// Absolute index of the target.
        target: usize,
        /// Current gap marker.
        gap: usize,
    },

    /// Redo would have to cross an absolute undo.
    CannotRedo,

    /// The most recent commands contain no undo to cancel.
    NothingToRedo,

    /// Conflicting or unsupported options.
    InvalidArgument {
        /// What is wrong with the request.
        reason: String,
    },

    /// The working state has uncommitted changes.
    UncommittedChanges,

    /// An interrupted multi-step operation must be finished first.
    UnfinishedOperation {
        /// Name of the pending operation.
        operation: String,
    },

    /// The commit graph reported an error.
    Graph(GraphError),

    /// The undo log storage reported an error.
    Store(StoreError),
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for UndoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { reverse_index, len } => {
                write!(
                    f,
                    "index out of bounds: {reverse_index} (undo log has {len} entries)\n  To fix: list recorded states and pick one in range:\n    rewind history --list"
                )
            }
            Self::RiskyUndo { target, gap } => {
                write!(
                    f,
                    "attempted risky undo across missing history (target entry {target} is older than gap at {gap})\n  To fix: if you know how the states are connected, retry with --force."
                )
            }
            Self::CannotRedo => {
                write!(
                    f,
                    "can't redo past absolute undo\n  To fix: use `rewind undo --absolute --step N` to jump to the wanted state directly."
                )
            }
            Self::NothingToRedo => write!(f, "nothing to redo"),
            Self::InvalidArgument { reason } => {
                write!(f, "invalid arguments: {reason}")
            }
            Self::UncommittedChanges => {
                write!(
                    f,
                    "uncommitted changes in working state\n  To fix: commit or discard them, or keep them with:\n    rewind undo --keep"
                )
            }
            Self::UnfinishedOperation { operation } => {
                write!(
                    f,
                    "unfinished {operation} in progress\n  To fix: complete or abort the {operation} before undoing."
                )
            }
            Self::Graph(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for UndoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Graph(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<GraphError> for UndoError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}

impl From<StoreError> for UndoError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
