//! Error types for commit-graph operations.
//!
//! [`GraphError`] is the single error type returned by all
//! [`CommitGraph`](crate::CommitGraph) methods.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`CommitGraph`](crate::CommitGraph) operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A requested commit, bookmark, or revision was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A revision prefix matched more than one commit.
    #[error("ambiguous revision `{spec}` matches {count} commits")]
    Ambiguous {
        /// The revision the caller supplied.
        spec: String,
        /// Number of matching commits.
        count: usize,
    },

    /// A mutation was attempted outside a transaction.
    ///
    /// This is a programming error in the caller, not a user condition.
    #[error("programming error: `{operation}` requires an active transaction")]
    NoTransaction {
        /// The mutating method that was called.
        operation: &'static str,
    },

    /// `begin_transaction` was called while another transaction was open.
    #[error("programming error: transaction `{active}` is already open")]
    TransactionActive {
        /// Description of the open transaction.
        active: String,
    },

    /// An I/O error occurred while loading, locking, or persisting state.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Persisted graph state could not be (de)serialized.
    #[error("graph state at {} is unreadable: {source}", path.display())]
    Serialize {
        /// The state file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl GraphError {
    /// Shorthand for [`GraphError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }
}
