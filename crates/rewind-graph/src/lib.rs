//! Commit-graph abstraction for rewind.
//!
//! The undo subsystem never stores commits itself. It talks to a commit-graph
//! engine through the [`CommitGraph`] trait defined here, and mutates it only
//! inside a [`Transaction`].
//!
//! # Crate layout
//!
//! - [`graph`]: the [`CommitGraph`] trait.
//! - [`txn`]: the [`Transaction`] guard.
//! - [`types`]: value types ([`CommitId`], [`Phase`], [`ManifestChange`]).
//! - [`error`]: [`GraphError`].
//! - [`memory`]: [`MemoryGraph`], a JSON-persisted reference implementation.

pub mod error;
pub mod graph;
pub mod memory;
pub mod txn;
pub mod types;

pub use error::GraphError;
pub use graph::CommitGraph;
pub use memory::{CommitRecord, MemoryGraph, ObsMarker, WorkingState};
pub use txn::Transaction;
pub use types::{CommitId, CommitIdParseError, ManifestChange, Phase};
