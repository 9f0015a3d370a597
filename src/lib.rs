//! rewind library crate: the undo/redo subsystem.
//!
//! The primary interface is the `rewind` binary. The library exposes the
//! undo log, the recorder hook, and the engine so integration tests can drive
//! them against a [`rewind_graph::MemoryGraph`] directly.
//!
//! # Layout
//!
//! - [`store`]: the append-only undo log (per-field record stores + index).
//! - [`index`]: reverse/absolute index arithmetic.
//! - [`gap`]: the gap marker.
//! - [`redo_pointer`]: where relative undo/redo resumes.
//! - [`walker`]: branch-scoped stepping.
//! - [`recorder`] and [`hooks`]: recording around every top-level command.
//! - [`engine`]: undo and redo.
//! - [`query`], [`history`], [`preview`]: read-only views.

pub mod args;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod gap;
pub mod history;
pub mod hooks;
pub mod index;
pub mod preview;
pub mod query;
pub mod recorder;
pub mod redo_pointer;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod walker;

pub use engine::{Outcome, UndoEngine, UndoPlan};
pub use error::UndoError;
pub use hooks::{CommandHook, CommandRunner, Invocation};
pub use recorder::Recorder;

/// Per-repository metadata directory.
pub const META_DIR: &str = ".rewind";

/// Commit graph state file inside [`META_DIR`].
pub const GRAPH_FILE: &str = "graph.json";
