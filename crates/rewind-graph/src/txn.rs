//! Scoped transaction guard over a [`CommitGraph`].

use std::ops::{Deref, DerefMut};

use crate::error::GraphError;
use crate::graph::CommitGraph;

/// An open graph transaction. Rolls back on drop unless [`commit`](Self::commit)
/// was called.
///
/// Code that receives a `&mut Transaction` can mutate the graph; code that
/// only receives `&G` cannot, which keeps mutation inside a transaction by
/// construction.
pub struct Transaction<'g, G: CommitGraph + ?Sized> {
    graph: &'g mut G,
    finished: bool,
}

impl<'g, G: CommitGraph + ?Sized> Transaction<'g, G> {
    /// Acquire the repository locks and open a transaction.
    ///
    /// # Errors
    /// Propagates lock or state errors from the graph.
    pub fn begin(graph: &'g mut G, description: &str) -> Result<Self, GraphError> {
        graph.begin_transaction(description)?;
        Ok(Self {
            graph,
            finished: false,
        })
    }

    /// Make the transaction durable.
    ///
    /// # Errors
    /// Propagates persistence errors; the graph has rolled back in that case.
    pub fn commit(mut self) -> Result<(), GraphError> {
        self.finished = true;
        self.graph.commit_transaction()
    }
}

impl<G: CommitGraph + ?Sized> Deref for Transaction<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.graph
    }
}

impl<G: CommitGraph + ?Sized> DerefMut for Transaction<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        self.graph
    }
}

impl<G: CommitGraph + ?Sized> Drop for Transaction<'_, G> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!("rolling back uncommitted graph transaction");
            self.graph.rollback_transaction();
        }
    }
}
