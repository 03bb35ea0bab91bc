//! Transaction scopes and transaction groups.
//!
//! A [`Transaction`] borrows the graph exclusively for its lifetime and moves
//! through `Inactive -> Active -> Committed | RolledBack`. Dropping an active
//! transaction rolls it back. A read scope is started with
//! [`Transaction::start_read`]: it takes no checkpoint and refuses writes.
//!
//! A [`TransactionGroup`] is a plain value holding the checkpoint taken when
//! the group began. Whoever owns the value decides whether to commit or roll
//! it back; nothing is tracked implicitly.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::GraphMut;

use super::error::EngineResult;

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created, not started.
    Inactive,
    /// Started; changes are pending.
    Active,
    /// Changes were kept. Terminal.
    Committed,
    /// Changes were discarded. Terminal.
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        };
        f.write_str(name)
    }
}

/// Transaction precondition violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    /// An operation was attempted in the wrong state.
    #[error("cannot {action} transaction '{name}' while it is {state}")]
    InvalidState {
        /// Transaction name.
        name: String,
        /// Attempted operation.
        action: &'static str,
        /// State at the time of the attempt.
        state: TransactionState,
    },

    /// A write was attempted through a read scope.
    #[error("transaction '{name}' is read-only")]
    ReadOnly {
        /// Transaction name.
        name: String,
    },

    /// A transaction group is already open.
    #[error("transaction group '{active}' is already active")]
    GroupActive {
        /// Name of the open group.
        active: String,
    },
}

/// A commit/rollback unit over a mutable graph.
pub struct Transaction<'g, G: GraphMut> {
    graph: &'g mut G,
    name: String,
    state: TransactionState,
    read_only: bool,
    checkpoint: Option<G::Checkpoint>,
}

impl<'g, G: GraphMut> Transaction<'g, G> {
    /// Creates an inactive transaction.
    pub fn new(graph: &'g mut G, name: impl Into<String>) -> Self {
        Self {
            graph,
            name: name.into(),
            state: TransactionState::Inactive,
            read_only: false,
            checkpoint: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Transaction name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn require(
        &self,
        expected: TransactionState,
        action: &'static str,
    ) -> Result<(), TransactionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(TransactionError::InvalidState {
                name: self.name.clone(),
                action,
                state: self.state,
            })
        }
    }

    /// Starts the transaction.
    ///
    /// # Errors
    ///
    /// Fails unless the transaction is inactive.
    pub fn start(&mut self) -> Result<(), TransactionError> {
        self.require(TransactionState::Inactive, "start")?;
        self.checkpoint = Some(self.graph.checkpoint());
        self.state = TransactionState::Active;
        debug!(transaction = %self.name, "Transaction started");
        Ok(())
    }

    /// Starts a read scope. No checkpoint is taken, so [`Self::graph_mut`]
    /// is refused for the life of the transaction.
    ///
    /// # Errors
    ///
    /// Fails unless the transaction is inactive.
    pub fn start_read(&mut self) -> Result<(), TransactionError> {
        self.require(TransactionState::Inactive, "start")?;
        self.read_only = true;
        self.state = TransactionState::Active;
        debug!(transaction = %self.name, "Read transaction started");
        Ok(())
    }

    /// Whether this is a read scope.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Keeps all changes made since `start`.
    ///
    /// # Errors
    ///
    /// Fails unless the transaction is active.
    pub fn commit(&mut self) -> Result<(), TransactionError> {
        self.require(TransactionState::Active, "commit")?;
        self.graph.commit_changes(&self.name);
        self.checkpoint = None;
        self.state = TransactionState::Committed;
        debug!(transaction = %self.name, "Transaction committed");
        Ok(())
    }

    /// Discards all changes made since `start`.
    ///
    /// # Errors
    ///
    /// Fails unless the transaction is active.
    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        self.require(TransactionState::Active, "roll back")?;
        if let Some(checkpoint) = self.checkpoint.take() {
            self.graph.restore(checkpoint);
        }
        self.state = TransactionState::RolledBack;
        debug!(transaction = %self.name, "Transaction rolled back");
        Ok(())
    }

    /// Read access to the graph.
    #[must_use]
    pub fn graph(&self) -> &G {
        self.graph
    }

    /// Write access to the graph.
    ///
    /// # Errors
    ///
    /// Fails unless the transaction is active and not a read scope.
    pub fn graph_mut(&mut self) -> Result<&mut G, TransactionError> {
        self.require(TransactionState::Active, "modify the document in")?;
        if self.read_only {
            return Err(TransactionError::ReadOnly {
                name: self.name.clone(),
            });
        }
        Ok(&mut *self.graph)
    }
}

impl<G: GraphMut> Drop for Transaction<'_, G> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            warn!(transaction = %self.name, "Transaction dropped while active, rolling back");
            if let Some(checkpoint) = self.checkpoint.take() {
                self.graph.restore(checkpoint);
            }
            self.state = TransactionState::RolledBack;
        }
    }
}

/// Runs `f` inside a transaction. Commits on success, rolls back on error.
///
/// # Errors
///
/// Returns the error from `f` after rolling back.
pub fn atomically<G, T>(
    graph: &mut G,
    name: &str,
    f: impl FnOnce(&mut G) -> EngineResult<T>,
) -> EngineResult<T>
where
    G: GraphMut,
{
    let mut tx = Transaction::new(graph, name);
    tx.start()?;
    match f(tx.graph_mut()?) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            warn!(transaction = name, error = %e, "Operation failed, rolling back");
            tx.rollback()?;
            Err(e)
        }
    }
}

/// Runs a read-only `f`, wrapped in an immediately committed read scope
/// when `wrap` is set.
///
/// # Errors
///
/// Returns transaction precondition violations.
pub fn read<G, T>(
    graph: &mut G,
    name: &str,
    wrap: bool,
    f: impl FnOnce(&G) -> T,
) -> EngineResult<T>
where
    G: GraphMut,
{
    if !wrap {
        return Ok(f(graph));
    }
    let mut tx = Transaction::new(graph, name);
    tx.start_read()?;
    let value = f(tx.graph());
    tx.commit()?;
    Ok(value)
}

/// An open transaction group.
#[derive(Debug)]
pub struct TransactionGroup<C> {
    name: String,
    checkpoint: C,
    undo_depth: usize,
}

impl<C> TransactionGroup<C> {
    /// Opens a group on `graph`.
    pub fn begin<G>(graph: &G, name: impl Into<String>) -> Self
    where
        G: GraphMut<Checkpoint = C>,
    {
        let name = name.into();
        debug!(group = %name, "Transaction group started");
        Self {
            name,
            checkpoint: graph.checkpoint(),
            undo_depth: graph.undo_records().len(),
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keeps every change made since `begin`. Returns the number of
    /// transactions committed inside the group.
    pub fn commit<G>(self, graph: &G) -> usize
    where
        G: GraphMut<Checkpoint = C>,
    {
        let inner = graph.undo_records().len().saturating_sub(self.undo_depth);
        debug!(group = %self.name, transactions = inner, "Transaction group committed");
        inner
    }

    /// Discards every change made since `begin`. Returns the number of
    /// transactions undone.
    pub fn rollback<G>(self, graph: &mut G) -> usize
    where
        G: GraphMut<Checkpoint = C>,
    {
        let inner = graph.undo_records().len().saturating_sub(self.undo_depth);
        graph.restore(self.checkpoint);
        warn!(group = %self.name, transactions = inner, "Transaction group rolled back");
        inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Element, ElementGraph, ElementId, ParameterValue};

    fn doc() -> Document {
        let mut doc = Document::new("tx");
        doc.add_element(Element::new(1).with_parameter("Mark", ParameterValue::Text("A".into())));
        doc
    }

    fn mark(doc: &Document) -> ParameterValue {
        doc.element(ElementId(1))
            .unwrap()
            .parameter("Mark")
            .unwrap()
            .value
            .clone()
    }

    #[test]
    fn lifecycle() {
        let mut doc = doc();
        let mut tx = Transaction::new(&mut doc, "Set Mark");
        assert_eq!(tx.state(), TransactionState::Inactive);
        assert!(tx.commit().is_err());
        assert!(tx.graph_mut().is_err());
        tx.start().unwrap();
        assert!(matches!(
            tx.start(),
            Err(TransactionError::InvalidState { action: "start", .. })
        ));
        tx.graph_mut()
            .unwrap()
            .set_parameter(ElementId(1), "Mark", ParameterValue::Text("B".into()))
            .unwrap();
        tx.commit().unwrap();
        assert!(tx.rollback().is_err());
        drop(tx);
        assert_eq!(mark(&doc), ParameterValue::Text("B".into()));
        assert_eq!(doc.undo_records().len(), 1);
    }

    #[test]
    fn drop_while_active_rolls_back() {
        let mut doc = doc();
        {
            let mut tx = Transaction::new(&mut doc, "Abandoned");
            tx.start().unwrap();
            tx.graph_mut()
                .unwrap()
                .set_parameter(ElementId(1), "Mark", ParameterValue::Text("B".into()))
                .unwrap();
        }
        assert_eq!(mark(&doc), ParameterValue::Text("A".into()));
        assert!(doc.undo_records().is_empty());
    }

    #[test]
    fn read_wrap_leaves_no_undo_record() {
        let mut doc = doc();
        let count = read(&mut doc, "Count", true, |g| g.element_count()).unwrap();
        assert_eq!(count, 1);
        assert!(doc.undo_records().is_empty());
    }

    #[test]
    fn read_scope_takes_no_checkpoint_and_refuses_writes() {
        let mut doc = doc();
        let mut tx = Transaction::new(&mut doc, "Query");
        tx.start_read().unwrap();
        assert!(tx.is_read_only());
        assert!(tx.checkpoint.is_none());
        assert!(matches!(
            tx.graph_mut(),
            Err(TransactionError::ReadOnly { .. })
        ));
        assert_eq!(tx.graph().element_count(), 1);
        tx.commit().unwrap();
        drop(tx);
        assert!(doc.undo_records().is_empty());
    }

    #[test]
    fn group_rollback_undoes_inner_transactions() {
        let mut doc = doc();
        let group = TransactionGroup::begin(&doc, "Edits");
        for value in ["B", "C"] {
            atomically(&mut doc, "Set Mark", |g| {
                g.set_parameter(ElementId(1), "Mark", ParameterValue::Text(value.into()))?;
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(doc.undo_records().len(), 2);
        assert_eq!(group.rollback(&mut doc), 2);
        assert_eq!(mark(&doc), ParameterValue::Text("A".into()));
        assert!(doc.undo_records().is_empty());
    }

    #[test]
    fn group_commit_keeps_changes() {
        let mut doc = doc();
        let group = TransactionGroup::begin(&doc, "Edits");
        atomically(&mut doc, "Set Mark", |g| {
            g.set_parameter(ElementId(1), "Mark", ParameterValue::Text("Z".into()))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(group.commit(&doc), 1);
        assert_eq!(mark(&doc), ParameterValue::Text("Z".into()));
    }
}
