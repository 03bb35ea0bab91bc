//! Query engine and batch executor.
//!
//! Queries flow through the predicate evaluators ([`parameter`], [`spatial`],
//! [`relational`]) and are folded by the [`combinator`]. Mutations go through
//! [`batch`], always inside a [`transaction`]. Nothing here keeps state
//! between calls.

pub mod analysis;
pub mod batch;
pub mod combinator;
pub mod criteria;
pub mod error;
pub mod parameter;
pub mod relational;
pub mod spatial;
pub mod transaction;

pub use batch::{BatchFailure, BatchOutcome};
pub use combinator::{ScopedId, ScopedSet};
pub use criteria::{CompareValue, ComparisonOperator, CriteriaSet, Criterion, LogicOp};
pub use error::{EngineError, EngineResult};
pub use transaction::{Transaction, TransactionError, TransactionGroup, TransactionState};

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{Element, ElementId};

/// Matching element ids, ascending.
pub type ResultSet = BTreeSet<ElementId>;

/// Default half-width of point proximity probes.
pub const DEFAULT_POINT_TOLERANCE: f64 = 0.1;

/// Default distance under which two locations count as duplicates.
pub const DEFAULT_DUPLICATE_TOLERANCE: f64 = 0.01;

/// Tunables for query evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Half-width used when a point criterion has no tolerance.
    pub point_tolerance: f64,
    /// Distance used by duplicate detection when the request has none.
    pub duplicate_tolerance: f64,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            point_tolerance: DEFAULT_POINT_TOLERANCE,
            duplicate_tolerance: DEFAULT_DUPLICATE_TOLERANCE,
        }
    }
}

/// Compact element description used in query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementSummary {
    /// Element id.
    pub id: ElementId,
    /// Category name or "Unknown".
    pub category: String,
    /// Element name or "Unnamed".
    pub name: String,
    /// Unique id string.
    pub unique_id: String,
}

impl From<&Element> for ElementSummary {
    fn from(element: &Element) -> Self {
        Self {
            id: element.id,
            category: element.category_name().to_string(),
            name: element.display_name().to_string(),
            unique_id: element.unique_id.clone(),
        }
    }
}
