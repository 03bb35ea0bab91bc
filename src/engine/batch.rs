//! Batch mutation executor.
//!
//! Two paths, never mixed:
//!
//! - per-element operations (parameter writes, type changes, view isolation)
//!   try every id on its own, record failures as data, and always commit
//! - bulk operations (move, copy, rotate, mirror, delete) are one atomic
//!   host call; any failure rolls the whole transaction back and is returned
//!   as an error

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::model::{
    Axis, ElementGraph, ElementId, GraphMut, ModelError, ParameterValue, Plane, Point3,
    StorageKind,
};

use super::error::{EngineError, EngineResult};
use super::transaction::{atomically, Transaction};

/// Failure message for ids that do not resolve.
pub const ELEMENT_NOT_FOUND: &str = "Element not found";

/// Failure message for parameters that are missing or read-only.
pub const PARAMETER_NOT_WRITABLE: &str = "Parameter not found or read-only";

/// Failure message for view ids that do not resolve.
pub const VIEW_NOT_FOUND: &str = "View not found";

/// One id the operation could not be applied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// The id that failed.
    pub element_id: ElementId,
    /// Why it failed.
    pub error: String,
}

/// Result of a batch mutation.
///
/// For per-element operations `success_count + failures.len()` always equals
/// `requested_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Number of ids in the request.
    pub requested_count: usize,
    /// Number of ids the operation succeeded for.
    pub success_count: usize,
    /// Per-id failures.
    pub failures: Vec<BatchFailure>,
    /// Ids the host reports as changed or created.
    pub affected_ids: Vec<ElementId>,
}

impl BatchOutcome {
    fn requested(count: usize) -> Self {
        Self {
            requested_count: count,
            ..Self::default()
        }
    }

    fn record(mut self, id: ElementId, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => {
                self.success_count += 1;
                self.affected_ids.push(id);
            }
            Err(error) => self.failures.push(BatchFailure {
                element_id: id,
                error,
            }),
        }
        self
    }

    /// Whether any id failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

fn require_ids(ids: &[ElementId], field: &str) -> EngineResult<()> {
    if ids.is_empty() {
        return Err(EngineError::validation(format!("'{field}' must not be empty")));
    }
    Ok(())
}

/// Applies `op` to every id independently and commits.
fn per_element<G, F>(
    graph: &mut G,
    name: &str,
    ids: &[ElementId],
    mut op: F,
) -> EngineResult<BatchOutcome>
where
    G: GraphMut,
    F: FnMut(&mut G, ElementId) -> Result<(), String>,
{
    let mut tx = Transaction::new(graph, name);
    tx.start()?;
    let target = tx.graph_mut()?;
    let outcome = ids.iter().fold(BatchOutcome::requested(ids.len()), |acc, &id| {
        let result = op(&mut *target, id);
        acc.record(id, result)
    });
    tx.commit()?;

    if outcome.has_failures() {
        warn!(
            operation = name,
            succeeded = outcome.success_count,
            failed = outcome.failures.len(),
            "Batch finished with partial failures"
        );
    } else {
        info!(operation = name, count = outcome.success_count, "Batch committed");
    }
    Ok(outcome)
}

/// Converts a JSON value to the storage kind of the target parameter.
fn coerce(value: &Value, kind: StorageKind) -> Option<ParameterValue> {
    match kind {
        StorageKind::Integer => value
            .as_i64()
            .or_else(|| integral(value.as_f64()?))
            .map(ParameterValue::Integer),
        StorageKind::Double => value.as_f64().map(ParameterValue::Double),
        StorageKind::Text => value.as_str().map(|s| ParameterValue::Text(s.to_string())),
        StorageKind::ElementReference => value
            .as_i64()
            .map(|id| ParameterValue::ElementReference(ElementId(id))),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integral(d: f64) -> Option<i64> {
    (d.fract() == 0.0 && d.abs() < 9.0e15).then_some(d as i64)
}

/// Writes one parameter on every element.
///
/// # Errors
///
/// Returns a validation error for an empty id list. Per-element problems
/// are reported in the outcome.
pub fn set_parameters<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
    parameter: &str,
    value: &Value,
) -> EngineResult<BatchOutcome> {
    require_ids(ids, "element_ids")?;
    per_element(graph, "Batch Set Parameters", ids, |g, id| {
        let element = g.element(id).ok_or(ELEMENT_NOT_FOUND)?;
        let kind = element
            .parameter(parameter)
            .filter(|p| !p.read_only)
            .ok_or(PARAMETER_NOT_WRITABLE)?
            .value
            .kind();
        let typed = coerce(value, kind).ok_or_else(|| {
            ModelError::StorageMismatch {
                name: parameter.to_string(),
                expected: kind,
            }
            .to_string()
        })?;
        g.set_parameter(id, parameter, typed).map_err(|e| e.to_string())
    })
}

/// Assigns a new type to every element.
///
/// # Errors
///
/// Returns a validation error for an empty id list.
pub fn change_type<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
    type_id: ElementId,
) -> EngineResult<BatchOutcome> {
    require_ids(ids, "element_ids")?;
    per_element(graph, "Batch Change Type", ids, |g, id| {
        if g.element(id).is_none() {
            return Err(ELEMENT_NOT_FOUND.to_string());
        }
        g.change_type(id, type_id).map_err(|e| e.to_string())
    })
}

/// Isolates the elements in every view. Outcome entries are keyed by view id.
///
/// # Errors
///
/// Returns a validation error if either id list is empty.
pub fn isolate_in_views<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
    views: &[ElementId],
) -> EngineResult<BatchOutcome> {
    require_ids(ids, "element_ids")?;
    require_ids(views, "view_ids")?;
    per_element(graph, "Batch Isolate in Views", views, |g, view| {
        if g.view(view).is_none() {
            return Err(VIEW_NOT_FOUND.to_string());
        }
        g.isolate_in_view(view, ids).map_err(|e| e.to_string())
    })
}

fn bulk<G, F>(graph: &mut G, name: &str, ids: &[ElementId], op: F) -> EngineResult<BatchOutcome>
where
    G: GraphMut,
    F: FnOnce(&mut G) -> Result<Vec<ElementId>, ModelError>,
{
    require_ids(ids, "element_ids")?;
    let affected_ids = atomically(graph, name, |g| op(g).map_err(EngineError::from))?;
    info!(
        operation = name,
        requested = ids.len(),
        affected = affected_ids.len(),
        "Batch committed"
    );
    Ok(BatchOutcome {
        requested_count: ids.len(),
        success_count: ids.len(),
        failures: Vec::new(),
        affected_ids,
    })
}

/// Translates every element.
///
/// # Errors
///
/// Fails without changes if the host rejects the move.
pub fn move_elements<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
    translation: Point3,
) -> EngineResult<BatchOutcome> {
    bulk(graph, "Batch Move Elements", ids, |g| {
        g.move_elements(ids, translation)?;
        Ok(ids.to_vec())
    })
}

/// Copies every element with an offset. Affected ids are the copies.
///
/// # Errors
///
/// Fails without changes if the host rejects the copy.
pub fn copy_elements<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
    translation: Point3,
) -> EngineResult<BatchOutcome> {
    bulk(graph, "Batch Copy Elements", ids, |g| {
        g.copy_elements(ids, translation)
    })
}

/// Rotates every element about one axis.
///
/// # Errors
///
/// Fails without changes if the host rejects the rotation.
pub fn rotate_elements<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
    axis: Axis,
    angle: f64,
) -> EngineResult<BatchOutcome> {
    bulk(graph, "Batch Rotate Elements", ids, |g| {
        g.rotate_elements(ids, axis, angle)?;
        Ok(ids.to_vec())
    })
}

/// Mirrors every element across one plane. With `copy` the affected ids are
/// the mirrored copies.
///
/// # Errors
///
/// Fails without changes if the host rejects the mirror.
pub fn mirror_elements<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
    plane: Plane,
    copy: bool,
) -> EngineResult<BatchOutcome> {
    bulk(graph, "Batch Mirror Elements", ids, |g| {
        g.mirror_elements(ids, plane, copy)
    })
}

/// Deletes every element. Affected ids are everything the host deleted,
/// including cascaded dependents.
///
/// # Errors
///
/// Fails without changes if the host rejects the delete.
pub fn delete_elements<G: GraphMut>(
    graph: &mut G,
    ids: &[ElementId],
) -> EngineResult<BatchOutcome> {
    bulk(graph, "Batch Delete Elements", ids, |g| g.delete_elements(ids))
}
