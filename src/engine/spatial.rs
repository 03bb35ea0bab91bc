//! Spatial predicate evaluation.
//!
//! Bounding-box and point queries are broad-phase: they compare axis-aligned
//! bounds and count touching as intersecting. Solid intersection is exact.

use tracing::debug;

use crate::model::{BoundingBox, ElementGraph, ElementId, Point3};

use super::error::{EngineError, EngineResult};
use super::ResultSet;

/// Elements whose bounds intersect the box spanned by two corners.
#[must_use]
pub fn in_bounding_box(graph: &dyn ElementGraph, a: Point3, b: Point3) -> ResultSet {
    within(graph, &BoundingBox::from_corners(a, b))
}

/// Elements whose bounds come within `tolerance` of `point`.
#[must_use]
pub fn near_point(graph: &dyn ElementGraph, point: Point3, tolerance: f64) -> ResultSet {
    within(graph, &BoundingBox::around(point, tolerance))
}

fn within(graph: &dyn ElementGraph, probe: &BoundingBox) -> ResultSet {
    let result: ResultSet = graph
        .elements()
        .filter(|e| e.bounding_box().is_some_and(|b| b.intersects(probe)))
        .map(|e| e.id)
        .collect();
    debug!(matched = result.len(), "Bounding box filter evaluated");
    result
}

/// Elements whose solids intersect the reference element's first
/// positive-volume solid. The reference itself is excluded.
///
/// # Errors
///
/// Returns `NotFound` if the reference element does not exist and
/// `Geometry` if it has no solid with positive volume.
pub fn intersecting_solid(graph: &dyn ElementGraph, reference: ElementId) -> EngineResult<ResultSet> {
    let element = graph
        .element(reference)
        .ok_or_else(|| EngineError::element_not_found(reference))?;
    let probe = element.first_positive_solid().ok_or_else(|| {
        EngineError::geometry(format!("Element {reference} has no solid geometry"))
    })?;

    let result: ResultSet = graph
        .elements()
        .filter(|e| e.id != reference)
        .filter(|e| e.solids.iter().any(|s| s.intersects(probe)))
        .map(|e| e.id)
        .collect();
    debug!(%reference, matched = result.len(), "Solid intersection evaluated");
    Ok(result)
}
