//! Typed tool payloads.
//!
//! Every handler parses its payload into one of these structs before it
//! touches the graph. Unknown keys are ignored; missing or mistyped keys are
//! validation errors.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::engine::{CompareValue, EngineError, EngineResult, LogicOp};
use crate::model::{ElementId, Point3};

/// Parses a payload into `T`.
///
/// # Errors
///
/// Returns a validation error naming the offending field.
pub fn parse_params<T: DeserializeOwned>(payload: &Value) -> EngineResult<T> {
    T::deserialize(payload).map_err(|e| EngineError::validation(format!("invalid payload: {e}")))
}

/// `filter_elements_by_parameter`
#[derive(Debug, Deserialize)]
pub struct ParameterFilterParams {
    /// Parameter to compare.
    pub parameter_name: String,
    /// Operator name, e.g. `greater`.
    pub operator: String,
    /// Comparison value.
    pub value: CompareValue,
    /// Optional category restriction.
    #[serde(default)]
    pub category: Option<String>,
}

/// `filter_elements_by_level`
#[derive(Debug, Deserialize)]
pub struct LevelParams {
    pub level_name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// `filter_elements_by_workset`
#[derive(Debug, Deserialize)]
pub struct WorksetParams {
    pub workset_name: String,
}

/// `filter_elements_by_bounding_box`
#[derive(Debug, Deserialize)]
pub struct BoundingBoxParams {
    pub min_point: Point3,
    pub max_point: Point3,
}

/// `find_elements_at_point`
#[derive(Debug, Deserialize)]
pub struct PointParams {
    pub point: Point3,
    /// Probe half-width. Falls back to the configured point tolerance.
    #[serde(default)]
    pub tolerance: Option<f64>,
}

/// Payloads naming a single element.
#[derive(Debug, Deserialize)]
pub struct ElementParams {
    pub element_id: ElementId,
}

/// `filter_elements_by_view`
#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub view_id: ElementId,
}

/// `filter_by_multiple_criteria`
#[derive(Debug, Deserialize)]
pub struct MultiCriteriaParams {
    /// Raw `{type, ...}` objects, parsed by the criteria module.
    pub criteria: Vec<Value>,
    #[serde(default)]
    pub logic: LogicOp,
}

/// `get_all_elements_of_type`
#[derive(Debug, Deserialize)]
pub struct TypeParams {
    pub type_name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// `get_hosted_elements`
#[derive(Debug, Deserialize)]
pub struct HostParams {
    pub host_element_id: ElementId,
}

/// `get_elements_by_unique_id`
#[derive(Debug, Deserialize)]
pub struct UniqueIdParams {
    pub unique_ids: Vec<String>,
}

/// `get_linked_elements`
#[derive(Debug, Deserialize)]
pub struct LinkParams {
    pub link_instance_id: ElementId,
}

/// Payloads carrying only an id list.
#[derive(Debug, Deserialize)]
pub struct ElementIdsParams {
    pub element_ids: Vec<ElementId>,
}

/// `batch_set_parameters`
#[derive(Debug, Deserialize)]
pub struct SetParametersParams {
    pub element_ids: Vec<ElementId>,
    pub parameter_name: String,
    /// Raw value, coerced to each parameter's storage kind.
    pub value: Value,
}

/// `batch_move_elements` and `batch_copy_elements`
#[derive(Debug, Deserialize)]
pub struct TranslateParams {
    pub element_ids: Vec<ElementId>,
    pub translation: Point3,
}

/// `batch_rotate_elements`
#[derive(Debug, Deserialize)]
pub struct RotateParams {
    pub element_ids: Vec<ElementId>,
    pub axis_start: Point3,
    pub axis_end: Point3,
    /// Radians.
    pub angle: f64,
}

/// `batch_mirror_elements`
#[derive(Debug, Deserialize)]
pub struct MirrorParams {
    pub element_ids: Vec<ElementId>,
    pub plane_origin: Point3,
    pub plane_normal: Point3,
    /// Keep the originals and mirror copies. Default: true
    #[serde(default = "default_true")]
    pub copy: bool,
}

const fn default_true() -> bool {
    true
}

/// `batch_change_type`
#[derive(Debug, Deserialize)]
pub struct ChangeTypeParams {
    pub element_ids: Vec<ElementId>,
    pub new_type_id: ElementId,
}

/// `batch_isolate_in_views`
#[derive(Debug, Deserialize)]
pub struct IsolateParams {
    pub element_ids: Vec<ElementId>,
    pub view_ids: Vec<ElementId>,
}

/// `batch_export_to_csv`
#[derive(Debug, Deserialize)]
pub struct ExportCsvParams {
    pub element_ids: Vec<ElementId>,
    pub parameter_names: Vec<String>,
    /// Also write the CSV here.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

/// Transaction group tools.
#[derive(Debug, Deserialize)]
pub struct GroupParams {
    pub group_name: String,
}

/// `find_element_intersections`
#[derive(Debug, Deserialize)]
pub struct IntersectionParams {
    pub element_id: ElementId,
    #[serde(default)]
    pub target_category: Option<String>,
}

/// `find_duplicate_elements`
#[derive(Debug, Deserialize)]
pub struct DuplicateParams {
    #[serde(default)]
    pub category: Option<String>,
    /// Falls back to the configured duplicate tolerance.
    #[serde(default)]
    pub tolerance: Option<f64>,
}

/// Payloads with an optional category only.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryParams {
    #[serde(default)]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_field_is_validation_error() {
        let err = parse_params::<GroupParams>(&json!({})).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
        assert!(err.to_string().contains("group_name"));
    }

    #[test]
    fn wrong_type_is_validation_error() {
        let err = parse_params::<ElementIdsParams>(&json!({ "element_ids": "1,2" })).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let p: ElementParams = parse_params(&json!({ "element_id": 7, "extra": true })).unwrap();
        assert_eq!(p.element_id, ElementId(7));
    }

    #[test]
    fn mirror_copies_by_default() {
        let p: MirrorParams = parse_params(&json!({
            "element_ids": [1],
            "plane_origin": { "x": 0.0, "y": 0.0, "z": 0.0 },
            "plane_normal": { "x": 1.0, "y": 0.0, "z": 0.0 }
        }))
        .unwrap();
        assert!(p.copy);
    }

    #[test]
    fn logic_defaults_to_and() {
        let p: MultiCriteriaParams =
            parse_params(&json!({ "criteria": [{ "type": "category", "name": "Walls" }] })).unwrap();
        assert_eq!(p.logic, LogicOp::And);
        assert_eq!(p.criteria.len(), 1);
    }

    #[test]
    fn optional_fields_accept_empty_payload() {
        let p: DuplicateParams = parse_params(&json!({})).unwrap();
        assert!(p.category.is_none());
        assert!(p.tolerance.is_none());
    }
}
