//! Enhancement registry: batch operations, transaction groups and model
//! analysis.

use serde_json::{json, Value};
use tracing::info;

use crate::engine::{analysis, batch};
use crate::engine::{EngineError, EngineResult, TransactionError, TransactionGroup};
use crate::model::{Axis, GraphMut, Plane};

use super::params::{
    parse_params, CategoryParams, ChangeTypeParams, DuplicateParams, ElementIdsParams,
    ElementParams, ExportCsvParams, GroupParams, IntersectionParams, IsolateParams, MirrorParams,
    RotateParams, SetParametersParams, TranslateParams,
};
use super::{Registry, Session};

/// Builds the enhancement registry.
#[must_use]
pub fn registry<G: GraphMut>() -> Registry<G> {
    Registry::new("enhancements")
        .with("batch_set_parameters", batch_set_parameters)
        .with("batch_delete_elements", batch_delete_elements)
        .with("batch_copy_elements", batch_copy_elements)
        .with("batch_move_elements", batch_move_elements)
        .with("batch_rotate_elements", batch_rotate_elements)
        .with("batch_mirror_elements", batch_mirror_elements)
        .with("batch_change_type", batch_change_type)
        .with("batch_isolate_in_views", batch_isolate_in_views)
        .with("batch_export_to_csv", batch_export_to_csv)
        .with("begin_transaction_group", begin_transaction_group)
        .with("commit_transaction_group", commit_transaction_group)
        .with("rollback_transaction_group", rollback_transaction_group)
        .with("get_document_changes", get_document_changes)
        .with("get_undo_record", get_undo_record)
        .with("find_element_intersections", find_element_intersections)
        .with("validate_elements", validate_elements)
        .with("find_duplicate_elements", find_duplicate_elements)
        .with("analyze_element_dependencies", analyze_element_dependencies)
        .with("get_element_statistics", get_element_statistics)
        .with("analyze_model_performance", analyze_model_performance)
        .with("check_model_integrity", check_model_integrity)
}

// Batch operations

fn batch_set_parameters<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: SetParametersParams = parse_params(payload)?;
    let outcome =
        batch::set_parameters(session.graph_mut(), &p.element_ids, &p.parameter_name, &p.value)?;
    Ok(json!(outcome))
}

fn batch_delete_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ElementIdsParams = parse_params(payload)?;
    let outcome = batch::delete_elements(session.graph_mut(), &p.element_ids)?;
    Ok(json!(outcome))
}

fn batch_copy_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: TranslateParams = parse_params(payload)?;
    let outcome = batch::copy_elements(session.graph_mut(), &p.element_ids, p.translation)?;
    Ok(json!(outcome))
}

fn batch_move_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: TranslateParams = parse_params(payload)?;
    let outcome = batch::move_elements(session.graph_mut(), &p.element_ids, p.translation)?;
    Ok(json!(outcome))
}

fn batch_rotate_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: RotateParams = parse_params(payload)?;
    if !p.angle.is_finite() {
        return Err(EngineError::validation("angle must be a finite number of radians"));
    }
    let axis = Axis {
        start: p.axis_start,
        end: p.axis_end,
    };
    let outcome = batch::rotate_elements(session.graph_mut(), &p.element_ids, axis, p.angle)?;
    let mut result = json!(outcome);
    result["angle"] = json!(p.angle);
    result["angle_degrees"] = json!(p.angle.to_degrees());
    Ok(result)
}

fn batch_mirror_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: MirrorParams = parse_params(payload)?;
    let plane = Plane {
        origin: p.plane_origin,
        normal: p.plane_normal,
    };
    let outcome = batch::mirror_elements(session.graph_mut(), &p.element_ids, plane, p.copy)?;
    Ok(json!(outcome))
}

fn batch_change_type<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ChangeTypeParams = parse_params(payload)?;
    let outcome = batch::change_type(session.graph_mut(), &p.element_ids, p.new_type_id)?;
    Ok(json!(outcome))
}

fn batch_isolate_in_views<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: IsolateParams = parse_params(payload)?;
    let outcome = batch::isolate_in_views(session.graph_mut(), &p.element_ids, &p.view_ids)?;
    let mut result = json!(outcome);
    result["isolated_element_count"] = json!(p.element_ids.len());
    Ok(result)
}

fn batch_export_to_csv<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ExportCsvParams = parse_params(payload)?;
    let export = session.read("Export to CSV", |g, _| {
        analysis::export_csv(g, &p.element_ids, &p.parameter_names)
    })?;

    let mut result = json!(export);
    if let Some(requested) = &p.output_path {
        let path = session.export_target(requested)?;
        std::fs::write(&path, &export.csv)
            .map_err(|e| EngineError::export(format!("cannot write {}: {e}", path.display())))?;
        info!(path = %path.display(), rows = export.row_count, "CSV written");
        result["output_path"] = json!(path);
    }
    Ok(result)
}

// Transaction groups

fn begin_transaction_group<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: GroupParams = parse_params(payload)?;
    if p.group_name.trim().is_empty() {
        return Err(EngineError::validation("group_name must not be empty"));
    }
    if let Some(active) = session.active_group() {
        return Err(TransactionError::GroupActive {
            active: active.to_string(),
        }
        .into());
    }
    let group = TransactionGroup::begin(session.graph(), p.group_name.as_str());
    *session.group_mut() = Some(group);
    Ok(json!({ "group_name": p.group_name, "status": "active" }))
}

/// Takes the open group if it has the given name, leaving any other group
/// in place.
fn take_group<G: GraphMut>(
    session: &mut Session<G>,
    name: &str,
) -> EngineResult<TransactionGroup<G::Checkpoint>> {
    match session.group_mut().take() {
        Some(group) if group.name() == name => Ok(group),
        other => {
            *session.group_mut() = other;
            Err(EngineError::not_found("Transaction group", name))
        }
    }
}

fn commit_transaction_group<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: GroupParams = parse_params(payload)?;
    let group = take_group(session, &p.group_name)?;
    let transactions = group.commit(session.graph());
    Ok(json!({
        "group_name": p.group_name,
        "status": "committed",
        "transactions": transactions,
    }))
}

fn rollback_transaction_group<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: GroupParams = parse_params(payload)?;
    let group = take_group(session, &p.group_name)?;
    let transactions = group.rollback(session.graph_mut());
    Ok(json!({
        "group_name": p.group_name,
        "status": "rolled_back",
        "transactions": transactions,
    }))
}

fn get_document_changes<G: GraphMut>(
    session: &mut Session<G>,
    _payload: &Value,
) -> EngineResult<Value> {
    session.read("Document Changes", |g, _| Ok(json!(analysis::document_changes(g))))
}

fn get_undo_record<G: GraphMut>(session: &mut Session<G>, _payload: &Value) -> EngineResult<Value> {
    let active_group = session.active_group().map(str::to_string);
    session.read("Undo Record", |g, _| {
        let mut result = json!(analysis::undo_status(g));
        result["active_group"] = json!(active_group);
        Ok(result)
    })
}

// Analysis

fn find_element_intersections<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: IntersectionParams = parse_params(payload)?;
    session.read("Element Intersections", |g, _| {
        let report = analysis::find_intersections(g, p.element_id, p.target_category.as_deref())?;
        Ok(json!(report))
    })
}

fn validate_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ElementIdsParams = parse_params(payload)?;
    if p.element_ids.is_empty() {
        return Err(EngineError::validation("element_ids must not be empty"));
    }
    session.read("Validate Elements", |g, _| Ok(json!(analysis::validate(g, &p.element_ids))))
}

fn find_duplicate_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: DuplicateParams = parse_params(payload)?;
    if p.tolerance.is_some_and(|t| !(t.is_finite() && t > 0.0)) {
        return Err(EngineError::validation("tolerance must be a positive number"));
    }
    session.read("Find Duplicates", |g, options| {
        let tolerance = p.tolerance.unwrap_or(options.duplicate_tolerance);
        let mut result = json!(analysis::find_duplicates(g, p.category.as_deref(), tolerance));
        result["tolerance"] = json!(tolerance);
        Ok(result)
    })
}

fn analyze_element_dependencies<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ElementParams = parse_params(payload)?;
    session.read("Analyze Dependencies", |g, _| {
        Ok(json!(analysis::analyze_dependencies(g, p.element_id)?))
    })
}

fn get_element_statistics<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: CategoryParams = parse_params(payload)?;
    session.read("Element Statistics", |g, _| {
        Ok(json!(analysis::statistics(g, p.category.as_deref())))
    })
}

fn analyze_model_performance<G: GraphMut>(
    session: &mut Session<G>,
    _payload: &Value,
) -> EngineResult<Value> {
    session.read("Model Performance", |g, _| Ok(json!(analysis::model_performance(g))))
}

fn check_model_integrity<G: GraphMut>(
    session: &mut Session<G>,
    _payload: &Value,
) -> EngineResult<Value> {
    session.read("Model Integrity", |g, _| Ok(json!(analysis::check_integrity(g))))
}
