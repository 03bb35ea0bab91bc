//! Core registry: filtering and element queries.

use serde_json::{json, Value};

use crate::engine::{analysis, combinator, parameter, relational, spatial};
use crate::engine::{
    ComparisonOperator, CriteriaSet, ElementSummary, EngineError, EngineResult, ResultSet,
    ScopedSet,
};
use crate::model::{ElementGraph, GraphMut};

use super::params::{
    parse_params, BoundingBoxParams, ElementParams, HostParams, LevelParams, LinkParams,
    MultiCriteriaParams, ParameterFilterParams, PointParams, TypeParams, UniqueIdParams,
    ViewParams, WorksetParams,
};
use super::{enhancements, Registry, Session};

/// Builds the core registry.
#[must_use]
pub fn registry<G: GraphMut>() -> Registry<G> {
    Registry::new("core")
        .with("filter_elements_by_parameter", filter_elements_by_parameter)
        .with("filter_elements_by_level", filter_elements_by_level)
        .with("filter_elements_by_workset", filter_elements_by_workset)
        .with("filter_elements_by_bounding_box", filter_elements_by_bounding_box)
        .with("filter_elements_intersecting", filter_elements_intersecting)
        .with("filter_elements_by_view", filter_elements_by_view)
        .with("find_elements_at_point", find_elements_at_point)
        .with("filter_by_multiple_criteria", filter_by_multiple_criteria)
        .with("get_all_elements_of_type", get_all_elements_of_type)
        .with("get_dependent_elements", get_dependent_elements)
        .with("get_hosted_elements", get_hosted_elements)
        .with("find_similar_elements", find_similar_elements)
        .with("get_elements_by_unique_id", get_elements_by_unique_id)
        .with("get_linked_elements", get_linked_elements)
        .with("list_tools", list_tools)
}

fn summaries(graph: &dyn ElementGraph, ids: &ResultSet) -> Vec<ElementSummary> {
    ids.iter()
        .filter_map(|id| graph.element(*id))
        .map(ElementSummary::from)
        .collect()
}

fn element_list(graph: &dyn ElementGraph, ids: &ResultSet) -> Value {
    let elements = summaries(graph, ids);
    json!({ "count": elements.len(), "elements": elements })
}

/// Like [`element_list`], but linked matches are looked up in their own
/// document and carry `link_instance_id`.
fn scoped_element_list(graph: &dyn ElementGraph, matches: &ScopedSet) -> Value {
    let elements: Vec<Value> = matches
        .iter()
        .filter_map(|m| m.resolve(graph).map(|e| (m.link, e)))
        .map(|(link, element)| {
            let mut entry = json!(ElementSummary::from(element));
            if let Some(link) = link {
                entry["link_instance_id"] = json!(link);
            }
            entry
        })
        .collect();
    json!({ "count": elements.len(), "elements": elements })
}

/// Intersects `set` with a category when one is given.
fn restrict(graph: &dyn ElementGraph, set: ResultSet, category: Option<&str>) -> ResultSet {
    match category {
        Some(name) => {
            let allowed = relational::of_category(graph, name);
            set.intersection(&allowed).copied().collect()
        }
        None => set,
    }
}

fn filter_elements_by_parameter<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ParameterFilterParams = parse_params(payload)?;
    let operator = ComparisonOperator::parse(&p.operator)?;
    session.read("Filter by Parameter", |g, _| {
        let set = parameter::filter(g, &p.parameter_name, operator, &p.value);
        let set = restrict(g, set, p.category.as_deref());
        Ok(element_list(g, &set))
    })
}

fn filter_elements_by_level<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: LevelParams = parse_params(payload)?;
    session.read("Filter by Level", |g, _| {
        let level = relational::resolve_level(g, &p.level_name)?;
        let set = restrict(g, relational::members_of_level(g, level.id), p.category.as_deref());
        let mut result = element_list(g, &set);
        result["level"] = json!(level.name);
        result["level_id"] = json!(level.id);
        Ok(result)
    })
}

fn filter_elements_by_workset<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: WorksetParams = parse_params(payload)?;
    session.read("Filter by Workset", |g, _| {
        let workset = relational::resolve_workset(g, &p.workset_name)?;
        let mut result = element_list(g, &relational::members_of_workset(g, workset.id));
        result["workset"] = json!(workset.name);
        result["workset_id"] = json!(workset.id);
        Ok(result)
    })
}

fn filter_elements_by_bounding_box<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: BoundingBoxParams = parse_params(payload)?;
    session.read("Filter by Bounding Box", |g, _| {
        let set = spatial::in_bounding_box(g, p.min_point, p.max_point);
        let mut result = element_list(g, &set);
        result["bounding_box"] = json!({ "min": p.min_point, "max": p.max_point });
        Ok(result)
    })
}

fn filter_elements_intersecting<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ElementParams = parse_params(payload)?;
    session.read("Filter Intersecting", |g, _| {
        let mut result = element_list(g, &spatial::intersecting_solid(g, p.element_id)?);
        result["reference_element_id"] = json!(p.element_id);
        Ok(result)
    })
}

fn filter_elements_by_view<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ViewParams = parse_params(payload)?;
    session.read("Filter by View", |g, _| {
        let mut result = element_list(g, &relational::in_view(g, p.view_id)?);
        result["view_id"] = json!(p.view_id);
        Ok(result)
    })
}

fn find_elements_at_point<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: PointParams = parse_params(payload)?;
    if p.tolerance.is_some_and(|t| !(t.is_finite() && t >= 0.0)) {
        return Err(EngineError::validation(
            "tolerance must be a non-negative number",
        ));
    }
    session.read("Find at Point", |g, options| {
        let tolerance = p.tolerance.unwrap_or(options.point_tolerance);
        let mut result = element_list(g, &spatial::near_point(g, p.point, tolerance));
        result["point"] = json!(p.point);
        result["tolerance"] = json!(tolerance);
        Ok(result)
    })
}

fn filter_by_multiple_criteria<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: MultiCriteriaParams = parse_params(payload)?;
    let set = CriteriaSet::from_json(&p.criteria, p.logic)?;
    session.read("Filter by Multiple Criteria", |g, options| {
        let mut result = scoped_element_list(g, &combinator::evaluate_set(g, &set, options)?);
        result["criteria_count"] = json!(set.criteria().len());
        result["logic"] = json!(p.logic);
        Ok(result)
    })
}

fn get_all_elements_of_type<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: TypeParams = parse_params(payload)?;
    session.read("Elements of Type", |g, _| {
        let elements: Vec<Value> =
            analysis::elements_of_type(g, &p.type_name, p.category.as_deref())
                .into_iter()
                .map(|(element, type_name)| {
                    let mut entry = json!(ElementSummary::from(element));
                    entry["type_name"] = json!(type_name);
                    entry
                })
                .collect();
        Ok(json!({
            "type_name": p.type_name,
            "count": elements.len(),
            "elements": elements,
        }))
    })
}

fn get_dependent_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ElementParams = parse_params(payload)?;
    session.read("Dependent Elements", |g, _| {
        let mut result = element_list(g, &relational::dependents_of(g, p.element_id)?);
        result["element_id"] = json!(p.element_id);
        Ok(result)
    })
}

fn get_hosted_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: HostParams = parse_params(payload)?;
    session.read("Hosted Elements", |g, _| {
        let mut result = element_list(g, &relational::hosted_on(g, p.host_element_id)?);
        result["host_element_id"] = json!(p.host_element_id);
        Ok(result)
    })
}

fn find_similar_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: ElementParams = parse_params(payload)?;
    session.read("Similar Elements", |g, _| {
        let (source, similar) = analysis::similar_elements(g, p.element_id)?;
        let elements: Vec<ElementSummary> = similar.into_iter().map(ElementSummary::from).collect();
        Ok(json!({
            "source": ElementSummary::from(source),
            "count": elements.len(),
            "elements": elements,
        }))
    })
}

fn get_elements_by_unique_id<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: UniqueIdParams = parse_params(payload)?;
    session.read("Elements by Unique Id", |g, _| {
        let elements: Vec<ElementSummary> = analysis::by_unique_ids(g, &p.unique_ids)
            .into_iter()
            .map(ElementSummary::from)
            .collect();
        let missing: Vec<&String> = p
            .unique_ids
            .iter()
            .filter(|uid| !elements.iter().any(|e| &e.unique_id == *uid))
            .collect();
        Ok(json!({
            "count": elements.len(),
            "elements": elements,
            "missing": missing,
        }))
    })
}

fn get_linked_elements<G: GraphMut>(
    session: &mut Session<G>,
    payload: &Value,
) -> EngineResult<Value> {
    let p: LinkParams = parse_params(payload)?;
    session.read("Linked Elements", |g, _| {
        let ids = relational::linked_in(g, p.link_instance_id)?;
        // linked_in has already resolved the link and its document.
        let link = g
            .link(p.link_instance_id)
            .ok_or_else(|| EngineError::not_found("Link instance", p.link_instance_id.to_string()))?;
        let elements = link.document.map(|doc| summaries(doc, &ids)).unwrap_or_default();
        Ok(json!({
            "link_instance_id": p.link_instance_id,
            "document": link.title,
            "count": elements.len(),
            "elements": elements,
        }))
    })
}

#[allow(clippy::unnecessary_wraps)]
fn list_tools<G: GraphMut>(_session: &mut Session<G>, _payload: &Value) -> EngineResult<Value> {
    let core = registry::<G>();
    let enhancements = enhancements::registry::<G>();
    let tools: serde_json::Map<String, Value> = [core, enhancements]
        .iter()
        .map(|r| (r.name().to_string(), json!(r.tools().collect::<Vec<_>>())))
        .collect();
    Ok(Value::Object(tools))
}
