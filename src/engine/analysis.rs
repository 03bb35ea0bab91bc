//! Read-only reports over the element graph.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::model::{fold_case, same_name, Element, ElementGraph, ElementId, ParameterValue, Point3};

use super::error::{EngineError, EngineResult};
use super::ElementSummary;

/// Number of entries kept in "top N" lists.
const TOP_N: usize = 10;

fn matches_category(element: &Element, category: Option<&str>) -> bool {
    category.map_or(true, |wanted| {
        element
            .category
            .as_deref()
            .is_some_and(|c| same_name(c, wanted))
    })
}

/// Elements whose type name contains `type_name`, case-insensitive.
#[must_use]
pub fn elements_of_type<'g>(
    graph: &'g dyn ElementGraph,
    type_name: &str,
    category: Option<&str>,
) -> Vec<(&'g Element, &'g str)> {
    let needle = fold_case(type_name);
    graph
        .elements()
        .filter(|e| matches_category(e, category))
        .filter_map(|e| {
            let ty = graph.element_type(e.type_id?)?;
            fold_case(&ty.name)
                .contains(&needle)
                .then_some((e, ty.name.as_str()))
        })
        .collect()
}

/// Elements sharing category and type with the reference, excluding it.
///
/// # Errors
///
/// Returns `NotFound` if the reference element does not exist.
pub fn similar_elements(
    graph: &dyn ElementGraph,
    reference: ElementId,
) -> EngineResult<(&Element, Vec<&Element>)> {
    let source = graph
        .element(reference)
        .ok_or_else(|| EngineError::element_not_found(reference))?;
    let similar = graph
        .elements()
        .filter(|e| e.id != reference)
        .filter(|e| e.category == source.category && e.type_id == source.type_id)
        .collect();
    Ok((source, similar))
}

/// Resolves unique id strings. Unknown ids are skipped.
#[must_use]
pub fn by_unique_ids<'g>(graph: &'g dyn ElementGraph, unique_ids: &[String]) -> Vec<&'g Element> {
    unique_ids
        .iter()
        .filter_map(|uid| graph.element_by_unique_id(uid))
        .collect()
}

/// A group of elements sharing one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    /// Location of the first element in the group.
    pub location: Point3,
    /// Number of elements in the group.
    pub duplicate_count: usize,
    /// Ids in the group, ascending.
    pub element_ids: Vec<ElementId>,
}

/// Result of duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateReport {
    /// Number of groups found.
    pub duplicate_group_count: usize,
    /// Elements beyond the first in each group.
    pub total_duplicates: usize,
    /// The groups.
    pub duplicate_groups: Vec<DuplicateGroup>,
}

/// Groups elements whose location points lie within `tolerance` of each
/// other. Pairwise, so quadratic in the number of located elements.
#[must_use]
pub fn find_duplicates(
    graph: &dyn ElementGraph,
    category: Option<&str>,
    tolerance: f64,
) -> DuplicateReport {
    let located: Vec<(ElementId, Point3)> = graph
        .elements()
        .filter(|e| matches_category(e, category))
        .filter_map(|e| Some((e.id, e.location?)))
        .collect();

    let mut processed = BTreeSet::new();
    let mut groups = Vec::new();
    for (i, &(id, point)) in located.iter().enumerate() {
        if processed.contains(&id) {
            continue;
        }
        let mut members = vec![id];
        for &(other, other_point) in &located[i + 1..] {
            if !processed.contains(&other) && point.distance_to(other_point) < tolerance {
                members.push(other);
                processed.insert(other);
            }
        }
        processed.insert(id);
        if members.len() > 1 {
            groups.push(DuplicateGroup {
                location: point,
                duplicate_count: members.len(),
                element_ids: members,
            });
        }
    }

    debug!(located = located.len(), groups = groups.len(), "Duplicate scan complete");
    DuplicateReport {
        duplicate_group_count: groups.len(),
        total_duplicates: groups.iter().map(|g| g.duplicate_count - 1).sum(),
        duplicate_groups: groups,
    }
}

/// Dependency overview of one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    /// The analysed element.
    pub element_id: ElementId,
    /// Number of one-hop dependents.
    pub dependent_count: usize,
    /// One-hop dependents.
    pub dependents: Vec<ElementSummary>,
    /// Host element, if any.
    pub host: Option<ElementSummary>,
}

/// Lists an element's dependents and host.
///
/// # Errors
///
/// Returns `NotFound` if the element does not exist.
pub fn analyze_dependencies(graph: &dyn ElementGraph, id: ElementId) -> EngineResult<DependencyReport> {
    let element = graph.element(id).ok_or_else(|| EngineError::element_not_found(id))?;
    let dependents: Vec<ElementSummary> = graph
        .dependents(id)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|d| graph.element(d))
        .map(ElementSummary::from)
        .collect();
    let host = element
        .host
        .and_then(|h| graph.element(h))
        .map(ElementSummary::from);
    Ok(DependencyReport {
        element_id: id,
        dependent_count: dependents.len(),
        dependents,
        host,
    })
}

/// Element count for one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    /// Type id; `None` groups untyped elements.
    pub type_id: Option<ElementId>,
    /// Type name if the type resolves.
    pub type_name: Option<String>,
    /// Number of elements.
    pub count: usize,
}

/// Element count for one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelCount {
    /// Level id.
    pub level_id: ElementId,
    /// Level name if the level resolves.
    pub level_name: Option<String>,
    /// Number of elements.
    pub count: usize,
}

/// Element statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Number of elements considered.
    pub total_count: usize,
    /// Number of distinct types.
    pub unique_types: usize,
    /// Most used types, descending.
    pub top_types: Vec<TypeCount>,
    /// Element count per level, descending.
    pub distribution_by_level: Vec<LevelCount>,
}

/// Counts elements by type and level, optionally within one category.
#[must_use]
pub fn statistics(graph: &dyn ElementGraph, category: Option<&str>) -> Statistics {
    let mut by_type: BTreeMap<Option<ElementId>, usize> = BTreeMap::new();
    let mut by_level: BTreeMap<ElementId, usize> = BTreeMap::new();
    let mut total = 0;
    for element in graph.elements().filter(|e| matches_category(e, category)) {
        total += 1;
        *by_type.entry(element.type_id).or_default() += 1;
        if let Some(level) = element.level {
            *by_level.entry(level).or_default() += 1;
        }
    }

    let mut types: Vec<TypeCount> = by_type
        .into_iter()
        .map(|(type_id, count)| TypeCount {
            type_id,
            type_name: type_id
                .and_then(|t| graph.element_type(t))
                .map(|t| t.name.clone()),
            count,
        })
        .collect();
    types.sort_by(|a, b| b.count.cmp(&a.count));
    let unique_types = types.len();
    types.truncate(TOP_N);

    let mut levels: Vec<LevelCount> = by_level
        .into_iter()
        .map(|(level_id, count)| LevelCount {
            level_id,
            level_name: graph
                .levels()
                .iter()
                .find(|l| l.id == level_id)
                .map(|l| l.name.clone()),
            count,
        })
        .collect();
    levels.sort_by(|a, b| b.count.cmp(&a.count));

    Statistics {
        total_count: total,
        unique_types,
        top_types: types,
        distribution_by_level: levels,
    }
}

/// Validation result for one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationEntry {
    /// Element id.
    pub element_id: ElementId,
    /// Whether no issues were found.
    pub is_valid: bool,
    /// Category, if the element exists and has one.
    pub category: Option<String>,
    /// Issues found.
    pub issues: Vec<String>,
}

/// Validation results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Number of ids checked.
    pub validated_count: usize,
    /// Number of valid elements.
    pub valid_count: usize,
    /// Number of invalid or missing elements.
    pub invalid_count: usize,
    /// Per-element results, in request order.
    pub results: Vec<ValidationEntry>,
}

/// A problem found on one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementIssue {
    MissingCategory,
    NoGeometry,
    DanglingType(ElementId),
    DanglingHost(ElementId),
}

impl std::fmt::Display for ElementIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCategory => f.write_str("Missing category"),
            Self::NoGeometry => f.write_str("No geometry"),
            Self::DanglingType(id) => write!(f, "Type {id} not found"),
            Self::DanglingHost(id) => write!(f, "Host {id} not found"),
        }
    }
}

fn element_issues(graph: &dyn ElementGraph, element: &Element) -> Vec<ElementIssue> {
    let mut issues = Vec::new();
    if element.category.is_none() {
        issues.push(ElementIssue::MissingCategory);
    }
    if element.solids.is_empty() && element.location.is_none() {
        issues.push(ElementIssue::NoGeometry);
    }
    if let Some(type_id) = element.type_id {
        if graph.element_type(type_id).is_none() {
            issues.push(ElementIssue::DanglingType(type_id));
        }
    }
    if let Some(host) = element.host {
        if graph.element(host).is_none() {
            issues.push(ElementIssue::DanglingHost(host));
        }
    }
    issues
}

/// Checks each element for missing category, missing geometry and dangling
/// references.
#[must_use]
pub fn validate(graph: &dyn ElementGraph, ids: &[ElementId]) -> ValidationReport {
    let results: Vec<ValidationEntry> = ids
        .iter()
        .map(|&id| {
            let Some(element) = graph.element(id) else {
                return ValidationEntry {
                    element_id: id,
                    is_valid: false,
                    category: None,
                    issues: vec!["Element not found".to_string()],
                };
            };
            let issues: Vec<String> = element_issues(graph, element)
                .iter()
                .map(ToString::to_string)
                .collect();
            ValidationEntry {
                element_id: id,
                is_valid: issues.is_empty(),
                category: element.category.clone(),
                issues,
            }
        })
        .collect();

    let valid_count = results.iter().filter(|r| r.is_valid).count();
    ValidationReport {
        validated_count: results.len(),
        valid_count,
        invalid_count: results.len() - valid_count,
        results,
    }
}

/// How bad an integrity issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// The model works but is untidy.
    Warning,
    /// The model references things that do not exist.
    Error,
}

/// One class of problem across the whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    /// What is wrong.
    pub issue_type: &'static str,
    /// Number of affected elements.
    pub count: usize,
    /// How bad it is.
    pub severity: Severity,
    /// Affected elements, ascending.
    pub element_ids: Vec<ElementId>,
}

/// Document-wide integrity results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Number of elements checked.
    pub checked_count: usize,
    /// Number of issue classes found.
    pub total_issues: usize,
    /// Whether nothing was found.
    pub is_healthy: bool,
    /// Issue classes, in a fixed order. Classes with no elements are left out.
    pub issues: Vec<IntegrityIssue>,
}

/// A room counts as unplaced when its `Area` is missing or not positive.
fn is_unplaced_room(element: &Element) -> bool {
    if !element.category.as_deref().is_some_and(|c| same_name(c, "Rooms")) {
        return false;
    }
    match element.parameter("Area").map(|p| &p.value) {
        Some(ParameterValue::Double(area)) => *area <= 0.0,
        Some(ParameterValue::Integer(area)) => *area <= 0,
        _ => true,
    }
}

/// Checks every element of the document and groups the findings by kind.
#[must_use]
pub fn check_integrity(graph: &dyn ElementGraph) -> IntegrityReport {
    let mut no_geometry = Vec::new();
    let mut no_category = Vec::new();
    let mut dangling_types = Vec::new();
    let mut dangling_hosts = Vec::new();
    let mut unplaced_rooms = Vec::new();

    for element in graph.elements() {
        for issue in element_issues(graph, element) {
            let bucket = match issue {
                ElementIssue::NoGeometry => &mut no_geometry,
                ElementIssue::MissingCategory => &mut no_category,
                ElementIssue::DanglingType(_) => &mut dangling_types,
                ElementIssue::DanglingHost(_) => &mut dangling_hosts,
            };
            bucket.push(element.id);
        }
        if is_unplaced_room(element) {
            unplaced_rooms.push(element.id);
        }
    }

    let issues: Vec<IntegrityIssue> = [
        ("Elements without geometry", Severity::Warning, no_geometry),
        ("Elements without category", Severity::Warning, no_category),
        ("Missing type references", Severity::Error, dangling_types),
        ("Missing host references", Severity::Error, dangling_hosts),
        ("Unplaced rooms", Severity::Error, unplaced_rooms),
    ]
    .into_iter()
    .filter(|(_, _, ids)| !ids.is_empty())
    .map(|(issue_type, severity, element_ids)| IntegrityIssue {
        issue_type,
        count: element_ids.len(),
        severity,
        element_ids,
    })
    .collect();

    debug!(issues = issues.len(), "Integrity check complete");
    IntegrityReport {
        checked_count: graph.element_count(),
        total_issues: issues.len(),
        is_healthy: issues.is_empty(),
        issues,
    }
}

/// Broad-phase intersections of one element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntersectionReport {
    /// The probe element.
    pub source_element_id: ElementId,
    /// Number of intersecting elements.
    pub intersecting_count: usize,
    /// Intersecting elements.
    pub intersecting_elements: Vec<ElementSummary>,
}

/// Elements whose bounds intersect the source element's bounds.
///
/// # Errors
///
/// Returns `NotFound` if the element does not exist and `Geometry` if it
/// has no bounds.
pub fn find_intersections(
    graph: &dyn ElementGraph,
    id: ElementId,
    target_category: Option<&str>,
) -> EngineResult<IntersectionReport> {
    let element = graph.element(id).ok_or_else(|| EngineError::element_not_found(id))?;
    let bounds = element
        .bounding_box()
        .ok_or_else(|| EngineError::geometry(format!("Element {id} has no bounding box")))?;
    let hits: Vec<ElementSummary> = graph
        .elements()
        .filter(|e| e.id != id && matches_category(e, target_category))
        .filter(|e| e.bounding_box().is_some_and(|b| b.intersects(&bounds)))
        .map(ElementSummary::from)
        .collect();
    Ok(IntersectionReport {
        source_element_id: id,
        intersecting_count: hits.len(),
        intersecting_elements: hits,
    })
}

/// Element count for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    /// Category name.
    pub category: String,
    /// Number of elements.
    pub count: usize,
}

/// Model size overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerformanceReport {
    /// Number of elements.
    pub total_elements: usize,
    /// Number of views.
    pub view_count: usize,
    /// Number of element types.
    pub type_count: usize,
    /// Whether worksets are enabled.
    pub is_workshared: bool,
    /// Largest categories, descending.
    pub top_categories: Vec<CategoryCount>,
}

/// Summarises model size.
#[must_use]
pub fn model_performance(graph: &dyn ElementGraph) -> PerformanceReport {
    let mut by_category: BTreeMap<&str, usize> = BTreeMap::new();
    for element in graph.elements() {
        *by_category.entry(element.category_name()).or_default() += 1;
    }
    let mut top: Vec<CategoryCount> = by_category
        .into_iter()
        .map(|(category, count)| CategoryCount {
            category: category.to_string(),
            count,
        })
        .collect();
    top.sort_by(|a, b| b.count.cmp(&a.count));
    top.truncate(TOP_N);

    PerformanceReport {
        total_elements: graph.element_count(),
        view_count: graph.view_count(),
        type_count: graph.element_types().count(),
        is_workshared: graph.is_workshared(),
        top_categories: top,
    }
}

/// One element changed by the last committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedElement {
    /// Element id.
    pub element_id: ElementId,
    /// Category, if the element still exists.
    pub category: Option<String>,
    /// Whether the element still exists (false after deletion).
    pub exists: bool,
}

/// Elements changed by the last committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    /// Number of changed ids.
    pub modified_count: usize,
    /// Changed ids.
    pub modified_elements: Vec<ChangedElement>,
}

/// Reports the last committed change set.
#[must_use]
pub fn document_changes(graph: &dyn ElementGraph) -> ChangeReport {
    let modified: Vec<ChangedElement> = graph
        .last_changes()
        .iter()
        .map(|&id| {
            let element = graph.element(id);
            ChangedElement {
                element_id: id,
                category: element.and_then(|e| e.category.clone()),
                exists: element.is_some(),
            }
        })
        .collect();
    ChangeReport {
        modified_count: modified.len(),
        modified_elements: modified,
    }
}

/// Undo stack status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoStatus {
    /// Whether anything can be undone.
    pub can_undo: bool,
    /// Name of the most recent record.
    pub undo_record_name: Option<String>,
    /// Commit time of the most recent record.
    pub committed_at: Option<String>,
    /// Number of records on the stack.
    pub depth: usize,
}

/// Reports the top of the undo stack.
#[must_use]
pub fn undo_status(graph: &dyn ElementGraph) -> UndoStatus {
    let records = graph.undo_records();
    let last = records.last();
    UndoStatus {
        can_undo: last.is_some(),
        undo_record_name: last.map(|r| r.name.clone()),
        committed_at: last.map(|r| r.committed_at.clone()),
        depth: records.len(),
    }
}

/// Rendered CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvExport {
    /// Number of data rows.
    pub row_count: usize,
    /// Header row.
    pub columns: Vec<String>,
    /// The CSV text, header included.
    pub csv: String,
}

/// Value written for parameters an element does not have.
pub const MISSING_VALUE: &str = "N/A";

/// Renders one row per existing element: id, category, type name, then the
/// requested parameters. Unknown ids are skipped.
///
/// # Errors
///
/// Returns `Export` if the CSV writer fails.
pub fn export_csv(
    graph: &dyn ElementGraph,
    ids: &[ElementId],
    parameter_names: &[String],
) -> EngineResult<CsvExport> {
    let columns: Vec<String> = ["ElementId", "Category", "Type"]
        .into_iter()
        .map(str::to_string)
        .chain(parameter_names.iter().cloned())
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&columns).map_err(EngineError::export)?;

    let mut rows = 0;
    for element in ids.iter().filter_map(|&id| graph.element(id)) {
        let type_name = element
            .type_id
            .and_then(|t| graph.element_type(t))
            .map_or(String::new(), |t| t.name.clone());
        let mut record = vec![
            element.id.to_string(),
            element.category.clone().unwrap_or_default(),
            type_name,
        ];
        record.extend(parameter_names.iter().map(|name| {
            element
                .parameter(name)
                .map_or_else(|| MISSING_VALUE.to_string(), |p| p.value.display_string())
        }));
        writer.write_record(&record).map_err(EngineError::export)?;
        rows += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| EngineError::export(e.into_error()))?;
    let csv = String::from_utf8(bytes).map_err(EngineError::export)?;
    Ok(CsvExport {
        row_count: rows,
        columns,
        csv,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, ElementType, Level};

    fn doc() -> Document {
        let mut doc = Document::new("analysis");
        doc.add_type(ElementType {
            id: ElementId(50),
            name: "Basic Wall: Generic 200mm".into(),
            category: Some("Walls".into()),
        });
        doc.add_level(Level {
            id: ElementId(70),
            name: "Level 1".into(),
            elevation: 0.0,
        });
        doc.add_element(
            Element::new(1)
                .with_category("Walls")
                .with_type(50)
                .on_level(70)
                .with_location(Point3::new(0.0, 0.0, 0.0))
                .with_parameter("Mark", ParameterValue::Text("W1".into())),
        );
        doc.add_element(
            Element::new(2)
                .with_category("Walls")
                .with_type(50)
                .on_level(70)
                .with_location(Point3::new(0.005, 0.0, 0.0)),
        );
        doc.add_element(Element::new(3).with_category("Doors").with_host(1));
        doc.add_element(Element::new(4).with_host(99).with_type(77));
        doc
    }

    #[test]
    fn duplicates_within_tolerance() {
        let doc = doc();
        let report = find_duplicates(&doc, None, 0.01);
        assert_eq!(report.duplicate_group_count, 1);
        assert_eq!(report.total_duplicates, 1);
        assert_eq!(
            report.duplicate_groups[0].element_ids,
            vec![ElementId(1), ElementId(2)]
        );
        assert_eq!(find_duplicates(&doc, None, 0.001).duplicate_group_count, 0);
        assert_eq!(find_duplicates(&doc, Some("Doors"), 0.01).duplicate_group_count, 0);
    }

    #[test]
    fn validation_issues() {
        let doc = doc();
        let report = validate(&doc, &[ElementId(1), ElementId(4), ElementId(5)]);
        assert_eq!(report.valid_count, 1);
        assert_eq!(report.invalid_count, 2);
        let issues = &report.results[1].issues;
        assert!(issues.contains(&"Missing category".to_string()));
        assert!(issues.contains(&"No geometry".to_string()));
        assert!(issues.contains(&"Type 77 not found".to_string()));
        assert!(issues.contains(&"Host 99 not found".to_string()));
        assert_eq!(report.results[2].issues, vec!["Element not found".to_string()]);
    }

    #[test]
    fn integrity_groups_findings_by_kind() {
        let mut doc = doc();
        doc.add_element(
            Element::new(5)
                .with_category("Rooms")
                .with_location(Point3::new(1.0, 1.0, 0.0))
                .with_parameter("Area", ParameterValue::Double(0.0)),
        );
        doc.add_element(
            Element::new(6)
                .with_category("rooms")
                .with_location(Point3::new(2.0, 1.0, 0.0))
                .with_parameter("Area", ParameterValue::Double(12.5)),
        );

        let report = check_integrity(&doc);
        assert_eq!(report.checked_count, 6);
        assert!(!report.is_healthy);
        let kinds: Vec<&str> = report.issues.iter().map(|i| i.issue_type).collect();
        assert_eq!(
            kinds,
            vec![
                "Elements without geometry",
                "Elements without category",
                "Missing type references",
                "Missing host references",
                "Unplaced rooms",
            ]
        );
        assert_eq!(report.total_issues, 5);
        assert_eq!(report.issues[0].element_ids, vec![ElementId(3), ElementId(4)]);
        assert_eq!(report.issues[0].severity, Severity::Warning);
        assert_eq!(report.issues[3].element_ids, vec![ElementId(4)]);
        assert_eq!(report.issues[4].element_ids, vec![ElementId(5)]);
        assert_eq!(report.issues[4].severity, Severity::Error);
    }

    #[test]
    fn empty_document_is_healthy() {
        let report = check_integrity(&Document::new("empty"));
        assert!(report.is_healthy);
        assert_eq!(report.total_issues, 0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn statistics_by_type_and_level() {
        let doc = doc();
        let stats = statistics(&doc, Some("walls"));
        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.unique_types, 1);
        assert_eq!(stats.top_types[0].type_name.as_deref(), Some("Basic Wall: Generic 200mm"));
        assert_eq!(stats.distribution_by_level[0].count, 2);
    }

    #[test]
    fn dependencies_include_hosted() {
        let doc = doc();
        let report = analyze_dependencies(&doc, ElementId(1)).unwrap();
        assert_eq!(report.dependent_count, 1);
        assert_eq!(report.dependents[0].id, ElementId(3));
        let hosted = analyze_dependencies(&doc, ElementId(3)).unwrap();
        assert_eq!(hosted.host.map(|h| h.id), Some(ElementId(1)));
    }

    #[test]
    fn type_lookup_is_substring() {
        let doc = doc();
        let found = elements_of_type(&doc, "generic", None);
        assert_eq!(found.len(), 2);
        assert!(elements_of_type(&doc, "generic", Some("Doors")).is_empty());
    }

    #[test]
    fn similar_excludes_reference() {
        let doc = doc();
        let (source, similar) = similar_elements(&doc, ElementId(1)).unwrap();
        assert_eq!(source.id, ElementId(1));
        assert_eq!(similar.iter().map(|e| e.id).collect::<Vec<_>>(), vec![ElementId(2)]);
    }

    #[test]
    fn csv_marks_missing_parameters() {
        let doc = doc();
        let export = export_csv(
            &doc,
            &[ElementId(1), ElementId(2), ElementId(42)],
            &["Mark".to_string()],
        )
        .unwrap();
        assert_eq!(export.row_count, 2);
        let lines: Vec<&str> = export.csv.lines().collect();
        assert_eq!(lines[0], "ElementId,Category,Type,Mark");
        assert_eq!(lines[1], "1,Walls,Basic Wall: Generic 200mm,W1");
        assert_eq!(lines[2], "2,Walls,Basic Wall: Generic 200mm,N/A");
    }

    #[test]
    fn intersections_need_bounds() {
        let doc = doc();
        let report = find_intersections(&doc, ElementId(1), None).unwrap();
        assert_eq!(report.intersecting_count, 0);
        assert!(matches!(
            find_intersections(&doc, ElementId(3), None),
            Err(EngineError::Geometry { .. })
        ));
    }
}
