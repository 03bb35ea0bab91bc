//! Relational predicate evaluation.
//!
//! Named references (level, workset, view, element, link) are resolved once
//! per call. An unresolved reference is an error rather than an empty result.

use tracing::debug;

use crate::model::{same_name, ElementGraph, ElementId, Level, View, Workset, WorksetId};

use super::error::{EngineError, EngineResult};
use super::ResultSet;

/// Resolves a level by case-insensitive name.
///
/// # Errors
///
/// Returns `NotFound` if no level has that name.
pub fn resolve_level<'g>(graph: &'g dyn ElementGraph, name: &str) -> EngineResult<&'g Level> {
    graph
        .levels()
        .iter()
        .find(|l| same_name(&l.name, name))
        .ok_or_else(|| EngineError::not_found("Level", name))
}

/// Resolves a workset by case-insensitive name.
///
/// # Errors
///
/// Returns `NotFound` if the document is not workshared or no workset has
/// that name.
pub fn resolve_workset<'g>(graph: &'g dyn ElementGraph, name: &str) -> EngineResult<&'g Workset> {
    if !graph.is_workshared() {
        return Err(EngineError::not_found("Workset", name));
    }
    graph
        .worksets()
        .iter()
        .find(|w| same_name(&w.name, name))
        .ok_or_else(|| EngineError::not_found("Workset", name))
}

/// Resolves a view by id.
///
/// # Errors
///
/// Returns `NotFound` if the view does not exist.
pub fn resolve_view(graph: &dyn ElementGraph, id: ElementId) -> EngineResult<&View> {
    graph
        .view(id)
        .ok_or_else(|| EngineError::not_found("View", id.to_string()))
}

/// Elements on the named level.
///
/// # Errors
///
/// Returns `NotFound` if the level does not resolve.
pub fn on_level(graph: &dyn ElementGraph, name: &str) -> EngineResult<ResultSet> {
    let level = resolve_level(graph, name)?;
    Ok(members_of_level(graph, level.id))
}

/// Elements on an already resolved level.
#[must_use]
pub fn members_of_level(graph: &dyn ElementGraph, level: ElementId) -> ResultSet {
    graph
        .elements()
        .filter(|e| e.level == Some(level))
        .map(|e| e.id)
        .collect()
}

/// Elements in the named workset.
///
/// # Errors
///
/// Returns `NotFound` if the workset does not resolve.
pub fn in_workset(graph: &dyn ElementGraph, name: &str) -> EngineResult<ResultSet> {
    let workset = resolve_workset(graph, name)?;
    Ok(members_of_workset(graph, workset.id))
}

/// Elements in an already resolved workset.
#[must_use]
pub fn members_of_workset(graph: &dyn ElementGraph, workset: WorksetId) -> ResultSet {
    graph
        .elements()
        .filter(|e| e.workset == Some(workset))
        .map(|e| e.id)
        .collect()
}

/// Elements visible in a view. While a view has isolation active only the
/// isolated elements are visible.
///
/// # Errors
///
/// Returns `NotFound` if the view does not exist.
pub fn in_view(graph: &dyn ElementGraph, id: ElementId) -> EngineResult<ResultSet> {
    let view = resolve_view(graph, id)?;
    Ok(graph
        .elements()
        .filter(|e| e.views.contains(&id))
        .filter(|e| view.isolated.as_ref().map_or(true, |iso| iso.contains(&e.id)))
        .map(|e| e.id)
        .collect())
}

/// Elements of a category, case-insensitive. Never fails.
#[must_use]
pub fn of_category(graph: &dyn ElementGraph, name: &str) -> ResultSet {
    graph
        .elements()
        .filter(|e| {
            e.category
                .as_deref()
                .is_some_and(|c| same_name(c, name))
        })
        .map(|e| e.id)
        .collect()
}

/// One-hop dependents as reported by the graph.
///
/// # Errors
///
/// Returns `NotFound` if the element does not exist.
pub fn dependents_of(graph: &dyn ElementGraph, id: ElementId) -> EngineResult<ResultSet> {
    graph
        .dependents(id)
        .ok_or_else(|| EngineError::element_not_found(id))
}

/// Elements whose host is `host`.
///
/// This is a linear scan over every element in the document.
///
/// # Errors
///
/// Returns `NotFound` if the host element does not exist.
pub fn hosted_on(graph: &dyn ElementGraph, host: ElementId) -> EngineResult<ResultSet> {
    if graph.element(host).is_none() {
        return Err(EngineError::element_not_found(host));
    }
    let result: ResultSet = graph
        .elements()
        .filter(|e| e.host == Some(host))
        .map(|e| e.id)
        .collect();
    debug!(%host, matched = result.len(), "Hosted scan complete");
    Ok(result)
}

/// Elements of the document behind a link instance.
///
/// # Errors
///
/// Returns `NotFound` if the link instance does not exist and `NotLoaded`
/// if its document is not resident.
pub fn linked_in(graph: &dyn ElementGraph, link: ElementId) -> EngineResult<ResultSet> {
    let link_ref = graph
        .link(link)
        .ok_or_else(|| EngineError::not_found("Link instance", link.to_string()))?;
    let document = link_ref.document.ok_or_else(|| EngineError::NotLoaded {
        link_id: link,
        title: link_ref.title.to_string(),
    })?;
    Ok(document.elements().map(|e| e.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Element};

    fn doc() -> Document {
        let mut doc = Document::new("relational");
        doc.add_level(Level {
            id: ElementId(100),
            name: "Level 1".into(),
            elevation: 0.0,
        });
        doc.add_view(View {
            id: ElementId(200),
            name: "Plan".into(),
            isolated: None,
        });
        doc.add_element(Element::new(1).with_category("Walls").on_level(100).visible_in(200));
        doc.add_element(Element::new(2).with_category("Doors").with_host(1).visible_in(200));
        doc.add_element(Element::new(3).with_category("walls"));
        doc
    }

    #[test]
    fn level_resolves_case_insensitively() {
        let doc = doc();
        assert_eq!(on_level(&doc, "LEVEL 1").unwrap().len(), 1);
        assert!(matches!(
            on_level(&doc, "Level 9"),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn members_of_resolved_level() {
        let doc = doc();
        let level = resolve_level(&doc, "level 1").unwrap();
        assert_eq!(members_of_level(&doc, level.id), on_level(&doc, "Level 1").unwrap());
        assert!(members_of_level(&doc, ElementId(999)).is_empty());
    }

    #[test]
    fn names_fold_beyond_ascii() {
        let mut doc = doc();
        doc.add_level(Level {
            id: ElementId(101),
            name: "Étage 2".into(),
            elevation: 3.0,
        });
        doc.add_element(Element::new(4).with_category("Murs Porteurs").on_level(101));
        doc.add_workset(Workset {
            id: WorksetId(2),
            name: "Fassade Süd".into(),
        });

        assert_eq!(resolve_level(&doc, "ÉTAGE 2").unwrap().id, ElementId(101));
        assert_eq!(on_level(&doc, "étage 2").unwrap().len(), 1);
        assert_eq!(resolve_workset(&doc, "FASSADE SÜD").unwrap().id, WorksetId(2));
        assert_eq!(of_category(&doc, "MURS PORTEURS").len(), 1);
    }

    #[test]
    fn workset_on_non_workshared_document_is_not_found() {
        let mut doc = doc();
        assert!(matches!(
            in_workset(&doc, "Workset1"),
            Err(EngineError::NotFound { .. })
        ));
        doc.add_workset(Workset {
            id: WorksetId(1),
            name: "Workset1".into(),
        });
        assert!(in_workset(&doc, "workset1").unwrap().is_empty());
    }

    #[test]
    fn category_matches_case_insensitively() {
        let doc = doc();
        assert_eq!(of_category(&doc, "WALLS").len(), 2);
        assert!(of_category(&doc, "Roofs").is_empty());
    }

    #[test]
    fn view_honours_isolation() {
        let mut doc = doc();
        assert_eq!(in_view(&doc, ElementId(200)).unwrap().len(), 2);
        doc.add_view(View {
            id: ElementId(200),
            name: "Plan".into(),
            isolated: Some([ElementId(2)].into_iter().collect()),
        });
        let visible = in_view(&doc, ElementId(200)).unwrap();
        assert_eq!(visible.into_iter().collect::<Vec<_>>(), vec![ElementId(2)]);
    }

    #[test]
    fn hosted_scan() {
        let doc = doc();
        assert!(hosted_on(&doc, ElementId(1)).unwrap().contains(&ElementId(2)));
        assert!(hosted_on(&doc, ElementId(3)).unwrap().is_empty());
        assert!(hosted_on(&doc, ElementId(42)).is_err());
    }

    #[test]
    fn link_not_loaded() {
        let mut doc = doc();
        doc.add_link(ElementId(300), "Structure.rvt", None);
        let err = linked_in(&doc, ElementId(300)).unwrap_err();
        assert!(matches!(err, EngineError::NotLoaded { .. }));
        assert!(matches!(
            linked_in(&doc, ElementId(301)),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn link_loaded_returns_linked_ids() {
        let mut doc = doc();
        let mut linked = Document::new("Structure.rvt");
        linked.add_element(Element::new(9001));
        doc.add_link(ElementId(300), "Structure.rvt", Some(linked));
        let ids = linked_in(&doc, ElementId(300)).unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![ElementId(9001)]);
    }
}
