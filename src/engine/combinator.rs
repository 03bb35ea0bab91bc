//! Multi-criteria evaluation.
//!
//! Host and linked documents number their elements independently, so every
//! match carries the link instance it was found through. A linked element
//! never equals a host element, and an AND across the two is empty.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{Element, ElementGraph, ElementId};

use super::criteria::{CriteriaSet, Criterion, LogicOp};
use super::error::{EngineError, EngineResult};
use super::{parameter, relational, spatial, QueryOptions, ResultSet};

/// An element id qualified by the document it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopedId {
    /// Link instance the element was reached through, `None` for the host.
    pub link: Option<ElementId>,
    /// Element id within that document.
    pub id: ElementId,
}

impl ScopedId {
    /// An element of the host document.
    #[must_use]
    pub const fn host(id: ElementId) -> Self {
        Self { link: None, id }
    }

    /// An element of the document behind `link`.
    #[must_use]
    pub const fn linked(link: ElementId, id: ElementId) -> Self {
        Self {
            link: Some(link),
            id,
        }
    }

    /// Looks the element up in the document it belongs to.
    #[must_use]
    pub fn resolve<'g>(&self, graph: &'g dyn ElementGraph) -> Option<&'g Element> {
        match self.link {
            None => graph.element(self.id),
            Some(link) => graph.link(link)?.document?.element(self.id),
        }
    }
}

/// Matches of a criteria set, host elements first, then by link and id.
pub type ScopedSet = BTreeSet<ScopedId>;

/// Evaluates one criterion to its own result set.
///
/// # Errors
///
/// Propagates named-reference and geometry errors from the evaluators.
/// "No match" is never an error.
pub fn evaluate(
    graph: &dyn ElementGraph,
    criterion: &Criterion,
    options: &QueryOptions,
) -> EngineResult<ScopedSet> {
    let host = match criterion {
        Criterion::Parameter {
            name,
            operator,
            value,
        } => parameter::filter(graph, name, *operator, value),
        Criterion::Category { name } => relational::of_category(graph, name),
        Criterion::Level { name } => relational::on_level(graph, name)?,
        Criterion::Workset { name } => relational::in_workset(graph, name)?,
        Criterion::View { id } => relational::in_view(graph, *id)?,
        Criterion::BoundingBox { min, max } => spatial::in_bounding_box(graph, *min, *max),
        Criterion::PointProximity { point, tolerance } => spatial::near_point(
            graph,
            *point,
            tolerance.unwrap_or(options.point_tolerance),
        ),
        Criterion::SolidIntersection { reference } => spatial::intersecting_solid(graph, *reference)?,
        Criterion::DependentsOf { element } => relational::dependents_of(graph, *element)?,
        Criterion::HostedOn { host } => relational::hosted_on(graph, *host)?,
        Criterion::LinkedIn { link } => {
            let ids = relational::linked_in(graph, *link)?;
            return Ok(ids.into_iter().map(|id| ScopedId::linked(*link, id)).collect());
        }
        Criterion::Unrecognized(tag) => {
            debug!(criterion = %tag, "Unrecognized criterion matches nothing");
            ResultSet::new()
        }
    };
    Ok(host.into_iter().map(ScopedId::host).collect())
}

/// Evaluates every criterion and folds the results left to right.
///
/// # Errors
///
/// Fails on the first criterion that fails to evaluate.
pub fn evaluate_set(
    graph: &dyn ElementGraph,
    set: &CriteriaSet,
    options: &QueryOptions,
) -> EngineResult<ScopedSet> {
    let mut results = set
        .criteria()
        .iter()
        .map(|c| evaluate(graph, c, options));

    // CriteriaSet is never empty.
    let first = results.next().transpose()?.unwrap_or_default();
    let combined = results.try_fold(first, |acc, next| {
        let next = next?;
        Ok::<_, EngineError>(match set.logic() {
            LogicOp::And => acc.intersection(&next).copied().collect(),
            LogicOp::Or => acc.union(&next).copied().collect(),
        })
    })?;

    debug!(
        criteria = set.criteria().len(),
        logic = ?set.logic(),
        matched = combined.len(),
        "Criteria set evaluated"
    );
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::criteria::{CompareValue, ComparisonOperator};
    use crate::model::{Document, ParameterValue};

    fn walls() -> Document {
        let mut doc = Document::new("walls");
        for (id, h) in [(1, 8.0), (2, 10.0), (3, 10.0001), (4, 15.0)] {
            doc.add_element(
                Element::new(id)
                    .with_category("Walls")
                    .with_parameter("Height", ParameterValue::Double(h)),
            );
        }
        doc.add_element(
            Element::new(5)
                .with_category("Doors")
                .with_parameter("Height", ParameterValue::Double(20.0)),
        );
        doc
    }

    fn criteria() -> Vec<Criterion> {
        vec![
            Criterion::Category {
                name: "Walls".into(),
            },
            Criterion::Parameter {
                name: "Height".into(),
                operator: ComparisonOperator::Greater,
                value: CompareValue::Double(10.0),
            },
            Criterion::Unrecognized("phase".into()),
        ]
    }

    fn ids(set: &ScopedSet) -> Vec<i64> {
        set.iter().map(|m| m.id.0).collect()
    }

    #[test]
    fn and_is_intersection() {
        let doc = walls();
        let set = CriteriaSet::new(criteria()[..2].to_vec(), LogicOp::And).unwrap();
        let result = evaluate_set(&doc, &set, &QueryOptions::default()).unwrap();
        assert_eq!(ids(&result), vec![3, 4]);
    }

    #[test]
    fn unrecognized_contributes_empty_set() {
        let doc = walls();
        let and = CriteriaSet::new(criteria(), LogicOp::And).unwrap();
        assert!(evaluate_set(&doc, &and, &QueryOptions::default())
            .unwrap()
            .is_empty());
        let or = CriteriaSet::new(criteria(), LogicOp::Or).unwrap();
        assert_eq!(
            ids(&evaluate_set(&doc, &or, &QueryOptions::default()).unwrap()),
            vec![1, 2, 3, 4, 5]
        );
    }

    #[test]
    fn result_is_permutation_invariant() {
        let doc = walls();
        let base = criteria();
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for logic in [LogicOp::And, LogicOp::Or] {
            let expected = evaluate_set(
                &doc,
                &CriteriaSet::new(base.clone(), logic).unwrap(),
                &QueryOptions::default(),
            )
            .unwrap();
            for order in orders {
                let permuted = order.iter().map(|i| base[*i].clone()).collect();
                let set = CriteriaSet::new(permuted, logic).unwrap();
                let result = evaluate_set(&doc, &set, &QueryOptions::default()).unwrap();
                assert_eq!(result, expected, "{logic:?} {order:?}");
            }
        }
    }

    #[test]
    fn named_reference_error_aborts_fold() {
        let doc = walls();
        let set = CriteriaSet::new(
            vec![
                Criterion::Category {
                    name: "Walls".into(),
                },
                Criterion::Level {
                    name: "Roof".into(),
                },
            ],
            LogicOp::Or,
        )
        .unwrap();
        assert!(matches!(
            evaluate_set(&doc, &set, &QueryOptions::default()),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn point_tolerance_defaults_from_options() {
        let mut doc = walls();
        doc.add_element(Element::new(9).with_location(crate::model::Point3::new(0.5, 0.0, 0.0)));
        let criterion = Criterion::PointProximity {
            point: crate::model::Point3::default(),
            tolerance: None,
        };
        let narrow = QueryOptions::default();
        assert!(evaluate(&doc, &criterion, &narrow).unwrap().is_empty());
        let wide = QueryOptions {
            point_tolerance: 1.0,
            ..QueryOptions::default()
        };
        assert!(evaluate(&doc, &criterion, &wide)
            .unwrap()
            .contains(&ScopedId::host(ElementId(9))));
    }

    fn with_link() -> Document {
        let mut doc = walls();
        let mut site = Document::new("Site");
        site.add_element(Element::new(1).with_category("Topography"));
        site.add_element(Element::new(7).with_category("Walls"));
        doc.add_link(ElementId(400), "Site", Some(site));
        doc
    }

    fn linked_and_walls(logic: LogicOp) -> CriteriaSet {
        CriteriaSet::new(
            vec![
                Criterion::LinkedIn {
                    link: ElementId(400),
                },
                Criterion::Category {
                    name: "Walls".into(),
                },
            ],
            logic,
        )
        .unwrap()
    }

    #[test]
    fn linked_ids_never_meet_host_ids() {
        let doc = with_link();
        let and = evaluate_set(&doc, &linked_and_walls(LogicOp::And), &QueryOptions::default());
        assert!(and.unwrap().is_empty());

        let or = evaluate_set(&doc, &linked_and_walls(LogicOp::Or), &QueryOptions::default())
            .unwrap();
        assert_eq!(or.len(), 6);
        assert!(or.contains(&ScopedId::host(ElementId(1))));
        assert!(or.contains(&ScopedId::linked(ElementId(400), ElementId(1))));
        assert_eq!(or.iter().last(), Some(&ScopedId::linked(ElementId(400), ElementId(7))));
    }

    #[test]
    fn scoped_ids_resolve_in_their_own_document() {
        let doc = with_link();
        let linked = ScopedId::linked(ElementId(400), ElementId(1));
        assert_eq!(linked.resolve(&doc).unwrap().category_name(), "Topography");
        assert_eq!(ScopedId::host(ElementId(1)).resolve(&doc).unwrap().category_name(), "Walls");
        assert!(ScopedId::linked(ElementId(401), ElementId(1)).resolve(&doc).is_none());
    }
}
