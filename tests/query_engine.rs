//! Engine-level tests: predicate evaluation, criteria folding and batch
//! execution against hand-built documents.

use bim_bridge::engine::batch::{self, ELEMENT_NOT_FOUND};
use bim_bridge::engine::combinator::evaluate_set;
use bim_bridge::engine::{
    CompareValue, ComparisonOperator, CriteriaSet, Criterion, EngineError, LogicOp, QueryOptions,
    ScopedId, ScopedSet,
};
use bim_bridge::model::{Document, Element, ElementGraph, ElementId, ParameterValue, Point3, Solid};
use serde_json::json;

fn walls(heights: &[f64]) -> Document {
    let mut doc = Document::new("walls");
    for (i, h) in heights.iter().enumerate() {
        let id = i64::try_from(i).unwrap() + 1;
        doc.add_element(
            Element::new(id)
                .with_category("Walls")
                .with_parameter("Height", ParameterValue::Double(*h))
                .with_parameter("Mark", ParameterValue::Text(format!("W-{id}"))),
        );
    }
    doc
}

fn height(operator: ComparisonOperator, value: f64) -> Criterion {
    Criterion::Parameter {
        name: "Height".to_string(),
        operator,
        value: CompareValue::Double(value),
    }
}

fn run(doc: &Document, criteria: Vec<Criterion>, logic: LogicOp) -> Vec<i64> {
    let set = CriteriaSet::new(criteria, logic).unwrap();
    evaluate_set(doc, &set, &QueryOptions::default())
        .unwrap()
        .into_iter()
        .map(|m| m.id.0)
        .collect()
}

// =============================================================================
// Parameter predicates
// =============================================================================

#[test]
fn test_greater_than_excludes_equal_values() {
    let doc = walls(&[8.0, 10.0, 10.0001, 15.0]);
    let matched = run(&doc, vec![height(ComparisonOperator::Greater, 10.0)], LogicOp::And);
    assert_eq!(matched, vec![3, 4]);
}

#[test]
fn test_equality_tolerance() {
    let doc = walls(&[10.0]);
    assert_eq!(
        run(&doc, vec![height(ComparisonOperator::Equals, 10.000_05)], LogicOp::And),
        vec![1]
    );
    assert!(run(&doc, vec![height(ComparisonOperator::Equals, 10.0002)], LogicOp::And).is_empty());
}

// =============================================================================
// Combinator
// =============================================================================

#[test]
fn test_and_result_is_independent_of_order() {
    let doc = walls(&[8.0, 10.0, 12.0, 15.0]);
    let a = height(ComparisonOperator::GreaterEqual, 10.0);
    let b = height(ComparisonOperator::Less, 15.0);
    let c = Criterion::Category {
        name: "walls".to_string(),
    };

    let expected = vec![2, 3];
    for order in [
        vec![a.clone(), b.clone(), c.clone()],
        vec![c.clone(), a.clone(), b.clone()],
        vec![b.clone(), c.clone(), a.clone()],
    ] {
        assert_eq!(run(&doc, order, LogicOp::And), expected);
    }
}

#[test]
fn test_or_unions_results() {
    let doc = walls(&[8.0, 10.0, 12.0, 15.0]);
    let matched = run(
        &doc,
        vec![
            height(ComparisonOperator::Less, 9.0),
            height(ComparisonOperator::Greater, 14.0),
        ],
        LogicOp::Or,
    );
    assert_eq!(matched, vec![1, 4]);
}

#[test]
fn test_unknown_criterion_empties_and_but_not_or() {
    let doc = walls(&[8.0, 12.0]);
    let unknown = Criterion::from_json(&json!({"type": "phase", "name": "Existing"})).unwrap();
    let category = Criterion::Category {
        name: "Walls".to_string(),
    };

    assert!(run(&doc, vec![category.clone(), unknown.clone()], LogicOp::And).is_empty());
    assert_eq!(run(&doc, vec![category, unknown], LogicOp::Or), vec![1, 2]);
}

#[test]
fn test_empty_criteria_rejected() {
    for logic in [LogicOp::And, LogicOp::Or] {
        assert!(matches!(
            CriteriaSet::new(Vec::new(), logic),
            Err(EngineError::Validation { .. })
        ));
    }
}

#[test]
fn test_unresolved_level_is_not_found() {
    let doc = walls(&[8.0]);
    let set = CriteriaSet::new(
        vec![Criterion::Level {
            name: "Roof".to_string(),
        }],
        LogicOp::Or,
    )
    .unwrap();
    let err = evaluate_set(&doc, &set, &QueryOptions::default()).unwrap_err();
    assert!(err.to_string().starts_with("NotFoundError:"));
}

// =============================================================================
// Spatial
// =============================================================================

#[test]
fn test_solid_probe_requires_solid() {
    let mut doc = Document::new("spatial");
    doc.add_element(Element::new(1).with_location(Point3::new(0.0, 0.0, 0.0)));
    doc.add_element(Element::new(2).with_solid(Solid::Sphere {
        center: Point3::new(0.0, 0.0, 0.0),
        radius: 1.0,
    }));

    let set = CriteriaSet::new(
        vec![Criterion::SolidIntersection {
            reference: ElementId(1),
        }],
        LogicOp::And,
    )
    .unwrap();
    let err = evaluate_set(&doc, &set, &QueryOptions::default()).unwrap_err();
    assert!(matches!(err, EngineError::Geometry { .. }));
}

#[test]
fn test_point_tolerance_falls_back_to_options() {
    let mut doc = Document::new("spatial");
    doc.add_element(Element::new(1).with_location(Point3::new(1.0, 0.0, 0.0)));
    let probe = Criterion::PointProximity {
        point: Point3::new(0.0, 0.0, 0.0),
        tolerance: None,
    };
    let set = CriteriaSet::new(vec![probe], LogicOp::And).unwrap();

    let tight = evaluate_set(&doc, &set, &QueryOptions::default()).unwrap();
    assert!(tight.is_empty());

    let loose = QueryOptions {
        point_tolerance: 1.5,
        ..QueryOptions::default()
    };
    let matched: ScopedSet = evaluate_set(&doc, &set, &loose).unwrap();
    assert!(matched.contains(&ScopedId::host(ElementId(1))));
}

// =============================================================================
// Batch execution
// =============================================================================

#[test]
fn test_partial_failure_still_commits() {
    let mut doc = walls(&[8.0, 9.0]);
    let missing = ElementId(99);

    let ids = [ElementId(1), missing, ElementId(2)];
    let outcome = batch::set_parameters(&mut doc, &ids, "Mark", &json!("X")).unwrap();
    assert_eq!(outcome.requested_count, 3);
    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].element_id, missing);
    assert_eq!(outcome.failures[0].error, ELEMENT_NOT_FOUND);

    let mark = &doc.element(ElementId(2)).unwrap().parameter("Mark").unwrap().value;
    assert_eq!(mark, &ParameterValue::Text("X".to_string()));
    assert_eq!(doc.undo_records().len(), 1);
}

#[test]
fn test_delete_cascades_to_hosted_elements() {
    let mut doc = Document::new("hosts");
    doc.add_element(Element::new(5).with_category("Walls"));
    doc.add_element(Element::new(6).with_category("Doors").with_host(5));
    doc.add_element(Element::new(7).with_category("Walls"));

    let outcome = batch::delete_elements(&mut doc, &[ElementId(5)]).unwrap();
    assert!(outcome.affected_ids.contains(&ElementId(5)));
    assert!(outcome.affected_ids.contains(&ElementId(6)));
    assert_eq!(doc.element_count(), 1);
}

#[test]
fn test_failed_bulk_operation_leaves_document_untouched() {
    let mut doc = walls(&[8.0, 9.0]);
    let before = doc.clone();
    let err = batch::move_elements(
        &mut doc,
        &[ElementId(1), ElementId(42)],
        Point3::new(1.0, 0.0, 0.0),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Host(_)));
    assert_eq!(doc.element_count(), before.element_count());
    assert!(doc.undo_records().is_empty());
}
