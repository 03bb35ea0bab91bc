//! Parameter predicate evaluation.
//!
//! Legal operators depend on the parameter's storage kind:
//!
//! | Kind               | Operators                                    |
//! |--------------------|----------------------------------------------|
//! | `Integer`,`Double` | equals, not_equals, ordering                 |
//! | `Text`             | equals, not_equals, contains, starts/ends_with |
//! | `ElementReference` | equals, not_equals                           |
//!
//! Anything else evaluates to `false`.

use tracing::debug;

use crate::model::{fold_case, Element, ElementGraph, ParameterValue};

use super::criteria::{CompareValue, ComparisonOperator};
use super::ResultSet;

/// Absolute tolerance for double equality.
pub const EPSILON: f64 = 1e-4;

/// Tests one element against one parameter comparison.
///
/// A missing parameter, an operator that is not legal for the storage kind,
/// or a comparison value whose type does not fit the storage kind all yield
/// `false`.
#[must_use]
pub fn matches(
    element: &Element,
    name: &str,
    operator: ComparisonOperator,
    value: &CompareValue,
) -> bool {
    let Some(param) = element.parameter(name) else {
        return false;
    };
    match &param.value {
        ParameterValue::Integer(actual) => value
            .as_integer()
            .is_some_and(|expected| compare_ordered(*actual, expected, operator)),
        ParameterValue::Double(actual) => value
            .as_double()
            .is_some_and(|expected| compare_double(*actual, expected, operator)),
        ParameterValue::Text(actual) => value
            .as_text()
            .is_some_and(|expected| compare_text(actual, expected, operator)),
        ParameterValue::ElementReference(actual) => value
            .as_integer()
            .is_some_and(|expected| compare_reference(actual.0, expected, operator)),
    }
}

/// Ids of all elements matching the comparison.
#[must_use]
pub fn filter(
    graph: &dyn ElementGraph,
    name: &str,
    operator: ComparisonOperator,
    value: &CompareValue,
) -> ResultSet {
    let result: ResultSet = graph
        .elements()
        .filter(|e| matches(e, name, operator, value))
        .map(|e| e.id)
        .collect();
    debug!(parameter = name, %operator, matched = result.len(), "Parameter filter evaluated");
    result
}

fn compare_ordered(actual: i64, expected: i64, operator: ComparisonOperator) -> bool {
    match operator {
        ComparisonOperator::Equals => actual == expected,
        ComparisonOperator::NotEquals => actual != expected,
        ComparisonOperator::Greater => actual > expected,
        ComparisonOperator::Less => actual < expected,
        ComparisonOperator::GreaterEqual => actual >= expected,
        ComparisonOperator::LessEqual => actual <= expected,
        _ => false,
    }
}

fn compare_double(actual: f64, expected: f64, operator: ComparisonOperator) -> bool {
    let equal = (actual - expected).abs() < EPSILON;
    match operator {
        ComparisonOperator::Equals => equal,
        ComparisonOperator::NotEquals => !equal,
        ComparisonOperator::Greater => actual > expected,
        ComparisonOperator::Less => actual < expected,
        ComparisonOperator::GreaterEqual => actual >= expected,
        ComparisonOperator::LessEqual => actual <= expected,
        _ => false,
    }
}

fn compare_text(actual: &str, expected: &str, operator: ComparisonOperator) -> bool {
    let actual = fold_case(actual);
    let expected = fold_case(expected);
    match operator {
        ComparisonOperator::Equals => actual == expected,
        ComparisonOperator::NotEquals => actual != expected,
        ComparisonOperator::Contains => actual.contains(&expected),
        ComparisonOperator::StartsWith => actual.starts_with(&expected),
        ComparisonOperator::EndsWith => actual.ends_with(&expected),
        _ => false,
    }
}

fn compare_reference(actual: i64, expected: i64, operator: ComparisonOperator) -> bool {
    match operator {
        ComparisonOperator::Equals => actual == expected,
        ComparisonOperator::NotEquals => actual != expected,
        _ => false,
    }
}
