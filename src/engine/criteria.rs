//! Typed filter criteria.
//!
//! Criteria arrive as loosely shaped JSON objects tagged by a `type` field.
//! They are parsed here, once, into [`Criterion`] so evaluators never touch
//! raw JSON. Unknown tags become [`Criterion::Unrecognized`]; a known tag
//! with missing or mistyped fields is a validation error.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{ElementId, Point3};

use super::error::{EngineError, EngineResult};

/// Comparison operator of a parameter criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    /// Equality (within tolerance for doubles).
    Equals,
    /// Negated equality.
    NotEquals,
    /// Strictly greater.
    Greater,
    /// Strictly less.
    Less,
    /// Greater or equal.
    GreaterEqual,
    /// Less or equal.
    LessEqual,
    /// Substring match.
    Contains,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
}

impl ComparisonOperator {
    const ALL: [Self; 9] = [
        Self::Equals,
        Self::NotEquals,
        Self::Greater,
        Self::Less,
        Self::GreaterEqual,
        Self::LessEqual,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
    ];

    /// Wire name of the operator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Greater => "greater",
            Self::Less => "less",
            Self::GreaterEqual => "greater_equal",
            Self::LessEqual => "less_equal",
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
        }
    }

    /// Parses a wire name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown operator names.
    pub fn parse(name: &str) -> EngineResult<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == name)
            .ok_or_else(|| EngineError::validation(format!("unknown operator '{name}'")))
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a parameter comparison, as the caller sent it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CompareValue {
    /// A JSON integer.
    Integer(i64),
    /// A JSON number with a fractional part (or outside `i64`).
    Double(f64),
    /// A JSON string.
    Text(String),
}

impl CompareValue {
    /// Integer view. Integral doubles qualify.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            Self::Integer(i) => Some(i),
            Self::Double(d) if d.fract() == 0.0 && d.abs() < 9.0e15 => Some(d as i64),
            _ => None,
        }
    }

    /// Floating point view. Integers qualify.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Self::Integer(i) => Some(i as f64),
            Self::Double(d) => Some(d),
            Self::Text(_) => None,
        }
    }

    /// Text view.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// How criteria results are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOp {
    /// Intersection of all results.
    #[default]
    #[serde(alias = "AND")]
    And,
    /// Union of all results.
    #[serde(alias = "OR")]
    Or,
}

/// One filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Compare a named parameter.
    Parameter {
        /// Parameter name.
        name: String,
        /// Comparison operator.
        operator: ComparisonOperator,
        /// Comparison value.
        value: CompareValue,
    },
    /// Category tag, case-insensitive.
    Category {
        /// Category name.
        name: String,
    },
    /// Level by name.
    Level {
        /// Level name.
        name: String,
    },
    /// Workset by name.
    Workset {
        /// Workset name.
        name: String,
    },
    /// Visible in a view.
    View {
        /// View id.
        id: ElementId,
    },
    /// Bounds intersect an axis-aligned box.
    BoundingBox {
        /// First corner.
        min: Point3,
        /// Opposite corner.
        max: Point3,
    },
    /// Bounds come within `tolerance` of a point.
    PointProximity {
        /// Probe point.
        point: Point3,
        /// Half-width of the probe cube. Falls back to the configured default.
        tolerance: Option<f64>,
    },
    /// Solid geometry intersects the reference element's solid.
    SolidIntersection {
        /// Reference element.
        reference: ElementId,
    },
    /// One-hop dependents of an element.
    DependentsOf {
        /// Source element.
        element: ElementId,
    },
    /// Elements hosted on an element.
    HostedOn {
        /// Host element.
        host: ElementId,
    },
    /// Elements of a linked document.
    LinkedIn {
        /// Link instance id.
        link: ElementId,
    },
    /// Unknown criterion type; matches nothing.
    Unrecognized(String),
}

#[derive(Deserialize)]
struct ParameterFields {
    #[serde(alias = "parameter_name")]
    name: String,
    operator: String,
    value: CompareValue,
}

#[derive(Deserialize)]
struct NameFields {
    #[serde(alias = "value", alias = "level_name", alias = "workset_name")]
    name: String,
}

#[derive(Deserialize)]
struct ViewFields {
    #[serde(alias = "view_id", alias = "value")]
    id: ElementId,
}

#[derive(Deserialize)]
struct BoxFields {
    #[serde(alias = "min_point")]
    min: Point3,
    #[serde(alias = "max_point")]
    max: Point3,
}

#[derive(Deserialize)]
struct PointFields {
    point: Point3,
    #[serde(default)]
    tolerance: Option<f64>,
}

#[derive(Deserialize)]
struct ElementFields {
    #[serde(
        alias = "element_id",
        alias = "reference_element_id",
        alias = "host_element_id"
    )]
    id: ElementId,
}

#[derive(Deserialize)]
struct LinkFields {
    #[serde(alias = "link_instance_id")]
    id: ElementId,
}

fn fields<T: DeserializeOwned>(kind: &str, raw: &Value) -> EngineResult<T> {
    T::deserialize(raw)
        .map_err(|e| EngineError::validation(format!("invalid '{kind}' criterion: {e}")))
}

impl Criterion {
    /// Parses one `{type, ...}` object.
    ///
    /// The type tag is matched case-insensitively, ignoring underscores, so
    /// `bounding_box`, `boundingBox` and `BoundingBox` are the same.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the object has no string `type`, if
    /// a known type has missing or mistyped fields, or if the operator of a
    /// parameter criterion is unknown.
    pub fn from_json(raw: &Value) -> EngineResult<Self> {
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::validation("criterion is missing a string 'type'"))?;
        let key: String = tag
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let criterion = match key.as_str() {
            "parameter" => {
                let f: ParameterFields = fields(tag, raw)?;
                Self::Parameter {
                    name: f.name,
                    operator: ComparisonOperator::parse(&f.operator)?,
                    value: f.value,
                }
            }
            "category" => Self::Category {
                name: fields::<NameFields>(tag, raw)?.name,
            },
            "level" => Self::Level {
                name: fields::<NameFields>(tag, raw)?.name,
            },
            "workset" => Self::Workset {
                name: fields::<NameFields>(tag, raw)?.name,
            },
            "view" => Self::View {
                id: fields::<ViewFields>(tag, raw)?.id,
            },
            "boundingbox" => {
                let f: BoxFields = fields(tag, raw)?;
                Self::BoundingBox {
                    min: f.min,
                    max: f.max,
                }
            }
            "pointproximity" | "point" => {
                let f: PointFields = fields(tag, raw)?;
                if f.tolerance.is_some_and(|t| t < 0.0) {
                    return Err(EngineError::validation(
                        "point tolerance must be a non-negative number",
                    ));
                }
                Self::PointProximity {
                    point: f.point,
                    tolerance: f.tolerance,
                }
            }
            "solidintersection" | "intersecting" => Self::SolidIntersection {
                reference: fields::<ElementFields>(tag, raw)?.id,
            },
            "dependentsof" | "dependents" => Self::DependentsOf {
                element: fields::<ElementFields>(tag, raw)?.id,
            },
            "hostedon" | "hosted" => Self::HostedOn {
                host: fields::<ElementFields>(tag, raw)?.id,
            },
            "linkedin" | "linked" => Self::LinkedIn {
                link: fields::<LinkFields>(tag, raw)?.id,
            },
            _ => Self::Unrecognized(tag.to_string()),
        };
        Ok(criterion)
    }
}

/// A flat list of criteria combined by one logic operator.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaSet {
    criteria: Vec<Criterion>,
    logic: LogicOp,
}

impl CriteriaSet {
    /// Creates a set.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `criteria` is empty.
    pub fn new(criteria: Vec<Criterion>, logic: LogicOp) -> EngineResult<Self> {
        if criteria.is_empty() {
            return Err(EngineError::validation("criteria list must not be empty"));
        }
        Ok(Self { criteria, logic })
    }

    /// Parses raw criteria objects.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the list is empty or any known
    /// criterion is malformed.
    pub fn from_json(raw: &[Value], logic: LogicOp) -> EngineResult<Self> {
        let criteria = raw
            .iter()
            .map(Criterion::from_json)
            .collect::<EngineResult<Vec<_>>>()?;
        Self::new(criteria, logic)
    }

    /// The criteria, in request order.
    #[must_use]
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// The logic operator.
    #[must_use]
    pub const fn logic(&self) -> LogicOp {
        self.logic
    }
}
