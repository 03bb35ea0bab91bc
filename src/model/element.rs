//! Element and organisational types of the building model.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::{BoundingBox, Point3, Solid};

/// Stable integer identifier of an element within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub i64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ElementId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of a workset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorksetId(pub i64);

/// Storage kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Signed integer storage.
    Integer,
    /// Floating point storage.
    Double,
    /// Text storage.
    Text,
    /// Reference to another element.
    ElementReference,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "Integer",
            Self::Double => "Double",
            Self::Text => "Text",
            Self::ElementReference => "ElementReference",
        };
        f.write_str(name)
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Double(f64),
    /// Text value.
    Text(String),
    /// Reference to another element.
    ElementReference(ElementId),
}

impl ParameterValue {
    /// Returns the storage kind of this value.
    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        match self {
            Self::Integer(_) => StorageKind::Integer,
            Self::Double(_) => StorageKind::Double,
            Self::Text(_) => StorageKind::Text,
            Self::ElementReference(_) => StorageKind::ElementReference,
        }
    }

    /// Renders the value the way it appears in reports and CSV exports.
    #[must_use]
    pub fn display_string(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::Double(d) => d.to_string(),
            Self::Text(s) => s.clone(),
            Self::ElementReference(id) => id.to_string(),
        }
    }
}

/// A named parameter on an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Current value. Its variant fixes the storage kind.
    #[serde(flatten)]
    pub value: ParameterValue,
    /// Whether writes are refused.
    #[serde(default)]
    pub read_only: bool,
}

impl Parameter {
    /// A writable parameter.
    #[must_use]
    pub const fn new(value: ParameterValue) -> Self {
        Self {
            value,
            read_only: false,
        }
    }

    /// A read-only parameter.
    #[must_use]
    pub const fn read_only(value: ParameterValue) -> Self {
        Self {
            value,
            read_only: true,
        }
    }
}

/// One addressable entity in the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Document-local id.
    pub id: ElementId,
    /// Stable unique id string.
    #[serde(default)]
    pub unique_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Category tag (e.g. "Walls").
    #[serde(default)]
    pub category: Option<String>,
    /// Element type id.
    #[serde(default)]
    pub type_id: Option<ElementId>,
    /// Parameters by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
    /// Solid geometry.
    #[serde(default)]
    pub solids: Vec<Solid>,
    /// Location point.
    #[serde(default)]
    pub location: Option<Point3>,
    /// Host element, for hosted instances such as doors in walls.
    #[serde(default)]
    pub host: Option<ElementId>,
    /// Associated level.
    #[serde(default)]
    pub level: Option<ElementId>,
    /// Associated workset.
    #[serde(default)]
    pub workset: Option<WorksetId>,
    /// Views this element is visible in.
    #[serde(default)]
    pub views: BTreeSet<ElementId>,
    /// Elements that depend on this one besides hosted instances.
    #[serde(default)]
    pub dependents: Vec<ElementId>,
}

impl Element {
    /// Creates a bare element with the given id.
    #[must_use]
    pub fn new(id: i64) -> Self {
        let id = ElementId(id);
        Self {
            id,
            unique_id: format!("element-{id}"),
            name: String::new(),
            category: None,
            type_id: None,
            parameters: BTreeMap::new(),
            solids: Vec::new(),
            location: None,
            host: None,
            level: None,
            workset: None,
            views: BTreeSet::new(),
            dependents: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the element type.
    #[must_use]
    pub fn with_type(mut self, type_id: i64) -> Self {
        self.type_id = Some(ElementId(type_id));
        self
    }

    /// Adds a writable parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.insert(name.into(), Parameter::new(value));
        self
    }

    /// Adds a read-only parameter.
    #[must_use]
    pub fn with_read_only_parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters
            .insert(name.into(), Parameter::read_only(value));
        self
    }

    /// Adds a solid.
    #[must_use]
    pub fn with_solid(mut self, solid: Solid) -> Self {
        self.solids.push(solid);
        self
    }

    /// Sets the location point.
    #[must_use]
    pub fn with_location(mut self, location: Point3) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets the host element.
    #[must_use]
    pub fn with_host(mut self, host: i64) -> Self {
        self.host = Some(ElementId(host));
        self
    }

    /// Sets the level.
    #[must_use]
    pub fn on_level(mut self, level: i64) -> Self {
        self.level = Some(ElementId(level));
        self
    }

    /// Sets the workset.
    #[must_use]
    pub fn in_workset(mut self, workset: i64) -> Self {
        self.workset = Some(WorksetId(workset));
        self
    }

    /// Marks the element visible in a view.
    #[must_use]
    pub fn visible_in(mut self, view: i64) -> Self {
        self.views.insert(ElementId(view));
        self
    }

    /// Adds an explicit dependent.
    #[must_use]
    pub fn with_dependent(mut self, dependent: i64) -> Self {
        self.dependents.push(ElementId(dependent));
        self
    }

    /// Looks up a parameter by exact name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    /// Geometric bounds: union of solid bounds, else the location point.
    #[must_use]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let solid_bounds = self
            .solids
            .iter()
            .map(Solid::bounds)
            .reduce(|acc, b| acc.union(&b));
        solid_bounds.or_else(|| self.location.map(BoundingBox::point))
    }

    /// The first solid with positive volume, if any.
    #[must_use]
    pub fn first_positive_solid(&self) -> Option<&Solid> {
        self.solids.iter().find(|s| s.volume() > 0.0)
    }

    /// Category name or `"Unknown"`.
    #[must_use]
    pub fn category_name(&self) -> &str {
        self.category.as_deref().unwrap_or("Unknown")
    }

    /// Element name or `"Unnamed"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unnamed"
        } else {
            &self.name
        }
    }
}

/// An element type (family symbol) that instances can be assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementType {
    /// Type id.
    pub id: ElementId,
    /// Type name.
    pub name: String,
    /// Category the type applies to.
    #[serde(default)]
    pub category: Option<String>,
}

/// A named level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Level id.
    pub id: ElementId,
    /// Level name.
    pub name: String,
    /// Elevation.
    #[serde(default)]
    pub elevation: f64,
}

/// A named user workset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workset {
    /// Workset id.
    pub id: WorksetId,
    /// Workset name.
    pub name: String,
}

/// A view of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// View id.
    pub id: ElementId,
    /// View name.
    pub name: String,
    /// Temporarily isolated elements, if isolation is active.
    #[serde(default)]
    pub isolated: Option<BTreeSet<ElementId>>,
}
