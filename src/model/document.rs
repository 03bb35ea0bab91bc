//! In-memory building-model document.
//!
//! A `Document` is loaded from a JSON snapshot (or built in code) and then
//! mutated only through [`GraphMut`]. It mimics host behaviour closely enough
//! for the engine to be exercised end to end.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::element::{Element, ElementId, ElementType, Level, ParameterValue, View, Workset};
use super::error::{ModelError, ModelResult};
use super::geometry::{Axis, Plane, Point3};
use super::{ElementGraph, GraphMut, LinkRef};

/// One committed transaction on the undo stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoRecord {
    /// Transaction name.
    pub name: String,
    /// Commit time (RFC 3339).
    pub committed_at: String,
    /// Elements the transaction changed.
    pub changed: Vec<ElementId>,
}

#[derive(Debug, Clone)]
struct Link {
    title: String,
    document: Option<Box<Document>>,
}

/// Saved mutable state of a [`Document`].
#[derive(Debug, Clone)]
pub struct DocumentCheckpoint {
    elements: BTreeMap<ElementId, Element>,
    views: BTreeMap<ElementId, View>,
    next_id: i64,
    pending: BTreeSet<ElementId>,
    last_changes: BTreeSet<ElementId>,
    undo_len: usize,
}

/// An in-memory document.
#[derive(Debug, Clone)]
pub struct Document {
    title: String,
    elements: BTreeMap<ElementId, Element>,
    types: BTreeMap<ElementId, ElementType>,
    levels: Vec<Level>,
    worksets: Vec<Workset>,
    views: BTreeMap<ElementId, View>,
    links: BTreeMap<ElementId, Link>,
    next_id: i64,
    pending: BTreeSet<ElementId>,
    last_changes: BTreeSet<ElementId>,
    undo: Vec<UndoRecord>,
}

/// JSON snapshot layout.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Snapshot {
    #[serde(default)]
    title: String,
    #[serde(default)]
    elements: Vec<Element>,
    #[serde(default)]
    types: Vec<ElementType>,
    #[serde(default)]
    levels: Vec<Level>,
    #[serde(default)]
    worksets: Vec<Workset>,
    #[serde(default)]
    views: Vec<View>,
    #[serde(default)]
    links: Vec<LinkSnapshot>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinkSnapshot {
    id: ElementId,
    title: String,
    #[serde(default)]
    document: Option<Box<Snapshot>>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            elements: BTreeMap::new(),
            types: BTreeMap::new(),
            levels: Vec::new(),
            worksets: Vec::new(),
            views: BTreeMap::new(),
            links: BTreeMap::new(),
            next_id: 1,
            pending: BTreeSet::new(),
            last_changes: BTreeSet::new(),
            undo: Vec::new(),
        }
    }

    /// Reads a JSON snapshot from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn open(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| ModelError::file_read(path, e))?;
        Self::from_json(&contents)
    }

    /// Parses a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or contains duplicate ids.
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(json).map_err(|e| ModelError::Parse {
            message: e.to_string(),
            source: e,
        })?;
        Self::from_snapshot(snapshot)
    }

    fn from_snapshot(snapshot: Snapshot) -> ModelResult<Self> {
        let mut doc = Self::new(snapshot.title);
        for element in snapshot.elements {
            doc.insert_element(element)?;
        }
        for ty in snapshot.types {
            doc.add_type(ty);
        }
        for level in snapshot.levels {
            doc.add_level(level);
        }
        for workset in snapshot.worksets {
            doc.add_workset(workset);
        }
        for view in snapshot.views {
            doc.add_view(view);
        }
        for link in snapshot.links {
            let linked = link.document.map(|s| Self::from_snapshot(*s)).transpose()?;
            doc.add_link(link.id, link.title, linked);
        }
        Ok(doc)
    }

    /// Snapshot elements without a unique id get `element-{id}`.
    fn insert_element(&mut self, mut element: Element) -> ModelResult<()> {
        if self.elements.contains_key(&element.id) {
            return Err(ModelError::invalid_model(format!(
                "duplicate element id {}",
                element.id
            )));
        }
        if element.unique_id.trim().is_empty() {
            element.unique_id = format!("element-{}", element.id);
        }
        self.bump_next_id(element.id);
        self.elements.insert(element.id, element);
        Ok(())
    }

    fn bump_next_id(&mut self, id: ElementId) {
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
    }

    /// Adds an element, replacing any element with the same id.
    pub fn add_element(&mut self, element: Element) {
        self.bump_next_id(element.id);
        self.elements.insert(element.id, element);
    }

    /// Adds an element type.
    pub fn add_type(&mut self, ty: ElementType) {
        self.bump_next_id(ty.id);
        self.types.insert(ty.id, ty);
    }

    /// Adds a level.
    pub fn add_level(&mut self, level: Level) {
        self.bump_next_id(level.id);
        self.levels.push(level);
    }

    /// Adds a user workset.
    pub fn add_workset(&mut self, workset: Workset) {
        self.worksets.push(workset);
    }

    /// Adds a view.
    pub fn add_view(&mut self, view: View) {
        self.bump_next_id(view.id);
        self.views.insert(view.id, view);
    }

    /// Adds a link instance. `document` is `None` for an unloaded link.
    pub fn add_link(&mut self, id: ElementId, title: impl Into<String>, document: Option<Self>) {
        self.bump_next_id(id);
        self.links.insert(
            id,
            Link {
                title: title.into(),
                document: document.map(Box::new),
            },
        );
    }

    fn require_all(&self, ids: &[ElementId]) -> ModelResult<()> {
        match ids.iter().find(|id| !self.elements.contains_key(id)) {
            Some(id) => Err(ModelError::ElementNotFound { id: *id }),
            None => Ok(()),
        }
    }

    fn allocate_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Maps every requested element through `f` without touching the document.
    fn transformed(
        &self,
        ids: &[ElementId],
        f: impl Fn(Point3) -> Point3,
        what: &str,
    ) -> ModelResult<Vec<Element>> {
        self.require_all(ids)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let mut element = self.elements[id].clone();
            element.location = element.location.map(&f);
            element.solids = element
                .solids
                .iter()
                .map(|solid| {
                    solid.map_points(&f).ok_or_else(|| {
                        ModelError::transform_rejected(
                            *id,
                            format!("box solids only support axis-aligned {what}"),
                        )
                    })
                })
                .collect::<ModelResult<Vec<_>>>()?;
            out.push(element);
        }
        Ok(out)
    }

    fn insert_copies(&mut self, originals: Vec<Element>) -> Vec<ElementId> {
        let mut created = Vec::with_capacity(originals.len());
        for mut element in originals {
            let id = self.allocate_id();
            element.id = id;
            element.unique_id = uuid::Uuid::new_v4().to_string();
            element.dependents.clear();
            self.pending.insert(id);
            self.elements.insert(id, element);
            created.push(id);
        }
        created
    }

    fn replace_all(&mut self, elements: Vec<Element>) {
        for element in elements {
            self.pending.insert(element.id);
            self.elements.insert(element.id, element);
        }
    }
}

impl ElementGraph for Document {
    fn title(&self) -> &str {
        &self.title
    }

    fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    fn elements(&self) -> Box<dyn Iterator<Item = &Element> + '_> {
        Box::new(self.elements.values())
    }

    fn element_type(&self, id: ElementId) -> Option<&ElementType> {
        self.types.get(&id)
    }

    fn element_types(&self) -> Box<dyn Iterator<Item = &ElementType> + '_> {
        Box::new(self.types.values())
    }

    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn worksets(&self) -> &[Workset] {
        &self.worksets
    }

    fn view(&self, id: ElementId) -> Option<&View> {
        self.views.get(&id)
    }

    fn view_count(&self) -> usize {
        self.views.len()
    }

    fn link(&self, id: ElementId) -> Option<LinkRef<'_>> {
        self.links.get(&id).map(|link| LinkRef {
            id,
            title: &link.title,
            document: link.document.as_deref().map(|d| d as &dyn ElementGraph),
        })
    }

    fn undo_records(&self) -> &[UndoRecord] {
        &self.undo
    }

    fn last_changes(&self) -> &BTreeSet<ElementId> {
        &self.last_changes
    }

    fn element_count(&self) -> usize {
        self.elements.len()
    }
}

impl GraphMut for Document {
    type Checkpoint = DocumentCheckpoint;

    fn checkpoint(&self) -> DocumentCheckpoint {
        DocumentCheckpoint {
            elements: self.elements.clone(),
            views: self.views.clone(),
            next_id: self.next_id,
            pending: self.pending.clone(),
            last_changes: self.last_changes.clone(),
            undo_len: self.undo.len(),
        }
    }

    fn restore(&mut self, checkpoint: DocumentCheckpoint) {
        self.elements = checkpoint.elements;
        self.views = checkpoint.views;
        self.next_id = checkpoint.next_id;
        self.pending = checkpoint.pending;
        self.last_changes = checkpoint.last_changes;
        self.undo.truncate(checkpoint.undo_len);
    }

    fn commit_changes(&mut self, transaction_name: &str) {
        if self.pending.is_empty() {
            return;
        }
        let changed = std::mem::take(&mut self.pending);
        self.undo.push(UndoRecord {
            name: transaction_name.to_string(),
            committed_at: chrono::Local::now().to_rfc3339(),
            changed: changed.iter().copied().collect(),
        });
        self.last_changes = changed;
    }

    fn set_parameter(
        &mut self,
        id: ElementId,
        name: &str,
        value: ParameterValue,
    ) -> ModelResult<()> {
        let element = self
            .elements
            .get_mut(&id)
            .ok_or(ModelError::ElementNotFound { id })?;
        let param = element
            .parameters
            .get_mut(name)
            .filter(|p| !p.read_only)
            .ok_or_else(|| ModelError::ParameterNotWritable {
                name: name.to_string(),
            })?;
        if param.value.kind() != value.kind() {
            return Err(ModelError::StorageMismatch {
                name: name.to_string(),
                expected: param.value.kind(),
            });
        }
        param.value = value;
        self.pending.insert(id);
        Ok(())
    }

    fn change_type(&mut self, id: ElementId, type_id: ElementId) -> ModelResult<()> {
        let ty = self
            .types
            .get(&type_id)
            .ok_or(ModelError::TypeNotFound { id: type_id })?;
        let element = self
            .elements
            .get_mut(&id)
            .ok_or(ModelError::ElementNotFound { id })?;
        if let (Some(type_cat), Some(el_cat)) = (&ty.category, &element.category) {
            if !super::same_name(type_cat, el_cat) {
                return Err(ModelError::IncompatibleType {
                    type_id,
                    category: el_cat.clone(),
                });
            }
        }
        element.type_id = Some(type_id);
        self.pending.insert(id);
        Ok(())
    }

    fn isolate_in_view(&mut self, view: ElementId, ids: &[ElementId]) -> ModelResult<()> {
        let target = self
            .views
            .get_mut(&view)
            .ok_or(ModelError::ViewNotFound { id: view })?;
        target.isolated = Some(ids.iter().copied().collect());
        self.pending.insert(view);
        Ok(())
    }

    fn move_elements(&mut self, ids: &[ElementId], translation: Point3) -> ModelResult<()> {
        let moved = self.transformed(ids, |p| p.add(translation), "translation")?;
        self.replace_all(moved);
        Ok(())
    }

    fn copy_elements(
        &mut self,
        ids: &[ElementId],
        translation: Point3,
    ) -> ModelResult<Vec<ElementId>> {
        let copies = self.transformed(ids, |p| p.add(translation), "translation")?;
        Ok(self.insert_copies(copies))
    }

    fn rotate_elements(&mut self, ids: &[ElementId], axis: Axis, angle: f64) -> ModelResult<()> {
        if axis.end.sub(axis.start).normalized().is_none() {
            return Err(ModelError::invalid_geometry("rotation axis has zero length"));
        }
        let rotated = self.transformed(ids, |p| axis.rotate(p, angle).unwrap_or(p), "rotation")?;
        self.replace_all(rotated);
        Ok(())
    }

    fn mirror_elements(
        &mut self,
        ids: &[ElementId],
        plane: Plane,
        copy: bool,
    ) -> ModelResult<Vec<ElementId>> {
        if plane.normal.normalized().is_none() {
            return Err(ModelError::invalid_geometry("mirror plane normal has zero length"));
        }
        let mirrored = self.transformed(ids, |p| plane.reflect(p).unwrap_or(p), "mirror")?;
        if copy {
            return Ok(self.insert_copies(mirrored));
        }
        self.replace_all(mirrored);
        Ok(ids.to_vec())
    }

    fn delete_elements(&mut self, ids: &[ElementId]) -> ModelResult<Vec<ElementId>> {
        self.require_all(ids)?;

        let mut deleted = BTreeSet::new();
        let mut queue: VecDeque<ElementId> = ids.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            if !deleted.insert(id) {
                continue;
            }
            if let Some(dependents) = self.dependents(id) {
                queue.extend(dependents.into_iter().filter(|d| !deleted.contains(d)));
            }
        }

        for id in &deleted {
            self.elements.remove(id);
            self.pending.insert(*id);
        }
        for element in self.elements.values_mut() {
            element.dependents.retain(|d| !deleted.contains(d));
        }
        for view in self.views.values_mut() {
            if let Some(isolated) = view.isolated.as_mut() {
                isolated.retain(|d| !deleted.contains(d));
            }
        }

        Ok(deleted.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::Parameter;
    use crate::model::geometry::Solid;

    fn wall_with_door() -> Document {
        let mut doc = Document::new("Test");
        doc.add_element(
            Element::new(5)
                .with_category("Walls")
                .with_parameter("Height", ParameterValue::Double(10.0)),
        );
        doc.add_element(Element::new(6).with_category("Doors").with_host(5));
        doc.add_element(Element::new(7).with_category("Tags").with_dependent(8));
        doc.add_element(Element::new(8).with_category("Dimensions"));
        doc
    }

    #[test]
    fn snapshot_fills_missing_unique_ids() {
        let doc = Document::from_json(
            r#"{ "elements": [
                { "id": 1, "unique_id": "abc-1" },
                { "id": 2 },
                { "id": 3, "unique_id": "" }
            ] }"#,
        )
        .unwrap();
        assert_eq!(doc.element(ElementId(2)).unwrap().unique_id, "element-2");
        assert_eq!(doc.element(ElementId(3)).unwrap().unique_id, "element-3");
        assert!(doc.element_by_unique_id("").is_none());
        assert_eq!(doc.element_by_unique_id("element-2").unwrap().id, ElementId(2));
    }

    #[test]
    fn delete_cascades_to_hosted() {
        let mut doc = wall_with_door();
        let deleted = doc.delete_elements(&[ElementId(5)]).unwrap();
        assert_eq!(deleted, vec![ElementId(5), ElementId(6)]);
        assert!(doc.element(ElementId(6)).is_none());
        assert!(doc.element(ElementId(7)).is_some());
    }

    #[test]
    fn delete_missing_changes_nothing() {
        let mut doc = wall_with_door();
        let err = doc.delete_elements(&[ElementId(5), ElementId(99)]).unwrap_err();
        assert!(matches!(err, ModelError::ElementNotFound { id } if id == ElementId(99)));
        assert!(doc.element(ElementId(5)).is_some());
    }

    #[test]
    fn delete_explicit_dependents() {
        let mut doc = wall_with_door();
        let deleted = doc.delete_elements(&[ElementId(7)]).unwrap();
        assert_eq!(deleted, vec![ElementId(7), ElementId(8)]);
    }

    #[test]
    fn set_parameter_checks_storage_kind() {
        let mut doc = wall_with_door();
        let err = doc
            .set_parameter(ElementId(5), "Height", ParameterValue::Text("tall".into()))
            .unwrap_err();
        assert!(matches!(err, ModelError::StorageMismatch { .. }));
        doc.set_parameter(ElementId(5), "Height", ParameterValue::Double(12.0))
            .unwrap();
        assert_eq!(
            doc.element(ElementId(5)).unwrap().parameter("Height"),
            Some(&Parameter::new(ParameterValue::Double(12.0)))
        );
    }

    #[test]
    fn restore_discards_changes() {
        let mut doc = wall_with_door();
        let cp = doc.checkpoint();
        doc.delete_elements(&[ElementId(5)]).unwrap();
        doc.restore(cp);
        assert!(doc.element(ElementId(6)).is_some());
        doc.commit_changes("noop");
        assert!(doc.undo_records().is_empty());
    }

    #[test]
    fn copies_get_fresh_ids() {
        let mut doc = wall_with_door();
        let created = doc
            .copy_elements(&[ElementId(5)], Point3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(created, vec![ElementId(9)]);
        let copy = doc.element(ElementId(9)).unwrap();
        assert_ne!(copy.unique_id, doc.element(ElementId(5)).unwrap().unique_id);
        doc.commit_changes("Copy");
        assert_eq!(doc.undo_records().len(), 1);
        assert!(doc.last_changes().contains(&ElementId(9)));
    }

    #[test]
    fn oblique_rotation_is_all_or_nothing() {
        let mut doc = Document::new("Rot");
        doc.add_element(Element::new(1).with_location(Point3::new(1.0, 0.0, 0.0)));
        doc.add_element(Element::new(2).with_solid(Solid::Box {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
        }));
        let axis = Axis {
            start: Point3::default(),
            end: Point3::new(0.0, 0.0, 1.0),
        };
        let err = doc
            .rotate_elements(&[ElementId(1), ElementId(2)], axis, 0.5)
            .unwrap_err();
        assert!(matches!(err, ModelError::TransformRejected { .. }));
        assert_eq!(
            doc.element(ElementId(1)).unwrap().location,
            Some(Point3::new(1.0, 0.0, 0.0))
        );
    }

    #[test]
    fn parse_snapshot_with_unloaded_link() {
        let json = r#"{
            "title": "Main",
            "elements": [
                {"id": 1, "category": "Walls",
                 "parameters": {"Height": {"kind": "double", "value": 3.0}}}
            ],
            "links": [
                {"id": 50, "title": "Structure", "document": {"elements": [{"id": 1}]}},
                {"id": 51, "title": "MEP"}
            ]
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.title(), "Main");
        assert!(doc.link(ElementId(50)).unwrap().document.is_some());
        assert!(doc.link(ElementId(51)).unwrap().document.is_none());
        assert_eq!(doc.allocate_id_preview(), 52);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let json = r#"{"elements": [{"id": 1}, {"id": 1}]}"#;
        assert!(matches!(
            Document::from_json(json),
            Err(ModelError::InvalidModel { .. })
        ));
    }

    impl Document {
        fn allocate_id_preview(&self) -> i64 {
            self.next_id
        }
    }
}
