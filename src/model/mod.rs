//! The live building-model element graph.
//!
//! The query engine and batch executor never talk to a concrete host. They go
//! through two traits:
//!
//! - [`ElementGraph`]: read access to elements, types, levels, worksets, views
//!   and linked documents
//! - [`GraphMut`]: the mutations the batch executor may perform, plus the
//!   checkpoint/restore pair transactions are built on
//!
//! [`Document`] is the in-memory implementation used by the bridge binary and
//! the tests. It behaves like a host document: deleting an element cascades to
//! hosted and dependent elements, copies receive fresh ids, and committed
//! transactions leave undo records.

pub mod document;
pub mod element;
pub mod error;
pub mod geometry;

pub use document::{Document, DocumentCheckpoint, UndoRecord};
pub use element::{
    Element, ElementId, ElementType, Level, Parameter, ParameterValue, StorageKind, View, Workset,
    WorksetId,
};
pub use error::{ModelError, ModelResult};
pub use geometry::{Axis, BoundingBox, Plane, Point3, Solid};

use std::collections::BTreeSet;

/// Lowercases a name for case-insensitive matching, Unicode-aware.
#[must_use]
pub fn fold_case(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

/// Whether two names are equal under [`fold_case`].
#[must_use]
pub fn same_name(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// A link instance and the document it points at.
#[derive(Clone, Copy)]
pub struct LinkRef<'a> {
    /// Link instance id in the host document.
    pub id: ElementId,
    /// Title of the linked document.
    pub title: &'a str,
    /// The linked document, if it is currently loaded.
    pub document: Option<&'a dyn ElementGraph>,
}

/// Read access to a building-model document.
pub trait ElementGraph {
    /// Document title.
    fn title(&self) -> &str;

    /// Looks up an element by id.
    fn element(&self, id: ElementId) -> Option<&Element>;

    /// All elements in ascending id order.
    fn elements(&self) -> Box<dyn Iterator<Item = &Element> + '_>;

    /// Looks up an element type by id.
    fn element_type(&self, id: ElementId) -> Option<&ElementType>;

    /// All element types.
    fn element_types(&self) -> Box<dyn Iterator<Item = &ElementType> + '_>;

    /// All levels.
    fn levels(&self) -> &[Level];

    /// All user worksets. Empty when the document is not workshared.
    fn worksets(&self) -> &[Workset];

    /// Looks up a view by id.
    fn view(&self, id: ElementId) -> Option<&View>;

    /// Number of views in the document.
    fn view_count(&self) -> usize;

    /// Resolves a link instance.
    fn link(&self, id: ElementId) -> Option<LinkRef<'_>>;

    /// Undo records of committed transactions, oldest first.
    fn undo_records(&self) -> &[UndoRecord];

    /// Elements changed by the most recently committed transaction.
    fn last_changes(&self) -> &BTreeSet<ElementId>;

    /// Number of elements.
    fn element_count(&self) -> usize {
        self.elements().count()
    }

    /// Whether the document has worksets enabled.
    fn is_workshared(&self) -> bool {
        !self.worksets().is_empty()
    }

    /// Looks up an element by its unique id string. An empty id matches
    /// nothing.
    fn element_by_unique_id(&self, unique_id: &str) -> Option<&Element> {
        if unique_id.is_empty() {
            return None;
        }
        self.elements().find(|e| e.unique_id == unique_id)
    }

    /// One-hop dependents of `id`: explicit dependents plus hosted elements.
    ///
    /// Returns `None` if `id` does not exist.
    fn dependents(&self, id: ElementId) -> Option<BTreeSet<ElementId>> {
        let element = self.element(id)?;
        let mut out: BTreeSet<ElementId> = element
            .dependents
            .iter()
            .copied()
            .filter(|d| self.element(*d).is_some())
            .collect();
        out.extend(
            self.elements()
                .filter(|e| e.host == Some(id))
                .map(|e| e.id),
        );
        Some(out)
    }
}

/// Mutating access to a building-model document.
///
/// Bulk transforms and deletion are single calls: either every requested
/// element is changed or the call fails and nothing is.
pub trait GraphMut: ElementGraph {
    /// Opaque saved state used to roll back transactions.
    type Checkpoint;

    /// Captures the current state.
    fn checkpoint(&self) -> Self::Checkpoint;

    /// Restores a previously captured state.
    fn restore(&mut self, checkpoint: Self::Checkpoint);

    /// Records the pending changes as one committed undo step.
    fn commit_changes(&mut self, transaction_name: &str);

    /// Writes a parameter value. The value must match the storage kind.
    ///
    /// # Errors
    ///
    /// Fails if the element or parameter is missing, the parameter is
    /// read-only, or the value has the wrong storage kind.
    fn set_parameter(&mut self, id: ElementId, name: &str, value: ParameterValue)
        -> ModelResult<()>;

    /// Reassigns the element type.
    ///
    /// # Errors
    ///
    /// Fails if the element or type is missing or the type's category differs.
    fn change_type(&mut self, id: ElementId, type_id: ElementId) -> ModelResult<()>;

    /// Temporarily isolates `ids` in a view.
    ///
    /// # Errors
    ///
    /// Fails if the view does not exist.
    fn isolate_in_view(&mut self, view: ElementId, ids: &[ElementId]) -> ModelResult<()>;

    /// Translates all elements by one vector.
    ///
    /// # Errors
    ///
    /// Fails without changes if any element is missing.
    fn move_elements(&mut self, ids: &[ElementId], translation: Point3) -> ModelResult<()>;

    /// Copies all elements, offset by one vector. Returns the new ids.
    ///
    /// # Errors
    ///
    /// Fails without changes if any element is missing.
    fn copy_elements(&mut self, ids: &[ElementId], translation: Point3)
        -> ModelResult<Vec<ElementId>>;

    /// Rotates all elements about one axis by `angle` radians.
    ///
    /// # Errors
    ///
    /// Fails without changes if any element is missing or cannot be rotated.
    fn rotate_elements(&mut self, ids: &[ElementId], axis: Axis, angle: f64) -> ModelResult<()>;

    /// Mirrors all elements across one plane. Returns the new ids when
    /// `copy` is set, otherwise the mirrored ids.
    ///
    /// # Errors
    ///
    /// Fails without changes if any element is missing or cannot be mirrored.
    fn mirror_elements(
        &mut self,
        ids: &[ElementId],
        plane: Plane,
        copy: bool,
    ) -> ModelResult<Vec<ElementId>>;

    /// Deletes the elements and everything that cascades from them.
    /// Returns every deleted id.
    ///
    /// # Errors
    ///
    /// Fails without changes if any requested element is missing.
    fn delete_elements(&mut self, ids: &[ElementId]) -> ModelResult<Vec<ElementId>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_fold_beyond_ascii() {
        assert!(same_name("ÉTAGE 1", "étage 1"));
        assert!(same_name("Ebene Ü", "ebene ü"));
        assert!(!same_name("Level 1", "Level 10"));
        assert_eq!(fold_case("Ärmel"), "ärmel");
    }
}
