//! Arena of managed objects owned by one context
//!
//! Objects refer to each other through `ObjectHandle`s, so bidirectional
//! links never form ownership cycles. An identity map keeps one object per
//! (entity, row id) pair.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ManagedObject, ObjectHandle, ObjectId};
use crate::errors::{KeelError, Result};
use crate::model::{EntityDescription, RelationshipDescription, Value};

#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    objects: Vec<Option<ManagedObject>>,
    registered: Vec<ObjectHandle>,
    identity_map: HashMap<(String, i64), ObjectHandle>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object, returning the existing handle if its row is
    /// already represented
    pub fn insert_object(&mut self, object: ManagedObject) -> ObjectHandle {
        if let Some(row) = object.object_id().row() {
            let key = (object.entity().name().to_string(), row);
            if let Some(existing) = self.identity_map.get(&key) {
                return *existing;
            }
            let handle = self.push(object);
            self.identity_map.insert(key, handle);
            return handle;
        }
        self.push(object)
    }

    fn push(&mut self, object: ManagedObject) -> ObjectHandle {
        let handle = ObjectHandle(self.objects.len());
        self.objects.push(Some(object));
        self.registered.push(handle);
        handle
    }

    /// Object for a row, or a new one when `object_id` is unknown
    ///
    /// New objects start with their entity's defaults in the pending layer.
    /// Row ids already in the graph resolve to the same handle.
    pub fn new_object_for_entity(
        &mut self,
        entity: &Arc<EntityDescription>,
        object_id: ObjectId,
    ) -> ObjectHandle {
        let mut object = ManagedObject::new(Arc::clone(entity), object_id);
        if !object_id.is_known() {
            for property in entity.properties() {
                if let Some(default) = property.default_value() {
                    object.set_pending_value(property.name(), Some(default.clone()));
                }
            }
        }
        self.insert_object(object)
    }

    pub fn get(&self, handle: ObjectHandle) -> Result<&ManagedObject> {
        self.objects
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| missing_object(handle))
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Result<&mut ManagedObject> {
        self.objects
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| missing_object(handle))
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.get(handle).is_ok()
    }

    /// Handle of the object representing `row` of `entity`, if loaded
    pub fn object_with_id(&self, entity: &str, row: i64) -> Option<ObjectHandle> {
        self.identity_map.get(&(entity.to_string(), row)).copied()
    }

    /// Record the row id a store generated for a new object
    pub fn assign_object_id(&mut self, handle: ObjectHandle, row: i64) -> Result<()> {
        let object = self.get_mut(handle)?;
        let entity = object.entity().name().to_string();
        if let Some(previous) = object.object_id().row() {
            self.identity_map.remove(&(entity.clone(), previous));
        }
        self.get_mut(handle)?.set_object_id(ObjectId::Row(row));
        self.identity_map.insert((entity, row), handle);
        Ok(())
    }

    /// Drop an object from the graph after its row was deleted
    ///
    /// Every remaining object loses its links to the handle, including
    /// links through relationships without an inverse.
    pub fn forget(&mut self, handle: ObjectHandle) -> Result<ManagedObject> {
        let object = self
            .objects
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or_else(|| missing_object(handle))?;
        if let Some(row) = object.object_id().row() {
            self.identity_map
                .remove(&(object.entity().name().to_string(), row));
        }
        self.registered.retain(|h| *h != handle);
        for other in self.objects.iter_mut().flatten() {
            other.unlink_everywhere(handle);
        }
        Ok(object)
    }

    /// Live objects in registration order
    pub fn handles(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.registered.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Objects holding uncommitted writes, in registration order
    pub fn changed_objects(&self) -> Vec<ObjectHandle> {
        self.registered
            .iter()
            .copied()
            .filter(|h| self.get(*h).map(ManagedObject::has_changes).unwrap_or(false))
            .collect()
    }

    /// Relationship named `name` (or by its singular) on the object's entity
    pub fn relationship_for(
        &self,
        handle: ObjectHandle,
        name: &str,
    ) -> Result<RelationshipDescription> {
        let object = self.get(handle)?;
        let entity = object.entity();
        match entity.attribute_with_name(name) {
            Some(attribute) => attribute.as_relationship().cloned().ok_or_else(|| {
                KeelError::InvalidOperation {
                    object: object.to_string(),
                    message: format!("'{}' is not a relationship", name),
                }
            }),
            None => Err(KeelError::AttributeNotFound {
                entity: entity.name().to_string(),
                attribute: name.to_string(),
            }),
        }
    }

    /// Write a property into the pending-update layer after a type check
    ///
    /// A mismatched value leaves the pending layer untouched.
    pub fn set_value(
        &mut self,
        handle: ObjectHandle,
        name: &str,
        value: Option<Value>,
    ) -> Result<()> {
        let object = self.get(handle)?;
        let property = object.entity().property(name).ok_or_else(|| {
            KeelError::AttributeNotFound {
                entity: object.entity().name().to_string(),
                attribute: name.to_string(),
            }
        })?;
        if let Some(v) = &value {
            if !property.scalar_type().accepts(v) {
                return Err(KeelError::InvalidOperation {
                    object: object.to_string(),
                    message: format!(
                        "Invalid type [{}], expected [{}]",
                        v.value_class(),
                        property.scalar_type().value_class()
                    ),
                });
            }
        }
        let name = property.name().to_string();
        self.get_mut(handle)?.set_pending_value(&name, value);
        Ok(())
    }

    /// Link `target` through `relationship` on `owner`
    ///
    /// A pending removal of the same link is cancelled rather than recorded
    /// as an insert.
    /// With `mirror_inverse`, `owner` is also added to the inverse
    /// relationship of `target`; the mirrored call passes `false` so the
    /// pair stops there.
    pub fn add_object_to_relationship(
        &mut self,
        owner: ObjectHandle,
        relationship: &str,
        target: ObjectHandle,
        mirror_inverse: bool,
    ) -> Result<()> {
        let description = self.relationship_for(owner, relationship)?;
        let target_object = self.get(target)?;
        if !target_object.entity().is_kind_of(description.target()) {
            return Err(KeelError::InvalidOperation {
                object: self.get(owner)?.to_string(),
                message: format!(
                    "Invalid type [{}], expected [{}]",
                    target_object.entity().class_name(),
                    description.target()
                ),
            });
        }

        let object = self.get_mut(owner)?;
        let cancelled = object.cancel_removed(description.name(), target);
        if !cancelled || !object.is_persisted_link(description.name(), target) {
            object.push_inserted(description.name(), target);
        }

        if mirror_inverse {
            if let Some(inverse) = description.inverse() {
                self.add_object_to_relationship(target, &inverse.name, owner, false)?;
            }
        }
        Ok(())
    }

    /// Unlink `target` from `relationship` on `owner`
    ///
    /// A link that only exists as a pending insert is cancelled instead of
    /// being recorded as a removal.
    pub fn remove_object_from_relationship(
        &mut self,
        owner: ObjectHandle,
        relationship: &str,
        target: ObjectHandle,
        mirror_inverse: bool,
    ) -> Result<()> {
        let description = self.relationship_for(owner, relationship)?;
        self.get(target)?;

        let object = self.get_mut(owner)?;
        let cancelled = object.cancel_inserted(description.name(), target);
        if !cancelled || object.is_persisted_link(description.name(), target) {
            object.push_removed(description.name(), target);
        }

        if mirror_inverse {
            if let Some(inverse) = description.inverse() {
                self.remove_object_from_relationship(target, &inverse.name, owner, false)?;
            }
        }
        Ok(())
    }
}

fn missing_object(handle: ObjectHandle) -> KeelError {
    KeelError::ManagedObject {
        object: handle.to_string(),
        message: "No such object in this context".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Cardinality, InverseRelationship, PropertyDescription, ScalarType,
    };

    fn library() -> (Arc<EntityDescription>, Arc<EntityDescription>) {
        let mut author = EntityDescription::new("Author", "Authors", "Author");
        let mut name = PropertyDescription::new("Author", "name", ScalarType::String);
        name.set_default_value(Some(Value::from("Anonymous"))).unwrap();
        author.add_attribute(name);
        let mut books = RelationshipDescription::new("Author", "books", "Book")
            .with_to(Cardinality::Many)
            .with_singular("book");
        books.set_inverse(Some(InverseRelationship {
            entity: "Book".to_string(),
            name: "author".to_string(),
            to: Cardinality::One,
        }));
        author.add_attribute(books);

        let mut book = EntityDescription::new("Book", "Books", "Book");
        let mut written_by = RelationshipDescription::new("Book", "author", "Author");
        written_by.set_inverse(Some(InverseRelationship {
            entity: "Author".to_string(),
            name: "books".to_string(),
            to: Cardinality::Many,
        }));
        book.add_attribute(written_by);
        (Arc::new(author), Arc::new(book))
    }

    #[test]
    fn test_defaults_only_for_new_objects() {
        let (author, _) = library();
        let mut graph = ObjectGraph::new();
        let fresh = graph.new_object_for_entity(&author, ObjectId::Unknown);
        let fault = graph.new_object_for_entity(&author, ObjectId::Row(3));

        assert_eq!(
            graph.get(fresh).unwrap().value_for_property("name"),
            Some(&Value::from("Anonymous"))
        );
        assert!(graph.get(fault).unwrap().is_fault());
        assert!(!graph.get(fault).unwrap().has_changes());
    }

    #[test]
    fn test_identity_map_uniques_rows() {
        let (author, _) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Row(3));
        let b = graph.new_object_for_entity(&author, ObjectId::Row(3));
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);

        let c = graph.new_object_for_entity(&author, ObjectId::Unknown);
        graph.assign_object_id(c, 9).unwrap();
        assert_eq!(graph.object_with_id("Author", 9), Some(c));
    }

    #[test]
    fn test_add_mirrors_onto_inverse() {
        let (author, book) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Unknown);
        let b = graph.new_object_for_entity(&book, ObjectId::Unknown);

        graph.add_object_to_relationship(a, "book", b, true).unwrap();

        assert_eq!(graph.get(a).unwrap().related_objects("books"), vec![b]);
        assert_eq!(graph.get(b).unwrap().related_objects("author"), vec![a]);
    }

    #[test]
    fn test_add_rejects_wrong_type() {
        let (author, _) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Unknown);
        let other = graph.new_object_for_entity(&author, ObjectId::Unknown);

        let err = graph
            .add_object_to_relationship(a, "books", other, true)
            .unwrap_err();
        assert!(matches!(err, KeelError::InvalidOperation { .. }));
        assert!(!graph.get(a).unwrap().inserted_relationships().contains_key("books"));
    }

    #[test]
    fn test_set_value_type_mismatch_leaves_pending() {
        let (author, _) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Unknown);
        let before = graph.get(a).unwrap().updated_data().clone();

        let err = graph.set_value(a, "name", Some(Value::Integer(4))).unwrap_err();
        assert!(matches!(err, KeelError::InvalidOperation { .. }));
        assert_eq!(graph.get(a).unwrap().updated_data(), &before);
    }

    #[test]
    fn test_relinking_cancels_pending_removal() {
        let (author, book) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Row(1));
        let b = graph.new_object_for_entity(&book, ObjectId::Row(1));
        graph.get_mut(a).unwrap().set_relationships(
            [("books".to_string(), vec![b])].into_iter().collect(),
        );
        graph.get_mut(b).unwrap().set_relationships(
            [("author".to_string(), vec![a])].into_iter().collect(),
        );

        graph.remove_object_from_relationship(a, "books", b, true).unwrap();
        graph.add_object_to_relationship(a, "books", b, true).unwrap();

        for handle in [a, b] {
            let object = graph.get(handle).unwrap();
            assert!(object.inserted_relationships().is_empty());
            assert!(object.removed_relationships().is_empty());
        }
        assert_eq!(graph.get(b).unwrap().related_objects("author"), vec![a]);
    }

    #[test]
    fn test_unlinking_unsaved_link_cancels_insert() {
        let (author, book) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Unknown);
        let b = graph.new_object_for_entity(&book, ObjectId::Unknown);

        graph.add_object_to_relationship(a, "books", b, true).unwrap();
        graph.remove_object_from_relationship(a, "books", b, true).unwrap();

        assert!(graph.get(a).unwrap().removed_relationships().is_empty());
        assert!(!graph.get(b).unwrap().has_changes());
    }

    #[test]
    fn test_forget_unlinks_from_other_objects() {
        let (author, book) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Row(1));
        let b = graph.new_object_for_entity(&book, ObjectId::Row(1));
        graph.get_mut(a).unwrap().set_relationships(
            [("books".to_string(), vec![b])].into_iter().collect(),
        );

        graph.forget(b).unwrap();

        assert!(graph.get(a).unwrap().related_objects("books").is_empty());
    }

    #[test]
    fn test_forget_clears_identity() {
        let (author, _) = library();
        let mut graph = ObjectGraph::new();
        let a = graph.new_object_for_entity(&author, ObjectId::Row(1));
        graph.forget(a).unwrap();
        assert!(graph.get(a).is_err());
        assert_eq!(graph.object_with_id("Author", 1), None);
        assert!(graph.is_empty());
    }
}
