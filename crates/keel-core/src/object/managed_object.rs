//! Change-tracked proxy for one row and its links

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use super::ObjectHandle;
use crate::model::{EntityDescription, Value};

/// Row identifier of a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ObjectId {
    /// Not inserted yet
    Unknown,
    Row(i64),
}

impl ObjectId {
    pub fn is_known(&self) -> bool {
        matches!(self, ObjectId::Row(_))
    }

    pub fn row(&self) -> Option<i64> {
        match self {
            ObjectId::Row(id) => Some(*id),
            ObjectId::Unknown => None,
        }
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectId::Unknown => f.write_str("unknown"),
            ObjectId::Row(id) => write!(f, "{}", id),
        }
    }
}

type RelationshipMap = BTreeMap<String, Vec<ObjectHandle>>;

/// One row of an entity plus its links, in four layers
///
/// Persisted layers hold what the store last confirmed. Pending layers hold
/// uncommitted writes: property values shadow persisted ones on read, and
/// relationship inserts/removes are applied on top of the persisted links.
#[derive(Debug, Clone)]
pub struct ManagedObject {
    entity: Arc<EntityDescription>,
    object_id: ObjectId,
    data: BTreeMap<String, Option<Value>>,
    updated_data: BTreeMap<String, Option<Value>>,
    relationships: RelationshipMap,
    inserted_relationships: RelationshipMap,
    removed_relationships: RelationshipMap,
}

impl ManagedObject {
    pub fn new(entity: Arc<EntityDescription>, object_id: ObjectId) -> Self {
        Self {
            entity,
            object_id,
            data: BTreeMap::new(),
            updated_data: BTreeMap::new(),
            relationships: BTreeMap::new(),
            inserted_relationships: BTreeMap::new(),
            removed_relationships: BTreeMap::new(),
        }
    }

    pub fn entity(&self) -> &Arc<EntityDescription> {
        &self.entity
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub(crate) fn set_object_id(&mut self, object_id: ObjectId) {
        self.object_id = object_id;
    }

    /// Row reference with nothing loaded yet
    pub fn is_fault(&self) -> bool {
        self.object_id.is_known() && self.data.is_empty() && self.relationships.is_empty()
    }

    /// Whether any pending layer holds an uncommitted write
    pub fn has_changes(&self) -> bool {
        !self.updated_data.is_empty()
            || !self.inserted_relationships.is_empty()
            || !self.removed_relationships.is_empty()
    }

    pub fn has_updated_data(&self) -> bool {
        !self.updated_data.is_empty()
    }

    /// Pending value if one was written, else the persisted value
    ///
    /// A pending null shadows a persisted value.
    pub fn value_for_property(&self, name: &str) -> Option<&Value> {
        match self.updated_data.get(name) {
            Some(pending) => pending.as_ref(),
            None => self.data.get(name).and_then(Option::as_ref),
        }
    }

    /// Effective links: (persisted + pending inserts) - pending removes
    pub fn related_objects(&self, name: &str) -> Vec<ObjectHandle> {
        let removed = self.removed_relationships.get(name);
        let mut out: Vec<ObjectHandle> = Vec::new();
        let layers = [
            self.relationships.get(name),
            self.inserted_relationships.get(name),
        ];
        for handle in layers.into_iter().flatten().flatten() {
            if removed.is_some_and(|r| r.contains(handle)) || out.contains(handle) {
                continue;
            }
            out.push(*handle);
        }
        out
    }

    pub fn data(&self) -> &BTreeMap<String, Option<Value>> {
        &self.data
    }

    pub fn updated_data(&self) -> &BTreeMap<String, Option<Value>> {
        &self.updated_data
    }

    pub fn relationships(&self) -> &RelationshipMap {
        &self.relationships
    }

    pub fn inserted_relationships(&self) -> &RelationshipMap {
        &self.inserted_relationships
    }

    pub fn removed_relationships(&self) -> &RelationshipMap {
        &self.removed_relationships
    }

    /// Replace the persisted property layer, as loaded by a store
    pub fn set_data(&mut self, data: BTreeMap<String, Option<Value>>) {
        self.data = data;
    }

    /// Replace the persisted relationship layer, as loaded by a store
    pub fn set_relationships(&mut self, relationships: RelationshipMap) {
        self.relationships = relationships;
    }

    pub(crate) fn set_pending_value(&mut self, name: &str, value: Option<Value>) {
        self.updated_data.insert(name.to_string(), value);
    }

    pub(crate) fn push_inserted(&mut self, name: &str, handle: ObjectHandle) {
        let pending = self
            .inserted_relationships
            .entry(name.to_string())
            .or_default();
        if !pending.contains(&handle) {
            pending.push(handle);
        }
    }

    pub(crate) fn push_removed(&mut self, name: &str, handle: ObjectHandle) {
        let pending = self
            .removed_relationships
            .entry(name.to_string())
            .or_default();
        if !pending.contains(&handle) {
            pending.push(handle);
        }
    }

    /// Drop `handle` from the pending inserts of `name`; true if it was there
    pub(crate) fn cancel_inserted(&mut self, name: &str, handle: ObjectHandle) -> bool {
        cancel_pending(&mut self.inserted_relationships, name, handle)
    }

    /// Drop `handle` from the pending removes of `name`; true if it was there
    pub(crate) fn cancel_removed(&mut self, name: &str, handle: ObjectHandle) -> bool {
        cancel_pending(&mut self.removed_relationships, name, handle)
    }

    pub fn is_persisted_link(&self, name: &str, handle: ObjectHandle) -> bool {
        self.relationships
            .get(name)
            .is_some_and(|persisted| persisted.contains(&handle))
    }

    /// Remove `handle` from every relationship layer
    pub(crate) fn unlink_everywhere(&mut self, handle: ObjectHandle) {
        for linked in self.relationships.values_mut() {
            linked.retain(|h| *h != handle);
        }
        for layer in [&mut self.inserted_relationships, &mut self.removed_relationships] {
            layer.retain(|_, pending| {
                pending.retain(|h| *h != handle);
                !pending.is_empty()
            });
        }
    }

    /// Fold the pending inserts of one relationship into the persisted links
    pub fn did_save_inserted_objects_for(&mut self, name: &str) {
        if let Some(inserted) = self.inserted_relationships.remove(name) {
            let persisted = self.relationships.entry(name.to_string()).or_default();
            for handle in inserted {
                if !persisted.contains(&handle) {
                    persisted.push(handle);
                }
            }
        }
    }

    /// Subtract the pending removes of one relationship from the persisted links
    pub fn did_save_removed_objects_for(&mut self, name: &str) {
        if let Some(removed) = self.removed_relationships.remove(name) {
            if let Some(persisted) = self.relationships.get_mut(name) {
                persisted.retain(|h| !removed.contains(h));
            }
        }
    }

    /// Fold every pending layer into the persisted layers, then clear them
    pub fn persist_changes(&mut self) {
        let updated = std::mem::take(&mut self.updated_data);
        self.data.extend(updated);

        let names: Vec<String> = self.inserted_relationships.keys().cloned().collect();
        for name in names {
            self.did_save_inserted_objects_for(&name);
        }
        let names: Vec<String> = self.removed_relationships.keys().cloned().collect();
        for name in names {
            self.did_save_removed_objects_for(&name);
        }
        self.discard_changes();
    }

    /// Drop every pending layer without folding
    pub fn discard_changes(&mut self) {
        self.updated_data.clear();
        self.inserted_relationships.clear();
        self.removed_relationships.clear();
    }
}

fn cancel_pending(layer: &mut RelationshipMap, name: &str, handle: ObjectHandle) -> bool {
    let Some(pending) = layer.get_mut(name) else {
        return false;
    };
    let before = pending.len();
    pending.retain(|h| *h != handle);
    let cancelled = pending.len() != before;
    if pending.is_empty() {
        layer.remove(name);
    }
    cancelled
}

impl std::fmt::Display for ManagedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.entity.name(), self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyDescription, ScalarType};

    fn tag_entity() -> Arc<EntityDescription> {
        let mut entity = EntityDescription::new("Tag", "Tags", "Tag");
        entity.add_attribute(PropertyDescription::new("Tag", "label", ScalarType::String));
        Arc::new(entity)
    }

    #[test]
    fn test_fault_state() {
        let new_object = ManagedObject::new(tag_entity(), ObjectId::Unknown);
        assert!(!new_object.is_fault());

        let mut fault = ManagedObject::new(tag_entity(), ObjectId::Row(7));
        assert!(fault.is_fault());
        fault.set_data(BTreeMap::from([("label".to_string(), None)]));
        assert!(!fault.is_fault());
    }

    #[test]
    fn test_pending_shadows_persisted() {
        let mut object = ManagedObject::new(tag_entity(), ObjectId::Row(1));
        object.set_data(BTreeMap::from([(
            "label".to_string(),
            Some(Value::from("old")),
        )]));
        object.set_pending_value("label", Some(Value::from("new")));
        assert_eq!(object.value_for_property("label"), Some(&Value::from("new")));
        assert_eq!(object.data()["label"], Some(Value::from("old")));

        object.set_pending_value("label", None);
        assert_eq!(object.value_for_property("label"), None);
    }

    #[test]
    fn test_remove_wins_over_insert() {
        let mut object = ManagedObject::new(tag_entity(), ObjectId::Unknown);
        let other = ObjectHandle(4);
        object.push_inserted("posts", other);
        object.push_removed("posts", other);
        assert!(object.related_objects("posts").is_empty());
    }

    #[test]
    fn test_persist_and_discard_clear_changes() {
        let mut object = ManagedObject::new(tag_entity(), ObjectId::Unknown);
        object.set_pending_value("label", Some(Value::from("x")));
        object.push_inserted("posts", ObjectHandle(1));
        object.push_inserted("posts", ObjectHandle(2));
        object.push_removed("posts", ObjectHandle(2));
        assert!(object.has_changes());

        object.persist_changes();
        assert!(!object.has_changes());
        assert_eq!(object.data()["label"], Some(Value::from("x")));
        assert_eq!(object.relationships()["posts"], vec![ObjectHandle(1)]);

        object.set_pending_value("label", Some(Value::from("y")));
        object.discard_changes();
        assert!(!object.has_changes());
        assert_eq!(object.value_for_property("label"), Some(&Value::from("x")));
    }

    #[test]
    fn test_unlink_everywhere_clears_every_layer() {
        let mut object = ManagedObject::new(tag_entity(), ObjectId::Row(1));
        let gone = ObjectHandle(3);
        object.set_relationships(BTreeMap::from([(
            "posts".to_string(),
            vec![ObjectHandle(2), gone],
        )]));
        object.push_inserted("authors", gone);
        object.push_removed("posts", gone);

        object.unlink_everywhere(gone);

        assert_eq!(object.related_objects("posts"), vec![ObjectHandle(2)]);
        assert!(object.related_objects("authors").is_empty());
        assert!(!object.has_changes());
    }

    #[test]
    fn test_cancel_reports_whether_pending() {
        let mut object = ManagedObject::new(tag_entity(), ObjectId::Row(1));
        object.push_inserted("posts", ObjectHandle(1));
        assert!(!object.cancel_inserted("posts", ObjectHandle(2)));
        assert!(object.cancel_inserted("posts", ObjectHandle(1)));
        assert!(!object.has_changes());
        assert!(!object.cancel_removed("posts", ObjectHandle(1)));
    }

    #[test]
    fn test_did_save_folds_one_relationship() {
        let mut object = ManagedObject::new(tag_entity(), ObjectId::Row(1));
        object.push_inserted("posts", ObjectHandle(1));
        object.push_inserted("authors", ObjectHandle(2));
        object.did_save_inserted_objects_for("posts");
        assert_eq!(object.relationships()["posts"], vec![ObjectHandle(1)]);
        assert!(object.inserted_relationships().contains_key("authors"));
        assert!(object.has_changes());
    }
}
