//! Entity hydration from stored documents.
//!
//! Referenced entities are loaded once per hydration: a reference that leads
//! back to an entity already being loaded reuses its handle, so the hydrated
//! graph has the same shape as the persisted one.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::client::ClientWrapper;
use crate::entity::{EntityRef, EntityTypeRef};
use crate::error::{OdmError, Result};
use crate::metadata::{RelationDescriptor, RelationKind, metadata_for};
use crate::value::FieldValue;

/// Entities loaded during one hydration, by type name and identifier.
type Loaded = HashMap<(&'static str, String), EntityRef>;

pub(crate) struct Hydrator<'a> {
    client: &'a ClientWrapper,
    max_depth: usize,
}

impl<'a> Hydrator<'a> {
    pub(crate) fn new(client: &'a ClientWrapper, max_depth: usize) -> Self {
        Self { client, max_depth }
    }

    /// Build an entity of `type_ref` from `data`.
    ///
    /// Undeclared keys are ignored, as are values the entity has no setter
    /// for. Related entities are fetched (references) or built in place
    /// (nested documents).
    pub(crate) fn hydrate(
        &self,
        type_ref: EntityTypeRef,
        data: &Map<String, Value>,
        persisted: bool,
    ) -> Result<EntityRef> {
        let entity = type_ref.create();
        self.hydrate_into(&entity, type_ref, data, persisted, 0, &mut Loaded::new())?;
        Ok(entity)
    }

    /// Hydrate a search hit, taking the identifier from its `_id`.
    ///
    /// Returns `None` for hits without a `_source`.
    pub(crate) fn hydrate_hit(
        &self,
        type_ref: EntityTypeRef,
        hit: &Value,
        persisted: bool,
    ) -> Option<Result<EntityRef>> {
        let source = hit.get("_source").and_then(Value::as_object)?;
        let id = hit.get("_id").and_then(Value::as_str);

        let entity = type_ref.create();
        let mut loaded = Loaded::new();
        if let Some(id) = id {
            loaded.insert((type_ref.name(), id.to_string()), entity.clone());
        }
        let hydrated = self.hydrate_into(&entity, type_ref, source, persisted, 0, &mut loaded);
        Some(hydrated.map(|()| {
            if let Some(id) = id {
                entity.write().set_id(id.to_string());
            }
            entity
        }))
    }

    /// Point lookup followed by hydration. `Ok(None)` when not found.
    pub(crate) fn find(&self, type_ref: EntityTypeRef, id: &str) -> Result<Option<EntityRef>> {
        self.find_at(type_ref, id, 0, &mut Loaded::new())
    }

    fn hydrate_into(
        &self,
        entity: &EntityRef,
        type_ref: EntityTypeRef,
        data: &Map<String, Value>,
        persisted: bool,
        depth: usize,
        loaded: &mut Loaded,
    ) -> Result<()> {
        let metadata = metadata_for(type_ref)?;

        for (key, raw) in data {
            let Some(field) = metadata.field(key) else {
                continue;
            };
            let value = match field.relation_descriptor() {
                Some(relation) => self.hydrate_relation(type_ref, relation, raw, depth, loaded)?,
                None => FieldValue::from_json(raw, field.field_type()),
            };
            if !entity.write().set_field_value(key, value)? {
                log::trace!("{} has no setter for '{key}'", type_ref.name());
            }
        }

        entity.write().set_persisted(persisted);
        Ok(())
    }

    fn hydrate_nested(
        &self,
        type_ref: EntityTypeRef,
        data: &Map<String, Value>,
        depth: usize,
        loaded: &mut Loaded,
    ) -> Result<FieldValue> {
        let entity = type_ref.create();
        self.hydrate_into(&entity, type_ref, data, false, depth, loaded)?;
        Ok(FieldValue::Entity(entity))
    }

    fn hydrate_relation(
        &self,
        owner: EntityTypeRef,
        relation: &RelationDescriptor,
        raw: &Value,
        depth: usize,
        loaded: &mut Loaded,
    ) -> Result<FieldValue> {
        let target = relation.target();
        match (relation.kind(), raw) {
            (RelationKind::Reference, Value::String(id)) => {
                let next = self.descend(owner, depth)?;
                Ok(self
                    .find_at(target, id, next, loaded)?
                    .map_or(FieldValue::Null, FieldValue::Entity))
            }
            (RelationKind::Reference, Value::Array(ids)) => {
                let next = self.descend(owner, depth)?;
                let mut related = Vec::with_capacity(ids.len());
                for id in ids.iter().filter_map(Value::as_str) {
                    if let Some(entity) = self.find_at(target, id, next, loaded)? {
                        related.push(FieldValue::Entity(entity));
                    }
                }
                Ok(FieldValue::List(related))
            }
            (RelationKind::Nested, Value::Array(items)) => {
                let next = self.descend(owner, depth)?;
                let mut nested = Vec::with_capacity(items.len());
                for item in items {
                    let object = item.as_object().ok_or_else(|| {
                        OdmError::invalid_nested_data(
                            owner.name(),
                            target.name(),
                            format!("expected an object, found {item}"),
                        )
                    })?;
                    nested.push(self.hydrate_nested(target, object, next, loaded)?);
                }
                Ok(FieldValue::List(nested))
            }
            (RelationKind::Nested, Value::Object(object)) => {
                let next = self.descend(owner, depth)?;
                self.hydrate_nested(target, object, next, loaded)
            }
            // Anything else is handed to the setter untouched.
            _ => Ok(FieldValue::from_json(raw, None)),
        }
    }

    fn find_at(
        &self,
        type_ref: EntityTypeRef,
        id: &str,
        depth: usize,
        loaded: &mut Loaded,
    ) -> Result<Option<EntityRef>> {
        let key = (type_ref.name(), id.to_string());
        if let Some(entity) = loaded.get(&key) {
            return Ok(Some(entity.clone()));
        }
        let metadata = metadata_for(type_ref)?;
        let index = metadata.require_index()?;

        let response = self.client.get(index.name(), id)?;
        if !response.get("found").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(None);
        }
        let source = response
            .get("_source")
            .and_then(Value::as_object)
            .ok_or_else(|| OdmError::invalid_response("GET", "document found without _source"))?;

        let entity = type_ref.create();
        loaded.insert(key, entity.clone());
        self.hydrate_into(&entity, type_ref, source, true, depth, loaded)?;
        entity.write().set_id(id.to_string());
        Ok(Some(entity))
    }

    fn descend(&self, owner: EntityTypeRef, depth: usize) -> Result<usize> {
        let next = depth + 1;
        if next > self.max_depth {
            return Err(OdmError::RelationDepthExceeded {
                type_name: owner.name().to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(next)
    }
}
