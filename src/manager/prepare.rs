//! Document preparation.
//!
//! [`Preparer`] turns an entity into the JSON document sent with an `index`
//! action, and single changed values into entries of an `update` document.
//! Relation fields are handed to the relation resolver (see `relation.rs`).

use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::{OdmError, Result};
use crate::metadata::{EntityMetadata, FieldDeclaration};
use crate::validation::Validator;
use crate::value::FieldValue;

/// Document body of an entity.
pub type DocumentData = Map<String, Value>;

pub(crate) struct Preparer<'a> {
    pub(super) validator: &'a dyn Validator,
    pub(super) max_depth: usize,
}

impl<'a> Preparer<'a> {
    pub(crate) fn new(validator: &'a dyn Validator, max_depth: usize) -> Self {
        Self {
            validator,
            max_depth,
        }
    }

    /// Prepare the full document of `entity`.
    pub(crate) fn prepare(&self, entity: &dyn Entity, metadata: &EntityMetadata) -> Result<DocumentData> {
        self.prepare_at(entity, metadata, 0)
    }

    pub(super) fn prepare_at(
        &self,
        entity: &dyn Entity,
        metadata: &EntityMetadata,
        depth: usize,
    ) -> Result<DocumentData> {
        let mut data = Map::new();
        for field in metadata.fields() {
            match entity.field_value(field.name()) {
                Some(value) => {
                    let prepared = self.prepare_value_at(metadata, field, value, depth)?;
                    data.insert(field.name().to_string(), prepared);
                }
                None if !field.is_nullable() => {
                    return Err(OdmError::MissingRequiredField {
                        type_name: metadata.type_name().to_string(),
                        field: field.name().to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(data)
    }

    /// Prepare one materialized value of `field`.
    pub(crate) fn prepare_value(
        &self,
        metadata: &EntityMetadata,
        field: &FieldDeclaration,
        value: FieldValue,
    ) -> Result<Value> {
        self.prepare_value_at(metadata, field, value, 0)
    }

    fn prepare_value_at(
        &self,
        metadata: &EntityMetadata,
        field: &FieldDeclaration,
        value: FieldValue,
        depth: usize,
    ) -> Result<Value> {
        match field.relation_descriptor() {
            Some(relation) => self.resolve_field(metadata, field.name(), relation, value, depth),
            None => value.to_json().ok_or_else(|| {
                OdmError::invalid_relation(
                    metadata.type_name(),
                    field.name(),
                    "field is not declared as a relation but holds an entity",
                )
            }),
        }
    }
}
