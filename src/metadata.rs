//! Entity metadata: index descriptors, field declarations and the registry.
//!
//! # Module Structure
//!
//! - `index`: [`IndexDescriptor`] (index name, shards, replicas, refresh interval, settings)
//! - `field`: [`FieldDeclaration`], [`FieldType`] and relation descriptors
//! - `registry`: process-wide cache of [`EntityMetadata`] per entity type
//!
//! Declarations are validated when [`EntityMetadataBuilder::build`] runs, so a
//! bad index name or analyzer is reported the first time a type is used (or
//! when it is registered eagerly), never in the middle of a flush.

pub mod field;
pub mod index;
pub mod registry;

use std::collections::HashSet;

pub use field::{FieldDeclaration, FieldType, RelationDescriptor, RelationKind};
pub use index::IndexDescriptor;
pub use registry::{all_metadata, clear_metadata, lookup_type, metadata_for, register};

use crate::error::{OdmError, Result};

/// Declared metadata of one entity type.
#[derive(Debug, Clone)]
pub struct EntityMetadata {
    type_name: &'static str,
    index: Option<IndexDescriptor>,
    fields: Vec<FieldDeclaration>,
}

impl EntityMetadata {
    pub fn builder(type_name: &'static str) -> EntityMetadataBuilder {
        EntityMetadataBuilder {
            type_name,
            index: None,
            fields: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The index descriptor, if the type is declared as an indexed entity.
    pub fn index(&self) -> Option<&IndexDescriptor> {
        self.index.as_ref()
    }

    /// The index descriptor, or [`OdmError::NoIndexMetadata`].
    pub fn require_index(&self) -> Result<&IndexDescriptor> {
        self.index
            .as_ref()
            .ok_or_else(|| OdmError::no_index_metadata(self.type_name))
    }

    /// Field declarations in declaration order.
    pub fn fields(&self) -> &[FieldDeclaration] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Builder for [`EntityMetadata`].
#[derive(Debug)]
pub struct EntityMetadataBuilder {
    type_name: &'static str,
    index: Option<IndexDescriptor>,
    fields: Vec<FieldDeclaration>,
}

impl EntityMetadataBuilder {
    pub fn index(mut self, index: IndexDescriptor) -> Self {
        self.index = Some(index);
        self
    }

    pub fn field(mut self, field: FieldDeclaration) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate every declaration and build the metadata.
    pub fn build(self) -> Result<EntityMetadata> {
        if let Some(index) = &self.index {
            index.validate()?;
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name()) {
                return Err(OdmError::configuration(format!(
                    "Field '{}' is declared twice on entity type '{}'",
                    field.name(),
                    self.type_name
                )));
            }
        }

        Ok(EntityMetadata {
            type_name: self.type_name,
            index: self.index,
            fields: self.fields,
        })
    }
}
