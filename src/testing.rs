//! Map-backed entity types for unit tests.

use std::any::Any;
use std::collections::BTreeMap;

use crate::entity::{Entity, EntityState, EntityType, EntityTypeRef};
use crate::error::Result;
use crate::metadata::{EntityMetadata, FieldDeclaration, FieldType, IndexDescriptor};
use crate::value::FieldValue;

macro_rules! record_entity {
    ($name:ident, $metadata:expr) => {
        #[derive(Debug, Default)]
        pub struct $name {
            pub id: String,
            pub state: EntityState,
            pub fields: BTreeMap<String, FieldValue>,
        }

        impl $name {
            pub fn with_id(id: &str) -> Self {
                Self {
                    id: id.to_string(),
                    ..Default::default()
                }
            }

            pub fn set(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
                self.fields.insert(field.to_string(), value.into());
                self
            }
        }

        impl Entity for $name {
            fn entity_type(&self) -> EntityTypeRef {
                EntityTypeRef::of::<Self>()
            }
            fn id(&self) -> &str {
                &self.id
            }
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
            fn state(&self) -> &EntityState {
                &self.state
            }
            fn state_mut(&mut self) -> &mut EntityState {
                &mut self.state
            }
            fn field_value(&self, field: &str) -> Option<FieldValue> {
                self.fields.get(field).cloned()
            }
            fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
                self.fields.insert(field.to_string(), value);
                Ok(true)
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        impl EntityType for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn metadata() -> Result<EntityMetadata> {
                $metadata
            }
        }
    };
}

record_entity!(
    Note,
    EntityMetadata::builder("Note")
        .index(IndexDescriptor::new("notes"))
        .field(FieldDeclaration::new("title", FieldType::Text))
        .field(FieldDeclaration::new("views", FieldType::Integer).nullable(true))
        .field(FieldDeclaration::new("tags", FieldType::Keyword).nullable(true))
        .field(FieldDeclaration::reference::<Author>("author").nullable(true))
        .field(FieldDeclaration::nested::<Part>("parts").nullable(true))
        .build()
);

record_entity!(
    Author,
    EntityMetadata::builder("Author")
        .index(IndexDescriptor::new("authors"))
        .field(FieldDeclaration::new("name", FieldType::Text).nullable(true))
        .field(FieldDeclaration::reference::<Note>("favorite").nullable(true))
        .build()
);

record_entity!(
    Part,
    EntityMetadata::builder("Part")
        .field(FieldDeclaration::new("label", FieldType::Keyword).nullable(true))
        .field(FieldDeclaration::nested::<Part>("children").nullable(true))
        .build()
);
