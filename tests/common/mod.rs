#![allow(dead_code)]

use std::any::Any;
use std::sync::Arc;

use elastic_odm::{
    Entity, EntityManager, EntityMetadata, EntityRef, EntityState, EntityType, EntityTypeRef,
    FieldDeclaration, FieldType, FieldValue, IndexDescriptor, MemoryTransport, Result,
};

macro_rules! entity_plumbing {
    () => {
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
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    };
}

/// Two scalar fields, one of them always materialized.
#[derive(Debug, Default)]
pub struct DummyEntity {
    pub id: String,
    pub state: EntityState,
    pub field1: Option<String>,
    pub field2: i64,
}

impl DummyEntity {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

impl Entity for DummyEntity {
    entity_plumbing!();

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "field1" => self.field1.clone().map(FieldValue::from),
            "field2" => Some(FieldValue::Integer(self.field2)),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
        match field {
            "field1" => self.field1 = value.into_optional()?,
            "field2" => self.field2 = value.into_optional()?.unwrap_or_default(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityType for DummyEntity {
    const TYPE_NAME: &'static str = "DummyEntity";

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::builder(Self::TYPE_NAME)
            .index(IndexDescriptor::new("dummy_index"))
            .field(
                FieldDeclaration::new("field1", FieldType::Text)
                    .nullable(true)
                    .analyzer("custom_analyzer"),
            )
            .field(FieldDeclaration::new("field2", FieldType::Integer).nullable(true))
            .build()
    }
}

/// Carries a value but declares no fields.
#[derive(Debug, Default)]
pub struct DummyEntityWithoutFields {
    pub id: String,
    pub state: EntityState,
    pub name: String,
}

impl Entity for DummyEntityWithoutFields {
    entity_plumbing!();

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::from(self.name.as_str())),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
        match field {
            "name" => self.name = value.into_optional()?.unwrap_or_default(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityType for DummyEntityWithoutFields {
    const TYPE_NAME: &'static str = "DummyEntityWithoutFields";

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::builder(Self::TYPE_NAME)
            .index(IndexDescriptor::new("dummy_without_fields"))
            .build()
    }
}

#[derive(Debug, Default)]
pub struct Order {
    pub id: String,
    pub state: EntityState,
    pub order_number: Option<String>,
    pub products: Vec<EntityRef>,
    pub customer: Option<EntityRef>,
}

impl Order {
    pub fn new(id: &str, order_number: &str) -> Self {
        Self {
            id: id.to_string(),
            order_number: Some(order_number.to_string()),
            ..Default::default()
        }
    }
}

impl Entity for Order {
    entity_plumbing!();

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "order_number" => self.order_number.clone().map(FieldValue::from),
            "products" => Some(FieldValue::List(
                self.products.iter().cloned().map(FieldValue::Entity).collect(),
            )),
            "customer" => self.customer.clone().map(FieldValue::Entity),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
        match field {
            "order_number" => self.order_number = value.into_optional()?,
            "products" => self.products = value.into_entities(),
            "customer" => self.customer = value.into_optional()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityType for Order {
    const TYPE_NAME: &'static str = "Order";

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::builder(Self::TYPE_NAME)
            .index(IndexDescriptor::new("orders").with_shards(1).with_replicas(0))
            .field(FieldDeclaration::new("order_number", FieldType::Text))
            .field(FieldDeclaration::nested::<Product>("products").nullable(true))
            .field(FieldDeclaration::reference::<Customer>("customer").nullable(true))
            .build()
    }
}

#[derive(Debug, Default)]
pub struct Product {
    pub id: String,
    pub state: EntityState,
    pub name: Option<String>,
    pub price: Option<f64>,
}

impl Product {
    pub fn new(id: &str, name: &str, price: f64) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            price: Some(price),
            ..Default::default()
        }
    }
}

impl Entity for Product {
    entity_plumbing!();

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => self.name.clone().map(FieldValue::from),
            "price" => self.price.map(FieldValue::Float),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
        match field {
            "name" => self.name = value.into_optional()?,
            "price" => self.price = value.into_optional()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityType for Product {
    const TYPE_NAME: &'static str = "Product";

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::builder(Self::TYPE_NAME)
            .index(IndexDescriptor::new("products"))
            .field(FieldDeclaration::new("name", FieldType::Text))
            .field(FieldDeclaration::new("price", FieldType::Float))
            .build()
    }
}

#[derive(Debug, Default)]
pub struct Customer {
    pub id: String,
    pub state: EntityState,
    pub name: Option<String>,
}

impl Customer {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

impl Entity for Customer {
    entity_plumbing!();

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => self.name.clone().map(FieldValue::from),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
        match field {
            "name" => self.name = value.into_optional()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl EntityType for Customer {
    const TYPE_NAME: &'static str = "Customer";

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::builder(Self::TYPE_NAME)
            .index(IndexDescriptor::new("customers"))
            .field(FieldDeclaration::new("name", FieldType::Text))
            .build()
    }
}

/// A manager over a fresh in-memory engine.
pub fn memory_manager() -> (Arc<MemoryTransport>, EntityManager) {
    let transport = Arc::new(MemoryTransport::new());
    (transport.clone(), EntityManager::new(transport))
}
