//! Quickstart - declare entities, persist a small graph, change it and query it back.
//!
//! Runs against the in-memory transport; swap in `HttpTransport` (feature `http`) to talk to a
//! real cluster.

use std::any::Any;
use std::sync::Arc;

use anyhow::Context;
use serde_json::json;

use elastic_odm::{
    Criteria, Entity, EntityManager, EntityMetadata, EntityRef, EntityState, EntityType,
    EntityTypeRef, FieldDeclaration, FieldType, FieldValue, IndexDescriptor, LoggingListener,
    MemoryTransport, OrderBy, Result, generate_id, shared, with_entity, with_entity_mut,
};

#[derive(Debug, Default)]
struct Author {
    id: String,
    state: EntityState,
    name: Option<String>,
}

impl Entity for Author {
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
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EntityType for Author {
    const TYPE_NAME: &'static str = "Author";

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::builder(Self::TYPE_NAME)
            .index(IndexDescriptor::new("authors"))
            .field(FieldDeclaration::new("name", FieldType::Text))
            .build()
    }
}

#[derive(Debug, Default)]
struct Book {
    id: String,
    state: EntityState,
    title: Option<String>,
    year: Option<i64>,
    author: Option<EntityRef>,
}

impl Entity for Book {
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
        match field {
            "title" => self.title.clone().map(FieldValue::from),
            "year" => self.year.map(FieldValue::Integer),
            "author" => self.author.clone().map(FieldValue::Entity),
            _ => None,
        }
    }
    fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
        match field {
            "title" => self.title = value.into_optional()?,
            "year" => self.year = value.into_optional()?,
            "author" => self.author = value.into_optional()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EntityType for Book {
    const TYPE_NAME: &'static str = "Book";

    fn metadata() -> Result<EntityMetadata> {
        EntityMetadata::builder(Self::TYPE_NAME)
            .index(IndexDescriptor::new("books").with_shards(1).with_refresh_interval("1s"))
            .field(FieldDeclaration::new("title", FieldType::Text).analyzer("english"))
            .field(FieldDeclaration::new("year", FieldType::Integer).nullable(true))
            .field(FieldDeclaration::reference::<Author>("author").nullable(true))
            .build()
    }
}

fn main() -> anyhow::Result<()> {
    println!("=== Quickstart ===\n");

    let transport = Arc::new(MemoryTransport::new());
    let mut manager = EntityManager::builder()
        .transport(transport.clone())
        .listener_all(Arc::new(LoggingListener))
        .build()?;

    // Persist an author and two books
    let author = shared(Author {
        id: generate_id(),
        name: Some("Ursula K. Le Guin".into()),
        ..Default::default()
    });
    manager.persist(&author)?;

    for (title, year) in [("The Dispossessed", 1974), ("The Left Hand of Darkness", 1969)] {
        let book = shared(Book {
            id: generate_id(),
            title: Some(title.into()),
            year: Some(year),
            author: Some(Arc::clone(&author)),
            ..Default::default()
        });
        manager.persist(&book)?;
    }
    manager.flush().context("failed to index the books")?;
    println!("Indexed {} books", transport.document_count("books"));

    // Query them back, newest first
    let books = manager.find_by::<Book>(
        &Criteria::new().range("year", json!({"gte": 1960})),
        &OrderBy::new().desc("year"),
        Some(10),
        None,
    )?;
    for book in &books {
        if let Some((title, year)) = with_entity::<Book, _>(book, |b| (b.title.clone(), b.year)) {
            println!("  {:?} ({:?})", title.unwrap_or_default(), year);
        }
    }

    // Change one and flush: only the changed field is sent
    if let Some(first) = books.first() {
        manager.persist(first)?;
        manager.flush()?;
        with_entity_mut::<Book, _>(first, |b| b.year = Some(1975));
        manager.flush()?;
        println!("\nLast bulk request: {:?}", transport.last_bulk());
    }

    let total = manager
        .count_custom_query("books", &json!({"query": {"match_all": {}}}))
        .context("failed to count the books")?;
    println!("\n{total} books in the index");
    Ok(())
}
