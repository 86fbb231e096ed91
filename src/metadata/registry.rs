//! Process-wide metadata registry.
//!
//! Metadata is built once per entity type, either eagerly through
//! [`register`] or lazily the first time [`metadata_for`] sees the type, and
//! then shared as `Arc<EntityMetadata>`. [`clear_metadata`] resets the cache,
//! which integration tests use for isolation.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::entity::{EntityType, EntityTypeRef};
use crate::error::Result;
use crate::metadata::EntityMetadata;

struct Registered {
    type_ref: EntityTypeRef,
    metadata: Arc<EntityMetadata>,
}

lazy_static! {
    static ref REGISTRY: RwLock<HashMap<&'static str, Registered>> = RwLock::new(HashMap::new());
}

/// Cached metadata of `type_ref`, building it on first use.
pub fn metadata_for(type_ref: EntityTypeRef) -> Result<Arc<EntityMetadata>> {
    if let Some(entry) = REGISTRY.read().get(type_ref.name()) {
        return Ok(Arc::clone(&entry.metadata));
    }

    // Build outside the lock: loaders may resolve other types' metadata.
    let metadata = Arc::new(type_ref.load_metadata()?);

    let mut registry = REGISTRY.write();
    let entry = registry
        .entry(type_ref.name())
        .or_insert_with(|| Registered { type_ref, metadata });
    Ok(Arc::clone(&entry.metadata))
}

/// Eagerly register `T`, validating its declarations now.
pub fn register<T: EntityType>() -> Result<Arc<EntityMetadata>> {
    let metadata = metadata_for(EntityTypeRef::of::<T>())?;
    log::debug!("Registered entity type '{}'", T::TYPE_NAME);
    Ok(metadata)
}

/// Find a registered type by its name.
pub fn lookup_type(name: &str) -> Option<EntityTypeRef> {
    REGISTRY.read().get(name).map(|entry| entry.type_ref)
}

/// Metadata of every registered type, sorted by type name.
pub fn all_metadata() -> Vec<Arc<EntityMetadata>> {
    let registry = REGISTRY.read();
    let mut all: Vec<_> = registry.values().map(|e| Arc::clone(&e.metadata)).collect();
    all.sort_by_key(|m| m.type_name());
    all
}

/// Drop every cached entry.
pub fn clear_metadata() {
    REGISTRY.write().clear();
}
