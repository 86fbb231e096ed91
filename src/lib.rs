//! # Elastic ODM
//!
//! An object-document mapper for Elasticsearch-compatible search indexes.
//!
//! ## Features
//!
//! - Explicit entity declarations (index settings, field types, analyzers)
//! - Snapshot-based change tracking with partial-document updates
//! - Nested and reference relations, resolved recursively
//! - One bulk request per flush, with lifecycle notifications
//! - Criteria queries, custom queries, counts and aggregations
//! - Pluggable wire transport (in-memory, or blocking HTTP with the `http` feature)

pub mod client;
pub mod config;
pub mod entity;
mod error;
pub mod event;
pub mod manager;
pub mod message;
pub mod metadata;
pub mod validation;
mod value;

#[cfg(test)]
mod testing;

// Re-exports for the public API
pub use client::{ClientWrapper, MemoryTransport, QueryMetrics, Transport, TransportFailure};
#[cfg(feature = "http")]
pub use client::HttpTransport;
pub use config::{ClientConfig, ManagerConfig, OdmConfig};
pub use entity::{
    Entity, EntityRef, EntityState, EntityType, EntityTypeRef, TrackingToken, generate_id,
    shared, with_entity, with_entity_mut,
};
pub use error::{OdmError, Result};
pub use event::{EntityListener, EventDispatcher, LifecycleEvent, LoggingListener};
pub use manager::{
    ChangeSet, Condition, Criteria, DocumentData, EntityManager, EntityManagerBuilder,
    OperationKind, OrderBy, PendingOperation, QueryOptions, Snapshot, SortDirection,
};
pub use message::{EntityMessage, MessageHandler};
pub use metadata::{
    EntityMetadata, FieldDeclaration, FieldType, IndexDescriptor, RelationDescriptor,
    RelationKind, all_metadata, clear_metadata, lookup_type, register,
};
pub use validation::{ConstraintViolation, NoopValidator, Validator};
pub use value::FieldValue;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
