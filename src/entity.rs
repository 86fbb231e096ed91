//! Entity capability set.
//!
//! An entity is an application type mapped to one index document. Instead of
//! discovering fields at runtime, each type exposes an explicit getter/setter
//! table ([`Entity::field_value`] / [`Entity::set_field_value`]) and a
//! statically declared [`EntityMetadata`] ([`EntityType::metadata`]).
//!
//! Entities are shared between the application and the
//! [`EntityManager`](crate::EntityManager) through [`EntityRef`] handles: the
//! application keeps mutating its entity after `persist()`, and the manager
//! picks those mutations up at the next `flush()`.
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//!
//! use elastic_odm::{
//!     Entity, EntityMetadata, EntityState, EntityType, EntityTypeRef, FieldDeclaration,
//!     FieldType, FieldValue, IndexDescriptor, Result,
//! };
//!
//! #[derive(Debug, Default)]
//! struct Tag {
//!     id: String,
//!     state: EntityState,
//!     label: Option<String>,
//! }
//!
//! impl Entity for Tag {
//!     fn entity_type(&self) -> EntityTypeRef {
//!         EntityTypeRef::of::<Self>()
//!     }
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!     fn set_id(&mut self, id: String) {
//!         self.id = id;
//!     }
//!     fn state(&self) -> &EntityState {
//!         &self.state
//!     }
//!     fn state_mut(&mut self) -> &mut EntityState {
//!         &mut self.state
//!     }
//!     fn field_value(&self, field: &str) -> Option<FieldValue> {
//!         match field {
//!             "label" => self.label.clone().map(FieldValue::from),
//!             _ => None,
//!         }
//!     }
//!     fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool> {
//!         match field {
//!             "label" => self.label = value.into_optional()?,
//!             _ => return Ok(false),
//!         }
//!         Ok(true)
//!     }
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//!     fn as_any_mut(&mut self) -> &mut dyn Any {
//!         self
//!     }
//! }
//!
//! impl EntityType for Tag {
//!     const TYPE_NAME: &'static str = "Tag";
//!
//!     fn metadata() -> Result<EntityMetadata> {
//!         EntityMetadata::builder(Self::TYPE_NAME)
//!             .index(IndexDescriptor::new("tags"))
//!             .field(FieldDeclaration::new("label", FieldType::Keyword))
//!             .build()
//!     }
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Result;
use crate::metadata::EntityMetadata;
use crate::value::FieldValue;

/// Shared handle to an entity instance.
pub type EntityRef = Arc<RwLock<dyn Entity>>;

/// Wrap an entity into a shared handle.
pub fn shared<E: Entity>(entity: E) -> EntityRef {
    Arc::new(RwLock::new(entity))
}

/// Generate a unique identifier suitable for a new entity.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

static NEXT_TRACKING_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque per-instance token under which the manager tracks an entity.
///
/// Tokens are issued on first `persist()` and never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackingToken(u64);

impl TrackingToken {
    fn issue() -> Self {
        TrackingToken(NEXT_TRACKING_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Bookkeeping carried by every entity.
///
/// None of these values take part in change detection or documents.
#[derive(Debug, Default)]
pub struct EntityState {
    persisted: bool,
    modified: bool,
    pending_operation: bool,
    tracking: Option<TrackingToken>,
}

impl EntityState {
    pub fn tracking_token(&self) -> Option<TrackingToken> {
        self.tracking
    }

    /// Returns the tracking token, issuing one on first use.
    pub(crate) fn ensure_tracking_token(&mut self) -> TrackingToken {
        *self.tracking.get_or_insert_with(TrackingToken::issue)
    }
}

impl Clone for EntityState {
    /// A clone is a distinct instance: it keeps the flags but not the token.
    fn clone(&self) -> Self {
        Self {
            tracking: None,
            ..*self
        }
    }
}

/// The capability set every mapped type provides.
pub trait Entity: Any + Send + Sync {
    /// Descriptor of this entity's type.
    fn entity_type(&self) -> EntityTypeRef;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn state(&self) -> &EntityState;

    fn state_mut(&mut self) -> &mut EntityState;

    /// Current value of a declared field.
    ///
    /// Returns `None` when the field was never materialized (an unset
    /// optional value); such fields are left out of snapshots and documents.
    fn field_value(&self, field: &str) -> Option<FieldValue>;

    /// Assign a field from hydrated data.
    ///
    /// Returns `Ok(false)` when the type has no setter for `field`.
    fn set_field_value(&mut self, field: &str, value: FieldValue) -> Result<bool>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn is_persisted(&self) -> bool {
        self.state().persisted
    }

    fn set_persisted(&mut self, persisted: bool) {
        self.state_mut().persisted = persisted;
    }

    fn is_modified(&self) -> bool {
        self.state().modified
    }

    fn set_modified(&mut self, modified: bool) {
        self.state_mut().modified = modified;
    }

    fn has_pending_operation(&self) -> bool {
        self.state().pending_operation
    }

    fn set_pending_operation(&mut self, pending: bool) {
        self.state_mut().pending_operation = pending;
    }
}

impl fmt::Debug for dyn Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type().name(), self.id())
    }
}

/// A concrete entity type with statically declared metadata.
pub trait EntityType: Entity + Default + Sized {
    /// Name under which the type is registered and reported in errors.
    const TYPE_NAME: &'static str;

    /// Index descriptor and field declarations of this type.
    fn metadata() -> Result<EntityMetadata>;
}

/// Copyable, type-erased descriptor of an [`EntityType`].
///
/// Relation declarations point at their target type through this descriptor,
/// which is what lets the hydrator instantiate related entities by type.
#[derive(Clone, Copy)]
pub struct EntityTypeRef {
    name: &'static str,
    metadata: fn() -> Result<EntityMetadata>,
    create: fn() -> EntityRef,
}

fn create_blank<T: EntityType>() -> EntityRef {
    shared(T::default())
}

impl EntityTypeRef {
    pub fn of<T: EntityType>() -> Self {
        Self {
            name: T::TYPE_NAME,
            metadata: T::metadata,
            create: create_blank::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build the declared metadata of this type (uncached).
    pub(crate) fn load_metadata(&self) -> Result<EntityMetadata> {
        (self.metadata)()
    }

    /// Instantiate a blank entity of this type.
    pub fn create(&self) -> EntityRef {
        (self.create)()
    }
}

impl PartialEq for EntityTypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EntityTypeRef {}

impl fmt::Debug for EntityTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityTypeRef").field(&self.name).finish()
    }
}

/// Run `f` against the concrete type behind an entity handle.
///
/// Returns `None` when the entity is not a `T`.
pub fn with_entity<T: Entity, R>(entity: &EntityRef, f: impl FnOnce(&T) -> R) -> Option<R> {
    let guard = entity.read();
    guard.as_any().downcast_ref::<T>().map(f)
}

/// Mutable counterpart of [`with_entity`].
pub fn with_entity_mut<T: Entity, R>(
    entity: &EntityRef,
    f: impl FnOnce(&mut T) -> R,
) -> Option<R> {
    let mut guard = entity.write();
    guard.as_any_mut().downcast_mut::<T>().map(f)
}
