//! The entity manager.
//!
//! [`EntityManager`] is the unit of work between the application and the
//! search index. `persist()` and `remove()` queue operations, `flush()` sends
//! them as one bulk request together with updates for every tracked entity
//! that changed since its last snapshot, and the `find*` family reads
//! documents back into entities.
//!
//! # Module Structure
//!
//! - `snapshot`: snapshot capture and diff
//! - `prepare`: entity to document conversion
//! - `relation`: relation resolution and graph validation
//! - `tracker`: pending operations and tracked entities
//! - `bulk`: the flush pipeline
//! - `hydrator`: document to entity conversion
//! - `query`: criteria translation
//!
//! # Example
//!
//! ```ignore
//! let mut manager = EntityManager::builder()
//!     .transport(Arc::new(MemoryTransport::new()))
//!     .listener_all(Arc::new(LoggingListener))
//!     .build()?;
//!
//! let order = shared(Order::new("ORD-1"));
//! manager.persist(&order)?;
//! manager.flush()?;
//! ```

pub mod bulk;
pub mod hydrator;
pub mod prepare;
pub mod query;
pub mod relation;
pub mod snapshot;
pub mod tracker;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::client::{ClientWrapper, QueryMetrics, Transport};
use crate::config::ManagerConfig;
use crate::entity::{EntityRef, EntityType, EntityTypeRef};
use crate::error::{OdmError, Result};
use crate::event::{EntityListener, EventDispatcher, LifecycleEvent};
use crate::metadata::{EntityMetadata, metadata_for};
use crate::validation::{NoopValidator, Validator};

pub use prepare::DocumentData;
pub use query::{Condition, Criteria, OrderBy, QueryOptions, SortDirection};
pub use snapshot::{ChangeSet, Snapshot};
pub use tracker::{OperationKind, PendingOperation};

use hydrator::Hydrator;
use prepare::Preparer;
use tracker::Tracker;

pub struct EntityManager {
    client: ClientWrapper,
    config: ManagerConfig,
    validator: Arc<dyn Validator>,
    events: EventDispatcher,
    tracker: Tracker,
}

impl EntityManager {
    /// A manager over `transport` with default settings.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            client: ClientWrapper::new(transport),
            config: ManagerConfig::default(),
            validator: Arc::new(NoopValidator),
            events: EventDispatcher::new(),
            tracker: Tracker::default(),
        }
    }

    pub fn builder() -> EntityManagerBuilder {
        EntityManagerBuilder::default()
    }

    /// Connect to the REST endpoint described by `config`.
    #[cfg(feature = "http")]
    pub fn connect(config: &crate::config::OdmConfig) -> Result<Self> {
        let transport = crate::client::HttpTransport::new(&config.client)?;
        Self::builder()
            .transport(Arc::new(transport))
            .config(config.manager.clone())
            .build()
    }

    pub fn client(&self) -> &ClientWrapper {
        &self.client
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Metrics of the last wire call.
    pub fn last_query_metrics(&self) -> Option<QueryMetrics> {
        self.client.last_query_metrics()
    }

    /// Operations queued for the next flush, in insertion order.
    pub fn pending_operations(&self) -> &[PendingOperation] {
        self.tracker.pending()
    }

    /// Number of entities under change detection. Entities the application
    /// dropped are only forgotten at the next flush.
    pub fn tracked_count(&self) -> usize {
        self.tracker.tracked_count()
    }

    fn preparer(&self) -> Preparer<'_> {
        Preparer::new(self.validator.as_ref(), self.config.max_relation_depth)
    }

    fn hydrator(&self) -> Hydrator<'_> {
        Hydrator::new(&self.client, self.config.max_relation_depth)
    }

    /// Queue `entity` for indexing and start tracking its changes.
    ///
    /// Persisting an entity whose `(index, id)` already has a pending index
    /// operation does nothing.
    pub fn persist(&mut self, entity: &EntityRef) -> Result<()> {
        let (metadata, index, id) = Self::locate(entity)?;

        if self.tracker.has_pending_index(&index, &id) {
            log::debug!("{index}/{id} already has a pending index operation");
            return Ok(());
        }

        let preparer = self.preparer();
        let (snapshot, data) = {
            let guard = entity.read();
            preparer.validate(&*guard, &metadata)?;
            let snapshot = Snapshot::capture(&*guard, &metadata);
            (snapshot, preparer.prepare(&*guard, &metadata)?)
        };

        let token = {
            let mut guard = entity.write();
            guard.set_pending_operation(true);
            guard.state_mut().ensure_tracking_token()
        };
        self.tracker.track(token, entity, snapshot, metadata);
        self.tracker
            .push(PendingOperation::index(index, id, data, Arc::clone(entity)));

        log::debug!("Queued index operation ({} pending)", self.tracker.pending().len());
        Ok(())
    }

    /// Queue a delete of `entity`'s document.
    pub fn remove(&mut self, entity: &EntityRef) -> Result<()> {
        let (_, index, id) = Self::locate(entity)?;

        entity.write().set_pending_operation(true);
        self.tracker
            .push(PendingOperation::delete(index, id, Arc::clone(entity)));

        log::debug!("Queued delete operation ({} pending)", self.tracker.pending().len());
        Ok(())
    }

    /// Metadata, index name and identifier of an entity about to be queued.
    fn locate(entity: &EntityRef) -> Result<(Arc<EntityMetadata>, String, String)> {
        let (type_ref, id) = {
            let guard = entity.read();
            (guard.entity_type(), guard.id().to_string())
        };
        let metadata = metadata_for(type_ref)?;
        let index = metadata.require_index()?.name().to_string();
        if id.is_empty() {
            return Err(OdmError::missing_identifier(type_ref.name()));
        }
        Ok((metadata, index, id))
    }

    /// Fetch the entity of type `T` stored under `id`.
    pub fn find<T: EntityType>(&self, id: &str) -> Result<Option<EntityRef>> {
        self.find_dyn(EntityTypeRef::of::<T>(), id)
    }

    pub fn find_dyn(&self, type_ref: EntityTypeRef, id: &str) -> Result<Option<EntityRef>> {
        self.hydrator().find(type_ref, id)
    }

    /// Entities of type `T` matching `criteria`.
    pub fn find_by<T: EntityType>(
        &self,
        criteria: &Criteria,
        order_by: &OrderBy,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<EntityRef>> {
        let type_ref = EntityTypeRef::of::<T>();
        let metadata = metadata_for(type_ref)?;
        let index = metadata.require_index()?;
        let body = query::search_body(&metadata, criteria, order_by, limit, offset)?;

        let response = self.client.search(index.name(), &body)?;
        let hydrator = self.hydrator();
        hits(&response)
            .into_iter()
            .filter_map(|hit| hydrator.hydrate_hit(type_ref, hit, true))
            .collect()
    }

    /// First entity of type `T` matching `criteria`.
    pub fn find_one_by<T: EntityType>(
        &self,
        criteria: &Criteria,
        order_by: &OrderBy,
    ) -> Result<Option<EntityRef>> {
        Ok(self
            .find_by::<T>(criteria, order_by, Some(1), None)?
            .into_iter()
            .next())
    }

    /// Run `aggregations` over the documents of `T` matching `criteria`.
    pub fn aggregate<T: EntityType>(
        &self,
        aggregations: Value,
        criteria: &Criteria,
    ) -> Result<Map<String, Value>> {
        let metadata = metadata_for(EntityTypeRef::of::<T>())?;
        let index = metadata.require_index()?;
        let mut body = Map::new();
        body.insert("query".to_string(), query::build_query(&metadata, criteria)?);
        body.insert("aggs".to_string(), aggregations);

        let mut response = self.client.search(index.name(), &Value::Object(body))?;
        match response.get_mut("aggregations").map(Value::take) {
            Some(Value::Object(aggregations)) => Ok(aggregations),
            _ => Err(OdmError::invalid_response(
                "SEARCH",
                "response carries no aggregations",
            )),
        }
    }

    /// Run a raw query body against the index of `T` and hydrate the hits.
    ///
    /// Hydrated entities are not marked persisted.
    pub fn execute_custom_query<T: EntityType>(
        &self,
        query: Value,
        options: &QueryOptions,
    ) -> Result<Vec<EntityRef>> {
        let type_ref = EntityTypeRef::of::<T>();
        let metadata = metadata_for(type_ref)?;
        let index = metadata.require_index()?;

        let hydrator = self.hydrator();
        self.raw_hits(index.name(), query, options)?
            .iter()
            .filter_map(|hit| hydrator.hydrate_hit(type_ref, hit, false))
            .collect()
    }

    /// Run a raw query body against `index`, returning hits that carry a
    /// `_source`.
    pub fn execute_raw_query(
        &self,
        index: &str,
        query: Value,
        options: &QueryOptions,
    ) -> Result<Vec<Value>> {
        self.raw_hits(index, query, options)
    }

    fn raw_hits(&self, index: &str, query: Value, options: &QueryOptions) -> Result<Vec<Value>> {
        let body = options.apply(query)?;
        let response = self.client.search(index, &body)?;
        Ok(hits(&response)
            .into_iter()
            .filter(|hit| hit.get("_source").is_some())
            .cloned()
            .collect())
    }

    /// Number of documents of `index` matching `query`.
    pub fn count_custom_query(&self, index: &str, query: &Value) -> Result<u64> {
        let response = self.client.count(index, query)?;
        response
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| OdmError::invalid_response("COUNT", "missing or non-integer count"))
    }

    /// Build a (not persisted) entity of type `T` from an arbitrary payload.
    pub fn hydrate_payload<T: EntityType>(&self, payload: &Map<String, Value>) -> Result<EntityRef> {
        self.hydrate_payload_dyn(EntityTypeRef::of::<T>(), payload)
    }

    pub fn hydrate_payload_dyn(
        &self,
        type_ref: EntityTypeRef,
        payload: &Map<String, Value>,
    ) -> Result<EntityRef> {
        self.hydrator().hydrate(type_ref, payload, false)
    }
}

fn hits(response: &Value) -> Vec<&Value> {
    response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(|hits| hits.iter().collect())
        .unwrap_or_default()
}

/// Builder for [`EntityManager`].
#[derive(Default)]
pub struct EntityManagerBuilder {
    transport: Option<Arc<dyn Transport>>,
    config: ManagerConfig,
    validator: Option<Arc<dyn Validator>>,
    events: EventDispatcher,
}

impl EntityManagerBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_relation_depth(mut self, depth: usize) -> Self {
        self.config.max_relation_depth = depth;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Subscribe `listener` to one lifecycle event.
    pub fn listener(mut self, event: LifecycleEvent, listener: Arc<dyn EntityListener>) -> Self {
        self.events.subscribe(event, listener);
        self
    }

    /// Subscribe `listener` to every lifecycle event.
    pub fn listener_all(mut self, listener: Arc<dyn EntityListener>) -> Self {
        self.events.subscribe_all(listener);
        self
    }

    pub fn build(self) -> Result<EntityManager> {
        let transport = self
            .transport
            .ok_or_else(|| OdmError::configuration("A transport is required"))?;
        Ok(EntityManager {
            client: ClientWrapper::new(transport),
            config: self.config,
            validator: self.validator.unwrap_or_else(|| Arc::new(NoopValidator)),
            events: self.events,
            tracker: Tracker::default(),
        })
    }
}
