//! Pending operations and tracked entities.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::{Map, Value, json};

use crate::entity::{Entity, EntityRef, TrackingToken};
use crate::event::LifecycleEvent;
use crate::metadata::EntityMetadata;

use super::prepare::DocumentData;
use super::snapshot::Snapshot;

/// What a pending operation does to its document.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    /// Create or replace the whole document.
    Index { data: DocumentData },
    /// Apply a partial document made of the changed fields.
    Update { changes: DocumentData },
    Delete,
}

/// One queued bulk action, holding its originating entity.
#[derive(Clone)]
pub struct PendingOperation {
    index: String,
    id: String,
    kind: OperationKind,
    entity: EntityRef,
}

impl PendingOperation {
    pub(crate) fn index(index: String, id: String, data: DocumentData, entity: EntityRef) -> Self {
        Self {
            index,
            id,
            kind: OperationKind::Index { data },
            entity,
        }
    }

    pub(crate) fn update(index: String, id: String, changes: DocumentData, entity: EntityRef) -> Self {
        Self {
            index,
            id,
            kind: OperationKind::Update { changes },
            entity,
        }
    }

    pub(crate) fn delete(index: String, id: String, entity: EntityRef) -> Self {
        Self {
            index,
            id,
            kind: OperationKind::Delete,
            entity,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Bulk action name: `index`, `update` or `delete`.
    pub fn action(&self) -> &'static str {
        match self.kind {
            OperationKind::Index { .. } => "index",
            OperationKind::Update { .. } => "update",
            OperationKind::Delete => "delete",
        }
    }

    pub(crate) fn pre_event(&self) -> LifecycleEvent {
        match self.kind {
            OperationKind::Index { .. } => LifecycleEvent::PrePersist,
            OperationKind::Update { .. } => LifecycleEvent::PreUpdate,
            OperationKind::Delete => LifecycleEvent::PreRemove,
        }
    }

    pub(crate) fn post_event(&self) -> LifecycleEvent {
        match self.kind {
            OperationKind::Index { .. } => LifecycleEvent::PostPersist,
            OperationKind::Update { .. } => LifecycleEvent::PostUpdate,
            OperationKind::Delete => LifecycleEvent::PostRemove,
        }
    }

    /// Append the action header and, except for deletes, the payload line.
    pub(crate) fn encode_into(&self, body: &mut Vec<Value>) {
        let mut header = Map::new();
        header.insert(
            self.action().to_string(),
            json!({"_index": self.index, "_id": self.id}),
        );
        body.push(Value::Object(header));

        match &self.kind {
            OperationKind::Index { data } => body.push(Value::Object(data.clone())),
            OperationKind::Update { changes } => body.push(json!({ "doc": changes })),
            OperationKind::Delete => {}
        }
    }

    fn is_index_of(&self, index: &str, id: &str) -> bool {
        matches!(self.kind, OperationKind::Index { .. }) && self.index == index && self.id == id
    }
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingOperation")
            .field("action", &self.action())
            .field("index", &self.index)
            .field("id", &self.id)
            .finish()
    }
}

pub(crate) struct TrackedEntity {
    entity: Weak<RwLock<dyn Entity>>,
    pub(crate) snapshot: Snapshot,
    pub(crate) metadata: Arc<EntityMetadata>,
}

impl TrackedEntity {
    pub(crate) fn upgrade(&self) -> Option<EntityRef> {
        self.entity.upgrade()
    }
}

/// Insertion-ordered queue of pending operations plus the set of entities
/// under change detection, keyed by tracking token.
#[derive(Default)]
pub(crate) struct Tracker {
    tracked: BTreeMap<TrackingToken, TrackedEntity>,
    pending: Vec<PendingOperation>,
}

impl Tracker {
    /// Nothing tracked and nothing queued.
    pub(crate) fn is_idle(&self) -> bool {
        self.tracked.is_empty() && self.pending.is_empty()
    }

    pub(crate) fn has_pending_index(&self, index: &str, id: &str) -> bool {
        self.pending.iter().any(|op| op.is_index_of(index, id))
    }

    pub(crate) fn track(
        &mut self,
        token: TrackingToken,
        entity: &EntityRef,
        snapshot: Snapshot,
        metadata: Arc<EntityMetadata>,
    ) {
        self.tracked.insert(
            token,
            TrackedEntity {
                entity: Arc::downgrade(entity),
                snapshot,
                metadata,
            },
        );
    }

    pub(crate) fn push(&mut self, operation: PendingOperation) {
        self.pending.push(operation);
    }

    pub(crate) fn pending(&self) -> &[PendingOperation] {
        &self.pending
    }

    pub(crate) fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub(crate) fn tracked(&self) -> impl Iterator<Item = (&TrackingToken, &TrackedEntity)> {
        self.tracked.iter()
    }

    pub(crate) fn refresh_snapshot(&mut self, token: TrackingToken, snapshot: Snapshot) {
        if let Some(tracked) = self.tracked.get_mut(&token) {
            tracked.snapshot = snapshot;
        }
    }

    /// Forget entities the application no longer references.
    ///
    /// Returns how many were dropped.
    pub(crate) fn prune(&mut self) -> usize {
        let before = self.tracked.len();
        self.tracked.retain(|_, tracked| tracked.entity.strong_count() > 0);
        before - self.tracked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::shared;
    use crate::testing::Note;

    fn index_op(id: &str) -> PendingOperation {
        let mut data = Map::new();
        data.insert("title".to_string(), json!("t"));
        PendingOperation::index("notes".into(), id.into(), data, shared(Note::with_id(id)))
    }

    #[test]
    fn test_encoding_pairs_headers_and_payloads() {
        let entity = shared(Note::with_id("2"));
        let mut changes = Map::new();
        changes.insert("views".to_string(), json!(4));

        let mut body = Vec::new();
        index_op("1").encode_into(&mut body);
        PendingOperation::delete("notes".into(), "3".into(), entity.clone()).encode_into(&mut body);
        PendingOperation::update("notes".into(), "2".into(), changes, entity).encode_into(&mut body);

        assert_eq!(
            body,
            vec![
                json!({"index": {"_index": "notes", "_id": "1"}}),
                json!({"title": "t"}),
                json!({"delete": {"_index": "notes", "_id": "3"}}),
                json!({"update": {"_index": "notes", "_id": "2"}}),
                json!({"doc": {"views": 4}}),
            ]
        );
    }

    #[test]
    fn test_pending_index_lookup() {
        let mut tracker = Tracker::default();
        assert!(tracker.is_idle());
        tracker.push(index_op("1"));
        assert!(tracker.has_pending_index("notes", "1"));
        assert!(!tracker.has_pending_index("notes", "2"));
        assert!(!tracker.has_pending_index("other", "1"));
    }

    #[test]
    fn test_prune_drops_released_entities() {
        let mut tracker = Tracker::default();
        let kept = shared(Note::with_id("kept"));
        let released = shared(Note::with_id("released"));
        let metadata = Arc::new(EntityMetadata::builder("Note").build().unwrap());

        let token_a = kept.write().state_mut().ensure_tracking_token();
        let token_b = released.write().state_mut().ensure_tracking_token();
        tracker.track(token_a, &kept, Snapshot::default(), Arc::clone(&metadata));
        tracker.track(token_b, &released, Snapshot::default(), metadata);
        drop(released);

        assert_eq!(tracker.prune(), 1);
        assert_eq!(tracker.tracked_count(), 1);
        assert!(!tracker.is_idle());
    }
}
