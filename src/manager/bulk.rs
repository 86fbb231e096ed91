//! The flush pipeline.
//!
//! `flush()` turns the pending queue, plus an update for every tracked entity
//! that changed since its snapshot, into a single bulk request. Lifecycle
//! flags are updated optimistically: pending flags are cleared as operations
//! are encoded, before the request is sent.

use serde_json::{Map, Value};

use crate::error::Result;
use crate::manager::EntityManager;
use crate::manager::snapshot::Snapshot;
use crate::manager::tracker::{OperationKind, PendingOperation};

impl EntityManager {
    /// Send every pending operation in one bulk request.
    ///
    /// When the request itself fails the queue is kept, so a later `flush()`
    /// resends it. Item-level failures reported by the engine are only
    /// logged.
    pub fn flush(&mut self) -> Result<()> {
        // 1. Nothing to do
        if self.tracker.is_idle() {
            return Ok(());
        }

        // 2. Forget entities the application released
        let released = self.tracker.prune();
        if released > 0 {
            log::warn!("{released} tracked entities were released before flush and are no longer tracked");
        }

        // 3. Detect changes on tracked entities
        self.detect_changes()?;
        if self.tracker.pending().is_empty() {
            return Ok(());
        }

        // 4. Encode, firing pre events in queue order
        let operations = self.tracker.pending().to_vec();
        let mut body = Vec::with_capacity(operations.len() * 2);
        for operation in &operations {
            self.events.dispatch(operation.pre_event(), operation.entity());
            operation.encode_into(&mut body);
            operation.entity().write().set_pending_operation(false);
        }

        // 5. One bulk call
        let response = self.client.bulk(&body)?;
        if response.get("errors").and_then(Value::as_bool).unwrap_or(false) {
            log::warn!("Bulk request reported item errors; item results are not inspected");
        }

        // 6. Update flags and fire post events
        for operation in &operations {
            {
                let mut entity = operation.entity().write();
                match operation.kind() {
                    OperationKind::Index { .. } => entity.set_persisted(true),
                    OperationKind::Delete => entity.set_persisted(false),
                    OperationKind::Update { .. } => {
                        entity.set_persisted(true);
                        entity.set_modified(false);
                    }
                }
            }
            self.events.dispatch(operation.post_event(), operation.entity());
        }

        // 7. Reset the queue
        self.tracker.clear_pending();
        log::debug!(
            "Flushed {} operations ({} tracked entities)",
            operations.len(),
            self.tracker.tracked_count()
        );
        Ok(())
    }

    /// Queue an update for every tracked entity whose declared fields differ
    /// from its snapshot, and refresh all snapshots.
    ///
    /// Every update is prepared before any tracker state changes, so a
    /// failure leaves snapshots and queue untouched.
    fn detect_changes(&mut self) -> Result<()> {
        let preparer = self.preparer();
        let mut refreshed = Vec::new();
        let mut updates = Vec::new();

        for (token, tracked) in self.tracker.tracked() {
            let Some(entity) = tracked.upgrade() else {
                continue;
            };
            let metadata = &tracked.metadata;
            let guard = entity.read();
            let changes = tracked.snapshot.diff(&*guard, metadata);
            refreshed.push((*token, Snapshot::capture(&*guard, metadata)));
            if changes.is_empty() {
                continue;
            }

            let index = metadata.require_index()?.name().to_string();
            let mut doc = Map::new();
            for (name, value) in changes {
                if let Some(field) = metadata.field(&name) {
                    doc.insert(name.clone(), preparer.prepare_value(metadata, field, value)?);
                }
            }
            log::trace!("{}#{} changed: {:?}", metadata.type_name(), guard.id(), doc.keys());

            let id = guard.id().to_string();
            drop(guard);
            updates.push(PendingOperation::update(index, id, doc, entity));
        }

        for (token, snapshot) in refreshed {
            self.tracker.refresh_snapshot(token, snapshot);
        }
        for update in updates {
            update.entity().write().set_modified(true);
            self.tracker.push(update);
        }
        Ok(())
    }
}
