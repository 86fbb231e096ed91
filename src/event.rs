//! Lifecycle notifications.
//!
//! During `flush()` the manager dispatches a `pre_*` event for every operation
//! as it is encoded, and the matching `post_*` event once the bulk call has
//! returned. Events are delivered synchronously, in encoding order, and no
//! entity lock is held while a listener runs.

use std::fmt;
use std::sync::Arc;

use crate::entity::EntityRef;

/// The six lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    PrePersist,
    PostPersist,
    PreUpdate,
    PostUpdate,
    PreRemove,
    PostRemove,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 6] = [
        LifecycleEvent::PrePersist,
        LifecycleEvent::PostPersist,
        LifecycleEvent::PreUpdate,
        LifecycleEvent::PostUpdate,
        LifecycleEvent::PreRemove,
        LifecycleEvent::PostRemove,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::PrePersist => "pre_persist",
            LifecycleEvent::PostPersist => "post_persist",
            LifecycleEvent::PreUpdate => "pre_update",
            LifecycleEvent::PostUpdate => "post_update",
            LifecycleEvent::PreRemove => "pre_remove",
            LifecycleEvent::PostRemove => "post_remove",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives lifecycle notifications.
pub trait EntityListener: Send + Sync {
    fn on_event(&self, event: LifecycleEvent, entity: &EntityRef);
}

impl<F> EntityListener for F
where
    F: Fn(LifecycleEvent, &EntityRef) + Send + Sync,
{
    fn on_event(&self, event: LifecycleEvent, entity: &EntityRef) {
        self(event, entity)
    }
}

/// Logs every notification at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl EntityListener for LoggingListener {
    fn on_event(&self, event: LifecycleEvent, entity: &EntityRef) {
        let entity = entity.read_recursive();
        log::debug!("{event}: {}#{}", entity.entity_type().name(), entity.id());
    }
}

/// Routes notifications to subscribed listeners in subscription order.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    listeners: Vec<(Option<LifecycleEvent>, Arc<dyn EntityListener>)>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `listener` to a single event.
    pub fn subscribe(&mut self, event: LifecycleEvent, listener: Arc<dyn EntityListener>) {
        self.listeners.push((Some(event), listener));
    }

    /// Subscribe `listener` to every event.
    pub fn subscribe_all(&mut self, listener: Arc<dyn EntityListener>) {
        self.listeners.push((None, listener));
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&self, event: LifecycleEvent, entity: &EntityRef) {
        for (filter, listener) in &self.listeners {
            if filter.is_none_or(|e| e == event) {
                listener.on_event(event, entity);
            }
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityState, EntityTypeRef, shared};
    use crate::entity::{Entity, EntityType};
    use crate::error::Result;
    use crate::metadata::EntityMetadata;
    use crate::value::FieldValue;
    use parking_lot::Mutex;
    use std::any::Any;

    #[derive(Default)]
    struct Probe {
        state: EntityState,
    }

    impl Entity for Probe {
        fn entity_type(&self) -> EntityTypeRef {
            EntityTypeRef::of::<Self>()
        }
        fn id(&self) -> &str {
            "probe"
        }
        fn set_id(&mut self, _id: String) {}
        fn state(&self) -> &EntityState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut EntityState {
            &mut self.state
        }
        fn field_value(&self, _field: &str) -> Option<FieldValue> {
            None
        }
        fn set_field_value(&mut self, _field: &str, _value: FieldValue) -> Result<bool> {
            Ok(false)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    impl EntityType for Probe {
        const TYPE_NAME: &'static str = "Probe";
        fn metadata() -> Result<EntityMetadata> {
            EntityMetadata::builder(Self::TYPE_NAME).build()
        }
    }

    #[test]
    fn test_filtered_and_catch_all_subscriptions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();

        let log = Arc::clone(&seen);
        dispatcher.subscribe(
            LifecycleEvent::PostRemove,
            Arc::new(move |e: LifecycleEvent, _: &EntityRef| log.lock().push(format!("only:{e}"))),
        );
        let log = Arc::clone(&seen);
        dispatcher.subscribe_all(Arc::new(move |e: LifecycleEvent, _: &EntityRef| {
            log.lock().push(format!("all:{e}"))
        }));

        let entity = shared(Probe::default());
        dispatcher.dispatch(LifecycleEvent::PrePersist, &entity);
        dispatcher.dispatch(LifecycleEvent::PostRemove, &entity);

        assert_eq!(
            *seen.lock(),
            vec!["all:pre_persist", "only:post_remove", "all:post_remove"]
        );
    }

    #[test]
    fn test_event_names() {
        let names: Vec<_> = LifecycleEvent::ALL.iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            [
                "pre_persist",
                "post_persist",
                "pre_update",
                "post_update",
                "pre_remove",
                "post_remove"
            ]
        );
    }
}
