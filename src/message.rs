//! Entity change messages.
//!
//! An [`EntityMessage`] describes a create, update or delete of an entity
//! named by its registered type name, as received from a queue or another
//! service. [`MessageHandler`] applies it through an [`EntityManager`] and
//! flushes immediately.
//!
//! ```json
//! {"action": "create", "entity_type": "Order", "id": "ORD-1", "payload": {"order_number": "1"}}
//! {"action": "delete", "entity_type": "Order", "id": "ORD-1"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::EntityTypeRef;
use crate::error::{OdmError, Result};
use crate::manager::EntityManager;
use crate::metadata::lookup_type;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum EntityMessage {
    Create {
        entity_type: String,
        id: String,
        #[serde(default)]
        payload: Map<String, Value>,
    },
    Update {
        entity_type: String,
        id: String,
        #[serde(default)]
        payload: Map<String, Value>,
    },
    Delete {
        entity_type: String,
        id: String,
    },
}

impl EntityMessage {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entity_type(&self) -> &str {
        match self {
            EntityMessage::Create { entity_type, .. }
            | EntityMessage::Update { entity_type, .. }
            | EntityMessage::Delete { entity_type, .. } => entity_type,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityMessage::Create { id, .. }
            | EntityMessage::Update { id, .. }
            | EntityMessage::Delete { id, .. } => id,
        }
    }
}

/// Applies [`EntityMessage`]s to the index.
///
/// Entity types must be registered (see [`register`](crate::register)) to be
/// addressable by name.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageHandler;

impl MessageHandler {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, manager: &mut EntityManager, message: &EntityMessage) -> Result<()> {
        let type_ref = resolve_type(message.entity_type())?;
        log::debug!(
            "Handling {} message for {}#{}",
            action_name(message),
            type_ref.name(),
            message.id()
        );

        match message {
            EntityMessage::Create { id, payload, .. } | EntityMessage::Update { id, payload, .. } => {
                let entity = manager.hydrate_payload_dyn(type_ref, payload)?;
                entity.write().set_id(id.clone());
                manager.persist(&entity)?;
                manager.flush()
            }
            EntityMessage::Delete { id, .. } => match manager.find_dyn(type_ref, id)? {
                Some(entity) => {
                    manager.remove(&entity)?;
                    manager.flush()
                }
                None => {
                    log::debug!("{}#{id} not found, nothing to delete", type_ref.name());
                    Ok(())
                }
            },
        }
    }
}

fn resolve_type(name: &str) -> Result<EntityTypeRef> {
    lookup_type(name).ok_or_else(|| {
        OdmError::not_an_entity(format!("'{name}' is not a registered entity type"))
    })
}

fn action_name(message: &EntityMessage) -> &'static str {
    match message {
        EntityMessage::Create { .. } => "create",
        EntityMessage::Update { .. } => "update",
        EntityMessage::Delete { .. } => "delete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_format() {
        let message = EntityMessage::from_json(
            r#"{"action": "update", "entity_type": "Note", "id": "n1", "payload": {"title": "t"}}"#,
        )
        .unwrap();
        assert_eq!(message.entity_type(), "Note");
        assert_eq!(message.id(), "n1");
        assert!(matches!(message, EntityMessage::Update { ref payload, .. } if payload["title"] == json!("t")));

        let delete = EntityMessage::from_json(r#"{"action": "delete", "entity_type": "Note", "id": "n1"}"#)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&delete).unwrap(),
            json!({"action": "delete", "entity_type": "Note", "id": "n1"})
        );
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(EntityMessage::from_json(r#"{"action": "upsert", "entity_type": "Note", "id": "n1"}"#).is_err());
    }

    #[test]
    fn test_unknown_type_is_not_an_entity() {
        let mut manager = EntityManager::new(std::sync::Arc::new(crate::client::MemoryTransport::new()));
        let message = EntityMessage::Delete {
            entity_type: "NeverRegistered".to_string(),
            id: "1".to_string(),
        };
        assert!(matches!(
            MessageHandler::new().handle(&mut manager, &message),
            Err(OdmError::NotAnEntity(_))
        ));
    }
}
