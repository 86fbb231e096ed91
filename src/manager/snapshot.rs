//! Snapshot capture and diffing.
//!
//! A [`Snapshot`] holds the materialized declared fields of an entity at one
//! point in time. Values are owned copies, so mutating the entity afterwards
//! never alters a snapshot. Related entities are held by handle and compare
//! by identity: replacing a related entity is a change, mutating it in place
//! is not (that entity's own snapshot covers it).

use crate::entity::Entity;
use crate::metadata::EntityMetadata;
use crate::value::FieldValue;

/// Captured field values, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: Vec<(String, FieldValue)>,
}

/// Fields whose current value differs from the snapshot, in declaration order.
pub type ChangeSet = Vec<(String, FieldValue)>;

impl Snapshot {
    /// Capture every declared, materialized field of `entity`.
    pub fn capture(entity: &dyn Entity, metadata: &EntityMetadata) -> Self {
        let values = metadata
            .fields()
            .iter()
            .filter_map(|field| {
                entity
                    .field_value(field.name())
                    .map(|value| (field.name().to_string(), value))
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fields of `entity` that differ from this snapshot.
    ///
    /// A field that was unset and is now set is a change; a field that is
    /// now unset is not reported.
    pub fn diff(&self, entity: &dyn Entity, metadata: &EntityMetadata) -> ChangeSet {
        metadata
            .fields()
            .iter()
            .filter_map(|field| {
                let current = entity.field_value(field.name())?;
                match self.get(field.name()) {
                    Some(previous) if *previous == current => None,
                    _ => Some((field.name().to_string(), current)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityType, shared};
    use crate::testing::{Author, Note};

    #[test]
    fn test_capture_skips_unset_fields() {
        let note = Note::with_id("n1").set("title", "t").set("views", 3);
        let snapshot = Snapshot::capture(&note, &Note::metadata().unwrap());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("views"), Some(&FieldValue::Integer(3)));
        assert_eq!(snapshot.get("tags"), None);
    }

    #[test]
    fn test_diff_reports_changed_and_newly_set_fields() {
        let metadata = Note::metadata().unwrap();
        let before = Note::with_id("n1").set("title", "t").set("views", 3);
        let snapshot = Snapshot::capture(&before, &metadata);

        assert!(snapshot.diff(&before, &metadata).is_empty());

        let after = Note::with_id("n1").set("title", "t").set("views", 4).set("tags", "x");
        assert_eq!(
            snapshot.diff(&after, &metadata),
            vec![
                ("views".to_string(), FieldValue::Integer(4)),
                ("tags".to_string(), FieldValue::from("x")),
            ]
        );

        // Unset fields are not reported.
        let cleared = Note::with_id("n1").set("title", "t");
        assert!(snapshot.diff(&cleared, &metadata).is_empty());
    }

    #[test]
    fn test_values_are_compared_strictly() {
        let metadata = Note::metadata().unwrap();
        let snapshot = Snapshot::capture(&Note::with_id("n1").set("views", 1), &metadata);
        let changed = Note::with_id("n1").set("views", "1");
        assert_eq!(snapshot.diff(&changed, &metadata).len(), 1);
    }

    #[test]
    fn test_related_entities_compare_by_identity() {
        let metadata = Note::metadata().unwrap();
        let author = shared(Author::with_id("a1"));
        let note = Note::with_id("n1").set("author", author.clone());
        let snapshot = Snapshot::capture(&note, &metadata);

        // Same instance, mutated in place: not a change for the owner.
        author.write().set_id("a2".to_string());
        assert!(snapshot.diff(&note, &metadata).is_empty());

        // A different instance with the same id is a change.
        let replaced = Note::with_id("n1").set("author", shared(Author::with_id("a2")));
        assert_eq!(snapshot.diff(&replaced, &metadata).len(), 1);
    }
}
