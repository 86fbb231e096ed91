//! Relation resolution and graph validation.
//!
//! A related entity is validated, then stored either as its identifier
//! (reference relations) or as its own fully prepared document (nested
//! relations). Collections are resolved element by element; elements that
//! are not entities are dropped, as are referenced entities that have no
//! identifier yet.
//!
//! Validation visits each entity of a graph once, so references that loop
//! back (an author whose favorite note points at that author) are fine.
//! Every step into a related entity still counts towards the manager's
//! `max_relation_depth`, which turns a cycle of nested documents into
//! [`OdmError::RelationDepthExceeded`] instead of unbounded recursion.

use std::collections::HashSet;

use serde_json::Value;

use crate::entity::{Entity, EntityRef};
use crate::error::{OdmError, Result};
use crate::metadata::{EntityMetadata, RelationDescriptor, RelationKind, metadata_for};
use crate::validation::violations_error;
use crate::value::FieldValue;

use super::prepare::Preparer;

/// Entity instances already validated during one traversal.
type Visited = HashSet<*const ()>;

fn address(entity: &dyn Entity) -> *const () {
    entity as *const dyn Entity as *const ()
}

impl Preparer<'_> {
    /// Validate `entity` and, recursively, the entities held in its relation
    /// fields.
    pub(crate) fn validate(&self, entity: &dyn Entity, metadata: &EntityMetadata) -> Result<()> {
        self.validate_at(entity, metadata, 0, &mut Visited::new())
    }

    fn validate_at(
        &self,
        entity: &dyn Entity,
        metadata: &EntityMetadata,
        depth: usize,
        visited: &mut Visited,
    ) -> Result<()> {
        visited.insert(address(entity));
        let violations = self.validator.validate(entity);
        if !violations.is_empty() {
            return Err(violations_error(&violations));
        }

        for field in metadata.fields().iter().filter(|f| f.is_relation()) {
            let Some(value) = entity.field_value(field.name()) else {
                continue;
            };
            for related in value.into_entities() {
                let related = related.read_recursive();
                if visited.contains(&address(&*related)) {
                    continue;
                }
                let next = self.descend(metadata, depth)?;
                let related_metadata = metadata_for(related.entity_type())?;
                self.validate_at(&*related, &related_metadata, next, visited)?;
            }
        }
        Ok(())
    }

    /// Resolve the value of a relation field.
    pub(super) fn resolve_field(
        &self,
        owner: &EntityMetadata,
        field: &str,
        relation: &RelationDescriptor,
        value: FieldValue,
        depth: usize,
    ) -> Result<Value> {
        match value {
            FieldValue::Null => Ok(Value::Null),
            FieldValue::Entity(related) => self
                .resolve(owner, field, relation, &related, depth)?
                .ok_or_else(|| {
                    OdmError::invalid_relation(
                        owner.type_name(),
                        field,
                        format!("related '{}' entity has no identifier", relation.target().name()),
                    )
                }),
            FieldValue::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    if let FieldValue::Entity(related) = item {
                        if let Some(value) = self.resolve(owner, field, relation, &related, depth)? {
                            resolved.push(value);
                        }
                    }
                }
                Ok(Value::Array(resolved))
            }
            other => Err(OdmError::not_an_entity(format!(
                "field '{field}' of '{}' holds a {} value where a '{}' entity is expected",
                owner.type_name(),
                other.kind(),
                relation.target().name()
            ))),
        }
    }

    /// Resolve one related entity into an identifier or a nested document.
    ///
    /// Returns `None` for a referenced entity without an identifier.
    fn resolve(
        &self,
        owner: &EntityMetadata,
        field: &str,
        relation: &RelationDescriptor,
        related: &EntityRef,
        depth: usize,
    ) -> Result<Option<Value>> {
        let next = self.descend(owner, depth)?;
        let related = related.read_recursive();

        let target = relation.target();
        if related.entity_type() != target {
            return Err(OdmError::invalid_relation(
                owner.type_name(),
                field,
                format!(
                    "expected a '{}' entity, found '{}'",
                    target.name(),
                    related.entity_type().name()
                ),
            ));
        }

        let metadata = metadata_for(target)?;
        self.validate_at(&*related, &metadata, next, &mut Visited::new())?;

        match relation.kind() {
            RelationKind::Reference => {
                let id = related.id();
                Ok((!id.is_empty()).then(|| Value::String(id.to_string())))
            }
            RelationKind::Nested => Ok(Some(Value::Object(
                self.prepare_at(&*related, &metadata, next)?,
            ))),
        }
    }

    fn descend(&self, owner: &EntityMetadata, depth: usize) -> Result<usize> {
        let next = depth + 1;
        if next > self.max_depth {
            return Err(OdmError::RelationDepthExceeded {
                type_name: owner.type_name().to_string(),
                max_depth: self.max_depth,
            });
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityType, shared, with_entity_mut};
    use crate::testing::{Author, Note, Part};
    use crate::validation::{ConstraintViolation, NoopValidator};
    use serde_json::json;

    #[test]
    fn test_reference_resolves_to_identifier() {
        let author = shared(Author::with_id("CUST-123"));
        let note = Note::with_id("n1").set("title", "t").set("author", author);
        let data = Preparer::new(&NoopValidator, 8)
            .prepare(&note, &Note::metadata().unwrap())
            .unwrap();
        assert_eq!(data["author"], json!("CUST-123"));
    }

    #[test]
    fn test_nested_collection_resolves_to_documents() {
        let parts = vec![
            FieldValue::Entity(shared(Part::default().set("label", "a"))),
            FieldValue::Text("not an entity".to_string()),
            FieldValue::Entity(shared(Part::default().set("label", "b"))),
        ];
        let note = Note::with_id("n1")
            .set("title", "t")
            .set("parts", FieldValue::List(parts));
        let data = Preparer::new(&NoopValidator, 8)
            .prepare(&note, &Note::metadata().unwrap())
            .unwrap();
        assert_eq!(data["parts"], json!([{"label": "a"}, {"label": "b"}]));
    }

    #[test]
    fn test_reference_collection_skips_entities_without_identifier() {
        let authors = vec![
            FieldValue::Entity(shared(Author::with_id("a1"))),
            FieldValue::Entity(shared(Author::default())),
            FieldValue::Entity(shared(Author::with_id("a3"))),
        ];
        let note = Note::with_id("n1")
            .set("title", "t")
            .set("author", FieldValue::List(authors));
        let data = Preparer::new(&NoopValidator, 8)
            .prepare(&note, &Note::metadata().unwrap())
            .unwrap();
        assert_eq!(data["author"], json!(["a1", "a3"]));
    }

    #[test]
    fn test_reference_without_identifier() {
        let author = shared(Author::default());
        let note = Note::with_id("n1").set("title", "t").set("author", author);
        let err = Preparer::new(&NoopValidator, 8)
            .prepare(&note, &Note::metadata().unwrap())
            .unwrap_err();
        assert!(matches!(err, OdmError::InvalidRelation { ref field, .. } if field == "author"));
    }

    #[test]
    fn test_wrong_target_type() {
        let part = shared(Part::with_id("p1"));
        let note = Note::with_id("n1").set("title", "t").set("author", part);
        assert!(matches!(
            Preparer::new(&NoopValidator, 8).prepare(&note, &Note::metadata().unwrap()),
            Err(OdmError::InvalidRelation { .. })
        ));
    }

    #[test]
    fn test_scalar_in_single_relation_is_not_an_entity() {
        let note = Note::with_id("n1").set("title", "t").set("author", "a1");
        assert!(matches!(
            Preparer::new(&NoopValidator, 8).prepare(&note, &Note::metadata().unwrap()),
            Err(OdmError::NotAnEntity(_))
        ));
    }

    #[test]
    fn test_cycle_hits_depth_limit() {
        let root = shared(Part::default().set("label", "root"));
        let child = shared(Part::default().set("label", "child"));
        root.write()
            .set_field_value("children", FieldValue::List(vec![child.clone().into()]))
            .unwrap();
        child
            .write()
            .set_field_value("children", FieldValue::List(vec![root.clone().into()]))
            .unwrap();

        let guard = root.read();
        let err = Preparer::new(&NoopValidator, 4)
            .prepare(&*guard, &Part::metadata().unwrap())
            .unwrap_err();
        assert!(matches!(err, OdmError::RelationDepthExceeded { max_depth: 4, .. }));
        drop(guard);

        // Break the cycle so both parts are freed.
        with_entity_mut::<Part, _>(&child, |part| part.fields.clear());
    }

    #[test]
    fn test_reference_loop_is_not_a_cycle() {
        let note = shared(Note::with_id("n1").set("title", "t"));
        let author = shared(Author::with_id("a1").set("favorite", note.clone()));
        note.write()
            .set_field_value("author", author.clone().into())
            .unwrap();

        let guard = note.read();
        let preparer = Preparer::new(&NoopValidator, 2);
        preparer.validate(&*guard, &Note::metadata().unwrap()).unwrap();
        let data = preparer.prepare(&*guard, &Note::metadata().unwrap()).unwrap();
        assert_eq!(data["author"], json!("a1"));
        drop(guard);

        with_entity_mut::<Author, _>(&author, |author| author.fields.clear());
    }

    #[test]
    fn test_related_entities_are_validated() {
        let validator = |entity: &dyn Entity| {
            if entity.entity_type().name() == "Author" && entity.field_value("name").is_none() {
                vec![ConstraintViolation::new("name", "must not be blank")]
            } else {
                Vec::new()
            }
        };
        let note = Note::with_id("n1")
            .set("title", "t")
            .set("author", shared(Author::with_id("a1")));
        let err = Preparer::new(&validator, 8)
            .validate(&note, &Note::metadata().unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: name: must not be blank");
    }
}
