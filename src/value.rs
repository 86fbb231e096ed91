//! Field values held by entities.
//!
//! [`FieldValue`] is what an entity hands out from its getter table and what
//! it receives through its setter table. Scalar variants map one-to-one onto
//! JSON document values; [`FieldValue::Entity`] and lists of entities only
//! appear in relation fields and are resolved into identifiers or nested
//! documents before anything is sent to the index.
//!
//! # Equality
//!
//! Equality is strict, as required by change detection:
//!
//! ```
//! use elastic_odm::FieldValue;
//!
//! assert_ne!(FieldValue::Integer(1), FieldValue::Text("1".to_string()));
//! assert_ne!(FieldValue::Integer(1), FieldValue::Float(1.0));
//! assert_eq!(FieldValue::from("x"), FieldValue::Text("x".to_string()));
//! ```
//!
//! Entity values compare by instance identity, never by content.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

use crate::entity::EntityRef;
use crate::error::{OdmError, Result};
use crate::metadata::FieldType;

/// A value read from or written to an entity field.
#[derive(Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    /// Text and keyword content.
    Text(String),
    /// Date and time in UTC.
    DateTime(DateTime<Utc>),
    /// Ordered collection (tags, related entities...).
    List(Vec<FieldValue>),
    /// A related entity instance.
    Entity(EntityRef),
    /// Raw JSON kept as-is when it does not fit the declared field type.
    Json(Value),
}

impl FieldValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::DateTime(_) => "date",
            FieldValue::List(_) => "list",
            FieldValue::Entity(_) => "entity",
            FieldValue::Json(_) => "json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            FieldValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    /// Converts `Null` into `None` and anything else through `T::try_from`.
    pub fn into_optional<T>(self) -> Result<Option<T>>
    where
        T: TryFrom<FieldValue, Error = OdmError>,
    {
        match self {
            FieldValue::Null => Ok(None),
            other => T::try_from(other).map(Some),
        }
    }

    /// Collects the entities of an entity or list value, skipping anything
    /// that is not entity-shaped.
    pub fn into_entities(self) -> Vec<EntityRef> {
        match self {
            FieldValue::Entity(e) => vec![e],
            FieldValue::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    FieldValue::Entity(e) => Some(e),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Converts a scalar value into its JSON document form.
    ///
    /// Returns `None` when the value holds an entity, which has no scalar
    /// document form.
    pub fn to_json(&self) -> Option<Value> {
        let json = match self {
            FieldValue::Null => Value::Null,
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            FieldValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(FieldValue::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            FieldValue::Entity(_) => return None,
            FieldValue::Json(v) => v.clone(),
        };
        Some(json)
    }

    /// Converts a JSON document value into a field value, guided by the
    /// declared field type when there is one.
    ///
    /// Values that do not fit the declared type are kept as
    /// [`FieldValue::Json`] so that nothing is silently lost.
    pub fn from_json(value: &Value, field_type: Option<FieldType>) -> Self {
        match (field_type, value) {
            (_, Value::Null) => FieldValue::Null,
            (_, Value::Array(items)) => FieldValue::List(
                items
                    .iter()
                    .map(|item| FieldValue::from_json(item, field_type))
                    .collect(),
            ),
            (Some(FieldType::Integer), Value::Number(n)) if n.is_i64() => {
                n.as_i64().map_or_else(|| FieldValue::Json(value.clone()), FieldValue::Integer)
            }
            (Some(FieldType::Float), Value::Number(n)) => n
                .as_f64()
                .map_or_else(|| FieldValue::Json(value.clone()), FieldValue::Float),
            (Some(FieldType::Date), Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                .unwrap_or_else(|_| FieldValue::Text(s.clone())),
            (Some(FieldType::Boolean), Value::Bool(b)) => FieldValue::Bool(*b),
            (Some(FieldType::Text | FieldType::Keyword), Value::String(s)) => {
                FieldValue::Text(s.clone())
            }
            (None, Value::Bool(b)) => FieldValue::Bool(*b),
            (None, Value::String(s)) => FieldValue::Text(s.clone()),
            (None, Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Integer(i)
                } else {
                    n.as_f64()
                        .map_or_else(|| FieldValue::Json(value.clone()), FieldValue::Float)
                }
            }
            _ => FieldValue::Json(value.clone()),
        }
    }

    fn mismatch(&self, expected: &'static str) -> OdmError {
        OdmError::InvalidFieldValue {
            expected,
            found: self.kind(),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => a == b,
            (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a == b,
            (FieldValue::List(a), FieldValue::List(b)) => a == b,
            (FieldValue::Entity(a), FieldValue::Entity(b)) => Arc::ptr_eq(a, b),
            (FieldValue::Json(a), FieldValue::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "Null"),
            FieldValue::Bool(b) => write!(f, "Bool({b})"),
            FieldValue::Integer(i) => write!(f, "Integer({i})"),
            FieldValue::Float(x) => write!(f, "Float({x})"),
            FieldValue::Text(s) => write!(f, "Text({s:?})"),
            FieldValue::DateTime(dt) => write!(f, "DateTime({dt})"),
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
            FieldValue::Entity(e) => match e.try_read_recursive() {
                Some(guard) => write!(f, "Entity({}#{})", guard.entity_type().name(), guard.id()),
                None => write!(f, "Entity(<locked>)"),
            },
            FieldValue::Json(v) => write!(f, "Json({v})"),
        }
    }
}

// --- Conversions ---

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(dt: DateTime<Utc>) -> Self {
        FieldValue::DateTime(dt)
    }
}

impl From<EntityRef> for FieldValue {
    fn from(e: EntityRef) -> Self {
        FieldValue::Entity(e)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<FieldValue> for String {
    type Error = OdmError;

    fn try_from(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Text(s) => Ok(s),
            other => Err(other.mismatch("text")),
        }
    }
}

impl TryFrom<FieldValue> for i64 {
    type Error = OdmError;

    fn try_from(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Integer(i) => Ok(i),
            other => Err(other.mismatch("integer")),
        }
    }
}

impl TryFrom<FieldValue> for f64 {
    type Error = OdmError;

    fn try_from(value: FieldValue) -> Result<Self> {
        value.as_float().ok_or_else(|| value.mismatch("float"))
    }
}

impl TryFrom<FieldValue> for bool {
    type Error = OdmError;

    fn try_from(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Bool(b) => Ok(b),
            other => Err(other.mismatch("boolean")),
        }
    }
}

impl TryFrom<FieldValue> for DateTime<Utc> {
    type Error = OdmError;

    fn try_from(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::DateTime(dt) => Ok(dt),
            other => Err(other.mismatch("date")),
        }
    }
}

impl TryFrom<FieldValue> for EntityRef {
    type Error = OdmError;

    fn try_from(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Entity(e) => Ok(e),
            other => Err(other.mismatch("entity")),
        }
    }
}

impl TryFrom<FieldValue> for Vec<String> {
    type Error = OdmError;

    fn try_from(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::List(items) => items.into_iter().map(String::try_from).collect(),
            other => Err(other.mismatch("list")),
        }
    }
}
