//! Criteria to search body translation.
//!
//! Every criterion becomes one clause of a `bool.must` query:
//!
//! | Condition                      | Clause                          |
//! |--------------------------------|---------------------------------|
//! | plain value                    | `{"match": {field: value}}`     |
//! | `{"_range": {"gte": ..}}`      | `{"range": {field: {..}}}`      |
//! | `{"_prefix": "abc"}`           | `{"prefix": {field: "abc"}}`    |
//! | `{"_wildcard": "a*c"}`         | `{"wildcard": {field: "a*c"}}`  |
//!
//! Criteria and sort keys must name declared fields.

use serde_json::{Map, Value, json};

use crate::error::{OdmError, Result};
use crate::metadata::EntityMetadata;

/// A condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    Range(Value),
    Prefix(Value),
    Wildcard(Value),
}

impl Condition {
    fn clause(&self, field: &str) -> Value {
        let (kind, value) = match self {
            Condition::Equals(v) => ("match", v),
            Condition::Range(v) => ("range", v),
            Condition::Prefix(v) => ("prefix", v),
            Condition::Wildcard(v) => ("wildcard", v),
        };
        let mut inner = Map::new();
        inner.insert(field.to_string(), value.clone());
        let mut clause = Map::new();
        clause.insert(kind.to_string(), Value::Object(inner));
        Value::Object(clause)
    }
}

impl From<Value> for Condition {
    /// Reads the `_range`, `_prefix` and `_wildcard` tags; anything else is
    /// an equality condition.
    fn from(value: Value) -> Self {
        if let Value::Object(object) = &value {
            for (tag, make) in [
                ("_range", Condition::Range as fn(Value) -> Condition),
                ("_prefix", Condition::Prefix),
                ("_wildcard", Condition::Wildcard),
            ] {
                if let Some(inner) = object.get(tag) {
                    return make(inner.clone());
                }
            }
        }
        Condition::Equals(value)
    }
}

/// Field conditions, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    conditions: Vec<(String, Condition)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((field.into(), condition));
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::Equals(value.into()))
    }

    /// `bounds` is a mapping of `gt`, `gte`, `lt`, `lte`.
    pub fn range(self, field: impl Into<String>, bounds: Value) -> Self {
        self.condition(field, Condition::Range(bounds))
    }

    pub fn prefix(self, field: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.condition(field, Condition::Prefix(Value::String(prefix.into())))
    }

    pub fn wildcard(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.condition(field, Condition::Wildcard(Value::String(pattern.into())))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }
}

impl From<Map<String, Value>> for Criteria {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            conditions: map
                .into_iter()
                .map(|(field, value)| (field, Condition::from(value)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `"desc"` in any case is descending; everything else is ascending.
    pub fn parse(direction: &str) -> Self {
        if direction.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort keys, in priority order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy {
    keys: Vec<(String, SortDirection)>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.by(field, SortDirection::Asc)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.by(field, SortDirection::Desc)
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }
}

impl<S: Into<String>, D: AsRef<str>> FromIterator<(S, D)> for OrderBy {
    fn from_iter<I: IntoIterator<Item = (S, D)>>(iter: I) -> Self {
        Self {
            keys: iter
                .into_iter()
                .map(|(field, direction)| (field.into(), SortDirection::parse(direction.as_ref())))
                .collect(),
        }
    }
}

/// Size, offset and sort applied on top of a custom query body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub size: Option<u64>,
    pub from: Option<u64>,
    pub sort: Option<Value>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn offset(mut self, from: u64) -> Self {
        self.from = Some(from);
        self
    }

    pub fn sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub(crate) fn apply(&self, mut query: Value) -> Result<Value> {
        let body = query
            .as_object_mut()
            .ok_or_else(|| OdmError::configuration("Custom query body must be a JSON object"))?;
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if let Some(sort) = &self.sort {
            body.insert("sort".to_string(), sort.clone());
        }
        Ok(query)
    }
}

/// `bool.must` query of `criteria`, rejecting undeclared fields.
pub(crate) fn build_query(metadata: &EntityMetadata, criteria: &Criteria) -> Result<Value> {
    let mut must = Vec::with_capacity(criteria.conditions.len());
    for (field, condition) in &criteria.conditions {
        if !metadata.has_field(field) {
            return Err(OdmError::InvalidField {
                type_name: metadata.type_name().to_string(),
                field: field.clone(),
            });
        }
        must.push(condition.clause(field));
    }
    Ok(json!({ "bool": { "must": must } }))
}

pub(crate) fn build_sort(metadata: &EntityMetadata, order_by: &OrderBy) -> Result<Vec<Value>> {
    order_by
        .keys
        .iter()
        .map(|(field, direction)| {
            if !metadata.has_field(field) {
                return Err(OdmError::InvalidSortField {
                    type_name: metadata.type_name().to_string(),
                    field: field.clone(),
                });
            }
            let mut key = Map::new();
            key.insert(field.clone(), json!({ "order": direction.as_str() }));
            Ok(Value::Object(key))
        })
        .collect()
}

/// Full search body for a criteria lookup.
pub(crate) fn search_body(
    metadata: &EntityMetadata,
    criteria: &Criteria,
    order_by: &OrderBy,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Value> {
    let mut body = Map::new();
    body.insert("query".to_string(), build_query(metadata, criteria)?);
    body.insert("sort".to_string(), Value::Array(build_sort(metadata, order_by)?));
    if let Some(offset) = offset {
        body.insert("from".to_string(), json!(offset));
    }
    if let Some(limit) = limit {
        body.insert("size".to_string(), json!(limit));
    }
    Ok(Value::Object(body))
}
