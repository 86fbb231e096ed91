//! Field declarations.
//!
//! A [`FieldDeclaration`] says how one entity field is stored: its
//! [`FieldType`], whether it may be left unset, an optional analyzer, and, for
//! relation fields, a [`RelationDescriptor`] naming the target entity type and
//! whether the related entity is embedded ([`RelationKind::Nested`]) or stored
//! by identifier ([`RelationKind::Reference`]).

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{EntityType, EntityTypeRef};
use crate::error::{OdmError, Result};

lazy_static! {
    static ref ANALYZER_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();
}

/// Storage type of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Keyword,
    Integer,
    Float,
    Date,
    Boolean,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        FieldType::Text,
        FieldType::Keyword,
        FieldType::Integer,
        FieldType::Float,
        FieldType::Date,
        FieldType::Boolean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = OdmError;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                OdmError::configuration(format!(
                    "Invalid type: '{s}'. Valid types are: text, keyword, integer, float, date, boolean"
                ))
            })
    }
}

/// How a related entity is stored in the owning document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// The full prepared document of the related entity is embedded.
    Nested,
    /// Only the identifier of the related entity is stored.
    Reference,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Nested => "nested",
            RelationKind::Reference => "reference",
        }
    }
}

impl FromStr for RelationKind {
    type Err = OdmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nested" => Ok(RelationKind::Nested),
            "reference" => Ok(RelationKind::Reference),
            _ => Err(OdmError::configuration(format!(
                "Invalid relation type: '{s}'. Valid types are: reference, nested"
            ))),
        }
    }
}

/// Target type and storage kind of a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDescriptor {
    target: EntityTypeRef,
    kind: RelationKind,
}

impl RelationDescriptor {
    pub fn new(target: EntityTypeRef, kind: RelationKind) -> Self {
        Self { target, kind }
    }

    pub fn target(&self) -> EntityTypeRef {
        self.target
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }
}

/// Declaration of one persistent field.
#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    name: String,
    field_type: Option<FieldType>,
    nullable: bool,
    analyzer: Option<String>,
    directives: Map<String, Value>,
    relation: Option<RelationDescriptor>,
}

impl FieldDeclaration {
    /// A scalar field. Fields are required unless marked nullable.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type: Some(field_type),
            nullable: false,
            analyzer: None,
            directives: Map::new(),
            relation: None,
        }
    }

    /// A relation field holding one or more entities of type `T`.
    pub fn relation<T: EntityType>(name: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            nullable: false,
            analyzer: None,
            directives: Map::new(),
            relation: Some(RelationDescriptor::new(EntityTypeRef::of::<T>(), kind)),
        }
    }

    pub fn nested<T: EntityType>(name: impl Into<String>) -> Self {
        Self::relation::<T>(name, RelationKind::Nested)
    }

    pub fn reference<T: EntityType>(name: impl Into<String>) -> Self {
        Self::relation::<T>(name, RelationKind::Reference)
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn directive(mut self, key: impl Into<String>, value: Value) -> Self {
        self.directives.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scalar type; `None` for relation-only declarations.
    pub fn field_type(&self) -> Option<FieldType> {
        self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn analyzer_name(&self) -> Option<&str> {
        self.analyzer.as_deref()
    }

    pub fn directives(&self) -> &Map<String, Value> {
        &self.directives
    }

    pub fn relation_descriptor(&self) -> Option<&RelationDescriptor> {
        self.relation.as_ref()
    }

    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Check the declaration constraints of a field.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(OdmError::configuration("Field names must not be empty"));
        }

        if let Some(analyzer) = &self.analyzer {
            if !ANALYZER_NAME.is_match(analyzer) {
                return Err(OdmError::configuration(format!(
                    "Invalid analyzer name: '{analyzer}'. Analyzer names must be alphanumeric"
                )));
            }
        }

        Ok(())
    }
}
