//! Error types for the object-document mapper.
//!
//! Every fallible operation in the crate returns [`Result`], whose error side is
//! [`OdmError`]. Declaration problems surface eagerly as
//! [`OdmError::Configuration`]; problems with a particular entity, query or
//! hydration input carry the entity type name so callers can report them
//! without extra context.

use thiserror::Error;

/// The error type for all mapper operations.
#[derive(Error, Debug)]
pub enum OdmError {
    /// An index or field declaration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value or type name does not designate an entity.
    #[error("Not an entity: {0}")]
    NotAnEntity(String),

    /// The entity has no (or an empty) identifier.
    #[error("Entity of type '{type_name}' must have a non-empty identifier")]
    MissingIdentifier { type_name: String },

    /// The entity type was never declared with an index.
    #[error("No index metadata declared for entity type '{type_name}'")]
    NoIndexMetadata { type_name: String },

    /// A non-nullable field has no value.
    #[error("Field '{field}' of entity type '{type_name}' is not nullable but has no value")]
    MissingRequiredField { type_name: String, field: String },

    /// A related entity cannot be stored in a relation field.
    #[error("Invalid relation '{field}' on entity type '{type_name}': {reason}")]
    InvalidRelation {
        type_name: String,
        field: String,
        reason: String,
    },

    /// A criteria key is not a declared field.
    #[error("Field '{field}' is not declared on entity type '{type_name}'")]
    InvalidField { type_name: String, field: String },

    /// A sort key is not a declared field.
    #[error("Cannot sort entity type '{type_name}' by undeclared field '{field}'")]
    InvalidSortField { type_name: String, field: String },

    /// Nested hydration input is not a mapping of string keys.
    #[error("Invalid nested data for '{related_type}' in entity type '{type_name}': {reason}")]
    InvalidNestedData {
        type_name: String,
        related_type: String,
        reason: String,
    },

    /// A setter received a value of the wrong kind.
    #[error("Invalid field value: expected {expected}, found {found}")]
    InvalidFieldValue {
        expected: &'static str,
        found: &'static str,
    },

    /// The validation collaborator reported violations.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Relation resolution went deeper than the configured limit.
    #[error("Relation depth limit of {max_depth} exceeded while processing '{type_name}'")]
    RelationDepthExceeded { type_name: String, max_depth: usize },

    /// The wire client failed.
    #[error("Error during {operation} request: {message}")]
    Transport {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// The wire client answered with an unexpected shape.
    #[error("Unexpected response to {operation} request: {reason}")]
    InvalidResponse { operation: String, reason: String },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mapper operations.
pub type Result<T> = std::result::Result<T, OdmError>;

impl OdmError {
    /// Create a configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        OdmError::Configuration(msg.into())
    }

    /// Create a not-an-entity error.
    pub fn not_an_entity<S: Into<String>>(msg: S) -> Self {
        OdmError::NotAnEntity(msg.into())
    }

    /// Create a missing identifier error.
    pub fn missing_identifier<S: Into<String>>(type_name: S) -> Self {
        OdmError::MissingIdentifier {
            type_name: type_name.into(),
        }
    }

    /// Create a no-index-metadata error.
    pub fn no_index_metadata<S: Into<String>>(type_name: S) -> Self {
        OdmError::NoIndexMetadata {
            type_name: type_name.into(),
        }
    }

    /// Create an invalid relation error.
    pub fn invalid_relation<T, F, R>(type_name: T, field: F, reason: R) -> Self
    where
        T: Into<String>,
        F: Into<String>,
        R: Into<String>,
    {
        OdmError::InvalidRelation {
            type_name: type_name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid nested data error.
    pub fn invalid_nested_data<T, U, R>(type_name: T, related_type: U, reason: R) -> Self
    where
        T: Into<String>,
        U: Into<String>,
        R: Into<String>,
    {
        OdmError::InvalidNestedData {
            type_name: type_name.into(),
            related_type: related_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error for the named wire operation.
    pub fn transport<O, M>(operation: O, status: Option<u16>, message: M) -> Self
    where
        O: Into<String>,
        M: Into<String>,
    {
        OdmError::Transport {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    /// Create an invalid response error for the named wire operation.
    pub fn invalid_response<O, R>(operation: O, reason: R) -> Self
    where
        O: Into<String>,
        R: Into<String>,
    {
        OdmError::InvalidResponse {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error came from the wire client.
    pub fn is_transport(&self) -> bool {
        matches!(self, OdmError::Transport { .. })
    }
}
