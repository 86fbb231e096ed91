use std::fmt;

use crate::entity::Entity;
use crate::error::OdmError;

/// A single constraint failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    /// Field (or dotted field path) the violation is about.
    pub path: String,
    pub message: String,
}

impl ConstraintViolation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Checks an entity's own fields. The manager calls it for the persisted
/// entity and for every entity reached through its relation fields.
pub trait Validator: Send + Sync {
    fn validate(&self, entity: &dyn Entity) -> Vec<ConstraintViolation>;
}

impl<F> Validator for F
where
    F: Fn(&dyn Entity) -> Vec<ConstraintViolation> + Send + Sync,
{
    fn validate(&self, entity: &dyn Entity) -> Vec<ConstraintViolation> {
        self(entity)
    }
}

/// Accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _entity: &dyn Entity) -> Vec<ConstraintViolation> {
        Vec::new()
    }
}

pub(crate) fn violations_error(violations: &[ConstraintViolation]) -> OdmError {
    let joined = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    OdmError::Validation(joined)
}
