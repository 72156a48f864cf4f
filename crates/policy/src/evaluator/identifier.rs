//! Decoding of the resource identifiers a backend reports per violation.

use serde_json::Value;

/// Key holding the resource id in map-shaped identifiers.
pub const ID_KEY: &str = "Id";

/// One violating resource as reported by a backend.
///
/// Backends return either a bare `Type.Name` string or a map carrying the
/// id under `"Id"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationIdentifier {
    Simple(String),
    WithId { id: String },
}

impl ViolationIdentifier {
    pub fn resource_id(&self) -> &str {
        match self {
            ViolationIdentifier::Simple(id) => id,
            ViolationIdentifier::WithId { id } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdentifierError {
    #[error("no Id key found in resource map: {0}")]
    MissingId(Value),

    #[error("Id key is not a string: {0}")]
    InvalidId(Value),

    #[error("resource identifier has unsupported shape: {0}")]
    UnsupportedShape(Value),
}

impl TryFrom<&Value> for ViolationIdentifier {
    type Error = IdentifierError;

    // Extra keys next to "Id" are ignored.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(id) => Ok(ViolationIdentifier::Simple(id.clone())),
            Value::Object(map) => match map.get(ID_KEY) {
                Some(Value::String(id)) => Ok(ViolationIdentifier::WithId { id: id.clone() }),
                Some(_) => Err(IdentifierError::InvalidId(value.clone())),
                None => Err(IdentifierError::MissingId(value.clone())),
            },
            other => Err(IdentifierError::UnsupportedShape(other.clone())),
        }
    }
}
