//! Error types for atomspace-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atom::Handle;

/// Result type alias using atomspace-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ReferenceIntegrity,
    NotFound,
    Capacity,
    Storage,
    MalformedPattern,
    Parse,
    Config,
    Serialization,
    Internal,
}

/// Errors that can occur during store, matcher, attention or storage operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before touching the store
    #[error("Validation error{}: {message}", fmt_handle(.handle))]
    Validation {
        handle: Option<Handle>,
        message: String,
    },

    /// Removal blocked by live dependents
    #[error("Atom {handle} is still referenced by {} link(s)", .dependents.len())]
    ReferenceIntegrity {
        handle: Handle,
        dependents: Vec<Handle>,
    },

    /// Lookup by unknown handle or name
    #[error("Not found: {identifier}")]
    NotFound {
        handle: Option<Handle>,
        identifier: String,
    },

    /// Attentional focus bounds are inconsistent
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// Storage gateway failure
    #[error("Storage error ({backend}): {message}")]
    Storage { backend: String, message: String },

    /// Pattern structure could not be understood
    #[error("Malformed pattern at offset {offset}: {message}")]
    MalformedPattern { message: String, offset: usize },

    /// Textual atom form could not be parsed
    #[error("Parse error at offset {offset}: {message}")]
    Parse { message: String, offset: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn fmt_handle(handle: &Option<Handle>) -> String {
    handle.map(|h| format!(" for {}", h)).unwrap_or_default()
}

impl Error {
    /// Create a validation error not tied to an atom.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            handle: None,
            message: message.into(),
        }
    }

    /// Create a validation error for a specific handle.
    pub fn validation_for(handle: Handle, message: impl Into<String>) -> Self {
        Self::Validation {
            handle: Some(handle),
            message: message.into(),
        }
    }

    /// Create a not-found error for a handle.
    pub fn handle_not_found(handle: Handle) -> Self {
        Self::NotFound {
            handle: Some(handle),
            identifier: handle.to_string(),
        }
    }

    /// Create a not-found error for a name or other identifier.
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            handle: None,
            identifier: identifier.into(),
        }
    }

    /// Create a storage error carrying the backend's cause.
    pub fn storage(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a malformed pattern error.
    pub fn malformed_pattern(message: impl Into<String>, offset: usize) -> Self {
        Self::MalformedPattern {
            message: message.into(),
            offset,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>, offset: usize) -> Self {
        Self::Parse {
            message: message.into(),
            offset,
        }
    }

    /// Error for a poisoned lock.
    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Internal(format!("Failed to lock {}", what))
    }

    /// Machine-readable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ReferenceIntegrity { .. } => ErrorKind::ReferenceIntegrity,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Capacity(_) => ErrorKind::Capacity,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::MalformedPattern { .. } => ErrorKind::MalformedPattern,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Config(_) => ErrorKind::Config,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The offending handle, when the error concerns one atom.
    pub fn handle(&self) -> Option<Handle> {
        match self {
            Self::Validation { handle, .. } | Self::NotFound { handle, .. } => *handle,
            Self::ReferenceIntegrity { handle, .. } => Some(*handle),
            _ => None,
        }
    }

    /// Identifier of the offending object, if any.
    pub fn identifier(&self) -> Option<String> {
        match self {
            Self::NotFound { identifier, .. } => Some(identifier.clone()),
            Self::Storage { backend, .. } => Some(backend.clone()),
            _ => self.handle().map(|h| h.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_handle() {
        let err = Error::ReferenceIntegrity {
            handle: Handle::new(7),
            dependents: vec![Handle::new(9)],
        };
        assert_eq!(err.kind(), ErrorKind::ReferenceIntegrity);
        assert_eq!(err.handle(), Some(Handle::new(7)));
        assert!(err.to_string().contains("1 link"));
    }

    #[test]
    fn test_storage_identifier_is_backend() {
        let err = Error::storage("sqlite", "disk full");
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.identifier().as_deref(), Some("sqlite"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
