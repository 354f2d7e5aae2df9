//! Error types for netbundle.
//!
//! The taxonomy follows the three failures a conversion run can hit
//! (malformed descriptors, missing entities, unrepresentable values) plus the
//! I/O and configuration errors of the surrounding batch run.

use std::path::PathBuf;
use thiserror::Error;

use crate::source::EntityId;

/// Main error type for the netbundle library.
#[derive(Debug, Error)]
pub enum NetBundleError {
    // Extraction errors
    #[error("Malformed layer descriptor {descriptor:?}: {message}")]
    Parse { descriptor: String, message: String },

    #[error("Entity {entity_id} not found (available: {available:?})")]
    Lookup {
        entity_id: EntityId,
        available: Vec<EntityId>,
    },

    #[error("Unclassified parameters in {component}: {names:?}")]
    UnclassifiedParameters {
        component: String,
        names: Vec<String>,
    },

    #[error("Parameter mismatch in {component}: {message}")]
    ParameterMismatch { component: String, message: String },

    #[error("Invalid component {component}: {message}")]
    InvalidComponent { component: String, message: String },

    #[error("Invalid tensor {name}: {message}")]
    InvalidTensor { name: String, message: String },

    // Serialization errors
    #[error("Cannot serialize {key}: {message}")]
    Serialization { key: String, message: String },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for netbundle operations.
pub type Result<T> = std::result::Result<T, NetBundleError>;

impl From<std::io::Error> for NetBundleError {
    fn from(err: std::io::Error) -> Self {
        NetBundleError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for NetBundleError {
    fn from(err: serde_json::Error) -> Self {
        NetBundleError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl NetBundleError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        NetBundleError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a parse error for `descriptor`.
    pub fn parse(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        NetBundleError::Parse {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Convert to a process exit status.
    ///
    /// - 2: malformed layer descriptor
    /// - 3: entity lookup failed
    /// - 4: value not representable in the output document
    /// - 1: everything else
    pub fn exit_code(&self) -> u8 {
        match self {
            NetBundleError::Parse { .. } => 2,
            NetBundleError::Lookup { .. } => 3,
            NetBundleError::Serialization { .. } => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetBundleError::Lookup {
            entity_id: 99,
            available: vec![12, 18],
        };
        assert_eq!(err.to_string(), "Entity 99 not found (available: [12, 18])");

        let err = NetBundleError::parse("", "descriptor is empty");
        assert_eq!(
            err.to_string(),
            "Malformed layer descriptor \"\": descriptor is empty"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(NetBundleError::parse("x", "bad").exit_code(), 2);
        assert_eq!(
            NetBundleError::Lookup {
                entity_id: 1,
                available: vec![]
            }
            .exit_code(),
            3
        );
        assert_eq!(
            NetBundleError::Serialization {
                key: "weights_co".into(),
                message: "NaN".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(
            NetBundleError::Config {
                message: "no sources".into()
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = NetBundleError::io_with_path(io, "/tmp/model.json");
        match err {
            NetBundleError::Io { path, source, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/model.json")));
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
