//! Error types for Cauldron core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CauldronResult<T> = Result<T, CauldronError>;

/// Errors that can occur in Cauldron core operations.
#[derive(Debug, Error)]
pub enum CauldronError {
    /// A descriptor segment, package or file does not exist.
    #[error("{what} was not found in Cauldron")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// A create operation found an existing sibling with the same name.
    #[error("{what} already exists")]
    AlreadyExists {
        /// What was being created.
        what: String,
    },

    /// Schema validation rejected a candidate object.
    #[error("validation failed at {path}: {message}")]
    Validation {
        /// Field path of the offending value, e.g. `/platforms/0/name`.
        path: String,
        /// What is wrong with it.
        message: String,
    },

    /// A transaction was begun while pending, or ended while not pending.
    #[error("{message}")]
    TransactionState {
        /// Description of the state violation.
        message: String,
    },

    /// A mutation targeted a released, immutable version.
    #[error("{descriptor} is a released native application version. {message}")]
    ReleasedVersion {
        /// The released version.
        descriptor: String,
        /// Caller supplied explanation.
        message: String,
    },

    /// The underlying version-control operation failed.
    #[error("sync error: {0}")]
    Sync(#[from] cauldron_vcs::VcsError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The stored document violates a structural invariant.
    #[error("invalid Cauldron document: {message}")]
    InvalidDocument {
        /// Description of the violation.
        message: String,
    },

    /// A descriptor string could not be parsed.
    #[error("invalid descriptor '{input}': {message}")]
    InvalidDescriptor {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        message: String,
    },

    /// A package path cannot be used for the requested operation.
    #[error("invalid package {package}: {message}")]
    InvalidPackage {
        /// The package path.
        package: String,
        /// Why it was rejected.
        message: String,
    },

    /// A version string is not usable.
    #[error("{version} is not a valid version: {message}")]
    InvalidVersion {
        /// The version string.
        version: String,
        /// Why it was rejected.
        message: String,
    },

    /// The document schema version is not the one this library supports.
    #[error("Cauldron schema version mismatch: found {found}, expected {expected}. {hint}")]
    SchemaVersionMismatch {
        /// Schema version of the document.
        found: String,
        /// Schema version supported by this library.
        expected: String,
        /// What the caller should do about it.
        hint: String,
    },

    /// A schema upgrade could not be applied.
    #[error("schema upgrade failed: {message}")]
    Upgrade {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CauldronError {
    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Creates a validation error.
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a transaction state error.
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState {
            message: message.into(),
        }
    }

    /// Creates a released version error.
    pub fn released_version(descriptor: impl ToString, message: impl Into<String>) -> Self {
        Self::ReleasedVersion {
            descriptor: descriptor.to_string(),
            message: message.into(),
        }
    }

    /// Creates an invalid document error.
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }

    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid package error.
    pub fn invalid_package(package: impl ToString, message: impl Into<String>) -> Self {
        Self::InvalidPackage {
            package: package.to_string(),
            message: message.into(),
        }
    }

    /// Creates an invalid version error.
    pub fn invalid_version(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Creates an upgrade error.
    pub fn upgrade(message: impl Into<String>) -> Self {
        Self::Upgrade {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for [`CauldronError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message() {
        let err = CauldronError::not_found("myapp:android");
        assert_eq!(err.to_string(), "myapp:android was not found in Cauldron");
        assert!(err.is_not_found());
    }

    #[test]
    fn released_version_message() {
        let err = CauldronError::released_version("myapp:android:1.0.0", "Cannot add MiniApp.");
        assert_eq!(
            err.to_string(),
            "myapp:android:1.0.0 is a released native application version. Cannot add MiniApp."
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn vcs_errors_convert_to_sync() {
        let err: CauldronError = cauldron_vcs::VcsError::UnknownRemote("upstream".into()).into();
        assert!(matches!(err, CauldronError::Sync(_)));
    }
}
