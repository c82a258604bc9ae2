//! Error types for version-control operations.

use std::io;
use thiserror::Error;

/// Result type for version-control operations.
pub type VcsResult<T> = Result<T, VcsError>;

/// Errors that can occur while driving a git working copy.
#[derive(Debug, Error)]
pub enum VcsError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A git command exited with a failure status.
    #[error("git {command} failed ({}): {stderr}", display_status(.status))]
    CommandFailed {
        /// The git sub-command and its arguments.
        command: String,
        /// Exit code, if the process exited normally.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// The working directory is not a git repository.
    #[error("not a git repository: {path}")]
    NotARepository {
        /// The working directory.
        path: String,
    },

    /// A remote name was used before being configured.
    #[error("remote not configured: {0}")]
    UnknownRemote(String),

    /// A reference could not be resolved.
    #[error("unknown reference {reference} in {url}")]
    UnknownRef {
        /// Repository the reference was looked up in.
        url: String,
        /// The branch, tag or ref that was requested.
        reference: String,
    },
}

impl VcsError {
    /// Creates a command failure error.
    pub fn command_failed(
        command: impl Into<String>,
        status: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            status,
            stderr: stderr.into(),
        }
    }

    /// Creates an unknown reference error.
    pub fn unknown_ref(url: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::UnknownRef {
            url: url.into(),
            reference: reference.into(),
        }
    }
}

fn display_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |code| code.to_string())
}
