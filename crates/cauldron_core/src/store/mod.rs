//! Git-backed stores for the Cauldron document and its blobs.
//!
//! Both stores write into a [`SyncedWorkingCopy`](crate::SyncedWorkingCopy).
//! Outside a transaction every write is committed and pushed at once;
//! inside one, writes are only staged until the transaction commits.

mod blob;
mod document;

pub(crate) use blob::check_relative_path;
pub use blob::GitBlobStore;
pub use document::{GitDocumentStore, DOCUMENT_FILE};

use crate::error::CauldronResult;
use crate::working_copy::CommitMessage;

/// A store whose writes can be grouped into one commit.
///
/// # Invariants
///
/// - `begin_transaction` fails while a transaction is pending
/// - `discard_transaction` and `commit_transaction` fail when none is
/// - After `discard_transaction` the store reads as it did before
///   `begin_transaction`
///
/// # Implementors
///
/// - [`GitDocumentStore`] - The Cauldron document
/// - [`GitBlobStore`] - Files under a path prefix
pub trait TransactionalStore: Send + Sync {
    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`](crate::CauldronError::TransactionState)
    /// if one is already pending.
    fn begin_transaction(&self) -> CauldronResult<()>;

    /// Drops every write made since the transaction began.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`](crate::CauldronError::TransactionState)
    /// if no transaction is pending.
    fn discard_transaction(&self) -> CauldronResult<()>;

    /// Commits and pushes every write made since the transaction began.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`](crate::CauldronError::TransactionState)
    /// if no transaction is pending, or
    /// [`CauldronError::Sync`](crate::CauldronError::Sync) if git fails.
    fn commit_transaction(&self, message: &CommitMessage) -> CauldronResult<()>;
}
