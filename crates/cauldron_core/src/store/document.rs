//! The Cauldron document store.

use super::TransactionalStore;
use crate::error::CauldronResult;
use crate::model::Cauldron;
use crate::working_copy::{CommitMessage, SyncedWorkingCopy};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default document file name.
pub const DOCUMENT_FILE: &str = "cauldron.json";

/// Stores the Cauldron document as one JSON file.
///
/// The document is read once and cached. Mutations go to the cache through
/// [`update`](Self::update) and reach the file on [`commit`](Self::commit).
#[derive(Debug)]
pub struct GitDocumentStore {
    copy: SyncedWorkingCopy,
    file: PathBuf,
    cache: RwLock<Option<Cauldron>>,
}

impl GitDocumentStore {
    /// Creates a store writing `cauldron.json` in the working copy.
    #[must_use]
    pub fn new(copy: SyncedWorkingCopy) -> Self {
        Self::with_file_name(copy, DOCUMENT_FILE)
    }

    /// Creates a store writing the document to `file`, relative to the
    /// working copy root.
    pub fn with_file_name(copy: SyncedWorkingCopy, file: impl Into<PathBuf>) -> Self {
        Self {
            copy,
            file: file.into(),
            cache: RwLock::new(None),
        }
    }

    /// Returns the working copy.
    #[must_use]
    pub fn working_copy(&self) -> &SyncedWorkingCopy {
        &self.copy
    }

    /// Returns the document file, relative to the working copy root.
    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Returns the document.
    ///
    /// The first call syncs the working copy and reads the file, or falls
    /// back to an empty document if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing fails, or if the file cannot be parsed
    /// or violates a document invariant.
    pub fn document(&self) -> CauldronResult<Cauldron> {
        self.copy.sync()?;
        if let Some(cached) = self.cache.read().as_ref() {
            return Ok(cached.clone());
        }
        let document = self.load()?;
        *self.cache.write() = Some(document.clone());
        Ok(document)
    }

    /// Mutates the document in memory.
    ///
    /// `f` works on a copy that replaces the cached document only if `f`
    /// succeeds, so a failed mutation leaves the document untouched.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or any error of [`document`](Self::document).
    pub fn update<R>(&self, f: impl FnOnce(&mut Cauldron) -> CauldronResult<R>) -> CauldronResult<R> {
        let mut document = self.document()?;
        let result = f(&mut document)?;
        *self.cache.write() = Some(document);
        Ok(result)
    }

    /// Writes the document and stages it.
    ///
    /// Outside a transaction the change is committed and pushed too.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or a git operation fails.
    pub fn commit(&self, message: impl Into<CommitMessage>) -> CauldronResult<()> {
        let document = self.document()?;
        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(self.copy.path().join(&self.file), json)?;
        self.copy.backend().add(&self.file)?;
        if !self.copy.has_pending_transaction() {
            let message = message.into();
            debug!(message = message.summary(), "committing document");
            self.copy.commit(&message)?;
        }
        Ok(())
    }

    /// Drops the cached document so the next read goes to the file.
    pub fn reload(&self) {
        *self.cache.write() = None;
    }

    fn load(&self) -> CauldronResult<Cauldron> {
        let path = self.copy.path().join(&self.file);
        if !path.exists() {
            return Ok(Cauldron::default());
        }
        let mut document: Cauldron = serde_json::from_slice(&std::fs::read(&path)?)?;
        document.check_invariants()?;
        Ok(document)
    }
}

impl TransactionalStore for GitDocumentStore {
    fn begin_transaction(&self) -> CauldronResult<()> {
        self.copy.begin_transaction()
    }

    fn discard_transaction(&self) -> CauldronResult<()> {
        self.copy.discard_transaction()?;
        self.reload();
        Ok(())
    }

    fn commit_transaction(&self, message: &CommitMessage) -> CauldronResult<()> {
        self.copy.commit_transaction(message)
    }
}
