//! Named byte payloads under a path prefix.

use super::TransactionalStore;
use crate::error::{CauldronError, CauldronResult};
use crate::working_copy::{CommitMessage, SyncedWorkingCopy};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Checks that `path` stays inside the directory it is joined to, and
/// returns it without `.` components.
///
/// # Errors
///
/// Returns [`CauldronError::InvalidOperation`] for an absolute path or one
/// with a `..` component.
pub(crate) fn check_relative_path(path: &str) -> CauldronResult<PathBuf> {
    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => {
                return Err(CauldronError::invalid_operation(format!(
                    "{path} is not a relative path inside the Cauldron"
                )))
            }
        }
    }
    Ok(relative)
}

/// Stores files under a prefix directory of the working copy.
///
/// Ids may contain `/` to address nested files. An empty prefix makes the
/// whole working copy addressable.
#[derive(Debug)]
pub struct GitBlobStore {
    copy: SyncedWorkingCopy,
    prefix: PathBuf,
}

impl GitBlobStore {
    /// Creates a store over `prefix`, relative to the working copy root.
    pub fn new(copy: SyncedWorkingCopy, prefix: impl Into<PathBuf>) -> Self {
        Self {
            copy,
            prefix: prefix.into(),
        }
    }

    /// Returns the prefix directory.
    #[must_use]
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Returns the working copy.
    #[must_use]
    pub fn working_copy(&self) -> &SyncedWorkingCopy {
        &self.copy
    }

    fn relative(&self, id: &str) -> CauldronResult<PathBuf> {
        Ok(self.prefix.join(check_relative_path(id)?))
    }

    fn absolute(&self, id: &str) -> CauldronResult<PathBuf> {
        Ok(self.copy.path().join(self.relative(id)?))
    }

    /// Writes `content` as `id` and stages it.
    ///
    /// `mode` sets Unix permission bits and is ignored elsewhere. Outside
    /// a transaction the file is committed and pushed too.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidOperation`] for an id that leaves
    /// the prefix directory, or an error if writing or a git operation
    /// fails.
    pub fn store_file(&self, id: &str, content: &[u8], mode: Option<u32>) -> CauldronResult<()> {
        self.stage_file(id, content, mode)?;
        self.commit(format!("Add file {id}"))
    }

    /// Writes `content` as `id` and stages it without committing.
    ///
    /// The next commit of any handle on the working copy picks it up.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or a git operation fails.
    pub fn stage_file(&self, id: &str, content: &[u8], mode: Option<u32>) -> CauldronResult<()> {
        self.copy.sync()?;
        let path = self.absolute(id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        if let Some(mode) = mode {
            set_mode(&path, mode)?;
        }
        self.copy.backend().add(&self.relative(id)?)?;
        Ok(())
    }

    /// Commits and pushes staged changes, unless a transaction is pending.
    ///
    /// # Errors
    ///
    /// Returns an error if a git operation fails.
    pub fn commit(&self, message: impl Into<CommitMessage>) -> CauldronResult<()> {
        if self.copy.has_pending_transaction() {
            return Ok(());
        }
        let message = message.into();
        debug!(message = message.summary(), prefix = %self.prefix.display(), "committing files");
        self.copy.commit(&message)?;
        Ok(())
    }

    /// Returns true if `id` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing fails.
    pub fn has_file(&self, id: &str) -> CauldronResult<bool> {
        self.copy.sync()?;
        Ok(self.absolute(id)?.is_file())
    }

    /// Returns the content of `id`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing or reading fails.
    pub fn get_file(&self, id: &str) -> CauldronResult<Option<Vec<u8>>> {
        self.copy.sync()?;
        let path = self.absolute(id)?;
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(path)?))
    }

    /// Returns the absolute path of `id`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing fails.
    pub fn get_path_to_file(&self, id: &str) -> CauldronResult<Option<PathBuf>> {
        self.copy.sync()?;
        let path = self.absolute(id)?;
        Ok(path.is_file().then_some(path))
    }

    /// Removes `id`. Returns false if it did not exist.
    ///
    /// Outside a transaction the removal is committed and pushed.
    ///
    /// # Errors
    ///
    /// Returns an error if a git operation fails.
    pub fn remove_file(&self, id: &str) -> CauldronResult<bool> {
        if !self.stage_removal(id)? {
            return Ok(false);
        }
        self.commit(format!("Remove file {id}"))?;
        Ok(true)
    }

    /// Removes `id` and stages the removal without committing. Returns
    /// false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a git operation fails.
    pub fn stage_removal(&self, id: &str) -> CauldronResult<bool> {
        self.copy.sync()?;
        if !self.absolute(id)?.is_file() {
            return Ok(false);
        }
        self.copy.backend().rm(&self.relative(id)?)?;
        Ok(true)
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> CauldronResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> CauldronResult<()> {
    Ok(())
}

impl TransactionalStore for GitBlobStore {
    fn begin_transaction(&self) -> CauldronResult<()> {
        self.copy.begin_transaction()
    }

    fn discard_transaction(&self) -> CauldronResult<()> {
        self.copy.discard_transaction()
    }

    fn commit_transaction(&self, message: &CommitMessage) -> CauldronResult<()> {
        self.copy.commit_transaction(message)
    }
}
