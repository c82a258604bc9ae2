//! Git backend trait definition.

use crate::error::VcsResult;
use std::path::Path;

/// The version-control primitive a Cauldron working copy is built on.
///
/// Backends drive **one working directory**. They know nothing about the
/// Cauldron document or blob layout; the store owns all interpretation of
/// the files it writes.
///
/// # Invariants
///
/// - Paths passed to `add` and `rm` are relative to [`GitBackend::workdir`]
/// - `list_remote_heads` returns an empty string when the remote has no branch
/// - `reset_hard` discards every staged and unstaged change to tracked files
/// - Backends must be `Send + Sync` so stores can share them
///
/// # Implementors
///
/// - [`super::GitCli`] - Shells out to the `git` executable
/// - [`super::InMemoryGit`] - For testing
pub trait GitBackend: Send + Sync {
    /// Returns the working directory this backend operates on.
    fn workdir(&self) -> &Path;

    /// Returns true if the working directory has been initialized.
    fn is_repository(&self) -> bool;

    /// Initializes an empty repository in the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be created.
    fn init(&self) -> VcsResult<()>;

    /// Adds a remote, or points an existing remote at a new URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote configuration cannot be written.
    fn set_remote(&self, name: &str, url: &str) -> VcsResult<()>;

    /// Lists the branch heads of a remote, one `sha\tref` pair per line.
    ///
    /// An empty string means the remote has no commits yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote is unknown or unreachable.
    fn list_remote_heads(&self, remote: &str) -> VcsResult<String>;

    /// Fetches all refs from all configured remotes.
    ///
    /// # Errors
    ///
    /// Returns an error if a remote is unreachable.
    fn fetch_all(&self) -> VcsResult<()>;

    /// Resets the index and the working tree.
    ///
    /// With `None` the reset targets the current `HEAD`, otherwise the given
    /// ref (for example `upstream/master`).
    ///
    /// # Errors
    ///
    /// Returns an error if the target ref does not exist.
    fn reset_hard(&self, target: Option<&str>) -> VcsResult<()>;

    /// Creates a branch and checks it out.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be created.
    fn checkout_new_branch(&self, branch: &str) -> VcsResult<()>;

    /// Stages the file or directory at `path`.
    ///
    /// Staging a path that no longer exists records its deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be staged.
    fn add(&self, path: &Path) -> VcsResult<()>;

    /// Removes `path` from the working tree and stages the deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not tracked.
    fn rm(&self, path: &Path) -> VcsResult<()>;

    /// Returns true if the index differs from `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn has_staged_changes(&self) -> VcsResult<bool>;

    /// Records the staged changes as a new commit.
    ///
    /// Each element of `message` becomes one paragraph of the commit message.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is staged or the commit cannot be written.
    fn commit(&self, message: &[String]) -> VcsResult<()>;

    /// Pushes `branch` to `remote`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote rejects the push or is unreachable.
    fn push(&self, remote: &str, branch: &str) -> VcsResult<()>;
}
