//! Local working copy mirrored to a remote replica.

use crate::config::CauldronConfig;
use crate::error::{CauldronError, CauldronResult};
use cauldron_vcs::GitBackend;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const README: &str = "README.md";
const README_CONTENT: &str = "### Cauldron Repository";
const FIRST_COMMIT: &str = "First Commit!";

/// A commit message made of one or more paragraphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage(Vec<String>);

impl CommitMessage {
    /// Returns the paragraphs, in order.
    #[must_use]
    pub fn paragraphs(&self) -> &[String] {
        &self.0
    }

    /// Returns the first paragraph.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.0.first().map_or("", String::as_str)
    }
}

impl From<&str> for CommitMessage {
    fn from(message: &str) -> Self {
        Self(vec![message.to_string()])
    }
}

impl From<String> for CommitMessage {
    fn from(message: String) -> Self {
        Self(vec![message])
    }
}

impl From<&String> for CommitMessage {
    fn from(message: &String) -> Self {
        Self(vec![message.clone()])
    }
}

impl From<Vec<String>> for CommitMessage {
    fn from(paragraphs: Vec<String>) -> Self {
        Self(paragraphs)
    }
}

impl<const N: usize> From<[&str; N]> for CommitMessage {
    fn from(paragraphs: [&str; N]) -> Self {
        Self(paragraphs.iter().map(|p| (*p).to_string()).collect())
    }
}

/// State shared by every handle over one repository.
struct Repository {
    backend: Arc<dyn GitBackend>,
    url: Option<String>,
    branch: String,
    remote: String,
    synced: AtomicBool,
}

/// A working directory kept in sync with a remote repository.
///
/// Handles created with [`SyncedWorkingCopy::fork`] share the repository
/// and the session sync flag, but each tracks its own pending transaction.
/// Every store owns one handle.
///
/// # Synchronization
///
/// The first [`sync`](Self::sync) of a session fetches the remote and hard
/// resets the working copy to the remote branch, discarding local state.
/// Later calls are no-ops, so a burst of reads sees one snapshot. A remote
/// changed by another process is not observed until the next session.
pub struct SyncedWorkingCopy {
    repo: Arc<Repository>,
    pending: AtomicBool,
}

impl SyncedWorkingCopy {
    /// Creates a handle over the working copy described by `config`.
    pub fn new(backend: Arc<dyn GitBackend>, config: &CauldronConfig) -> Self {
        Self {
            repo: Arc::new(Repository {
                backend,
                url: config.repository.clone(),
                branch: config.branch.clone(),
                remote: config.remote.clone(),
                synced: AtomicBool::new(false),
            }),
            pending: AtomicBool::new(false),
        }
    }

    /// Creates another handle over the same repository.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            pending: AtomicBool::new(false),
        }
    }

    /// Returns the working directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.repo.backend.workdir()
    }

    /// Returns the git backend.
    #[must_use]
    pub fn backend(&self) -> &dyn GitBackend {
        self.repo.backend.as_ref()
    }

    /// Returns the remote URL, if any.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.repo.url.as_deref()
    }

    /// Returns the branch.
    #[must_use]
    pub fn branch(&self) -> &str {
        &self.repo.branch
    }

    /// Returns true while this handle has a transaction open.
    #[must_use]
    pub fn has_pending_transaction(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Creates the repository and its first commit if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a git operation fails.
    pub fn ensure_initialized(&self) -> CauldronResult<()> {
        let backend = self.backend();
        if !backend.is_repository() {
            std::fs::create_dir_all(backend.workdir())?;
            backend.init()?;
            self.initial_commit()?;
        }
        Ok(())
    }

    /// Synchronizes the working copy with the remote.
    ///
    /// Without a remote this only makes sure the repository exists. With
    /// one, it runs once per session and never while a transaction is
    /// pending. Returns true if a synchronization took place.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Sync`] if a git operation fails.
    pub fn sync(&self) -> CauldronResult<bool> {
        let Some(url) = self.repo.url.as_deref() else {
            self.ensure_initialized()?;
            return Ok(true);
        };
        if self.has_pending_transaction() || self.repo.synced.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let backend = self.backend();
        let remote = self.repo.remote.as_str();
        let branch = self.repo.branch.as_str();
        info!(path = %backend.workdir().display(), "syncing cauldron");

        if !backend.is_repository() {
            debug!("creating local repository");
            std::fs::create_dir_all(backend.workdir())?;
            backend.init()?;
            backend.checkout_new_branch(branch)?;
        }
        backend.set_remote(remote, url)?;

        let heads = backend.list_remote_heads(remote)?;
        if heads.trim().is_empty() {
            self.initial_commit()?;
            backend.push(remote, branch)?;
        } else {
            debug!(remote, branch, "fetching");
            backend.fetch_all()?;
            backend.reset_hard(Some(&format!("{remote}/{branch}")))?;
        }

        self.repo.synced.store(true, Ordering::SeqCst);
        Ok(true)
    }

    /// Pushes the branch to the remote. A no-op without a remote.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Sync`] if the push fails.
    pub fn push(&self) -> CauldronResult<()> {
        if self.repo.url.is_some() {
            self.backend().push(&self.repo.remote, &self.repo.branch)?;
        }
        Ok(())
    }

    /// Commits staged changes and pushes them.
    ///
    /// Nothing is committed when nothing is staged, which happens when an
    /// earlier commit of a sibling handle already covered the changes.
    /// Returns true if a commit was made.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Sync`] if a git operation fails.
    pub fn commit(&self, message: &CommitMessage) -> CauldronResult<bool> {
        let backend = self.backend();
        if !backend.has_staged_changes()? {
            debug!(message = message.summary(), "nothing staged, skipping commit");
            return Ok(false);
        }
        debug!(message = message.summary(), "committing");
        backend.commit(message.paragraphs())?;
        self.push()?;
        Ok(true)
    }

    /// Opens a transaction: later changes are staged but not committed.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if a transaction is
    /// already pending.
    pub fn begin_transaction(&self) -> CauldronResult<()> {
        if self.has_pending_transaction() {
            return Err(CauldronError::transaction_state(
                "A transaction is already pending",
            ));
        }
        self.sync()?;
        self.pending.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Drops every uncommitted change and closes the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if no transaction is
    /// pending.
    pub fn discard_transaction(&self) -> CauldronResult<()> {
        if !self.has_pending_transaction() {
            return Err(CauldronError::transaction_state(
                "No pending transaction to discard",
            ));
        }
        self.backend().reset_hard(None)?;
        self.pending.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Commits the transaction's changes, pushes them and closes it.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if no transaction is
    /// pending, or [`CauldronError::Sync`] if the commit or push fails. A
    /// failed commit leaves the transaction open.
    pub fn commit_transaction(&self, message: &CommitMessage) -> CauldronResult<()> {
        if !self.has_pending_transaction() {
            return Err(CauldronError::transaction_state(
                "No pending transaction to commit",
            ));
        }
        if self.commit(message)? {
            info!(message = message.summary(), "transaction committed");
        }
        self.pending.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn initial_commit(&self) -> CauldronResult<()> {
        let backend = self.backend();
        let readme = backend.workdir().join(README);
        if readme.exists() {
            return Ok(());
        }
        debug!("performing initial commit");
        backend.checkout_new_branch(&self.repo.branch)?;
        std::fs::write(&readme, README_CONTENT)?;
        backend.add(Path::new(README))?;
        backend.commit(&[FIRST_COMMIT.to_string()])?;
        Ok(())
    }
}

impl std::fmt::Debug for SyncedWorkingCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncedWorkingCopy")
            .field("path", &self.path())
            .field("url", &self.repo.url)
            .field("branch", &self.repo.branch)
            .field("pending", &self.has_pending_transaction())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cauldron_vcs::{InMemoryGit, InMemoryRemote};
    use tempfile::tempdir;

    fn remote_copy(dir: &Path, remote: &InMemoryRemote) -> (Arc<InMemoryGit>, SyncedWorkingCopy) {
        let git = Arc::new(InMemoryGit::connected(dir, remote.clone()));
        let config = CauldronConfig::new(dir).repository("mem://cauldron");
        let copy = SyncedWorkingCopy::new(git.clone(), &config);
        (git, copy)
    }

    #[test]
    fn local_sync_bootstraps_repository() {
        let dir = tempdir().unwrap();
        let git = Arc::new(InMemoryGit::new(dir.path()));
        let copy = SyncedWorkingCopy::new(git.clone(), &CauldronConfig::new(dir.path()));

        assert!(copy.sync().unwrap());
        assert!(copy.sync().unwrap());
        assert_eq!(git.commit_count(), 1);
        assert_eq!(git.commit_log()[0].summary(), "First Commit!");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("README.md")).unwrap(),
            "### Cauldron Repository"
        );
        // Local copies have nothing to push to.
        copy.push().unwrap();
    }

    #[test]
    fn first_sync_against_empty_remote_pushes_bootstrap() {
        let dir = tempdir().unwrap();
        let remote = InMemoryRemote::new();
        let (_, copy) = remote_copy(dir.path(), &remote);

        assert!(copy.sync().unwrap());
        assert_eq!(remote.commits("master").len(), 1);
        assert!(!copy.sync().unwrap());
        assert_eq!(remote.push_count(), 1);
    }

    #[test]
    fn sync_resets_to_remote_state() {
        let remote = InMemoryRemote::new();
        let first = tempdir().unwrap();
        let (_, writer) = remote_copy(first.path(), &remote);
        writer.sync().unwrap();
        std::fs::write(first.path().join("doc.json"), b"{}").unwrap();
        writer.backend().add(Path::new("doc.json")).unwrap();
        writer.commit(&"Add doc".into()).unwrap();

        let second = tempdir().unwrap();
        std::fs::write(second.path().join("stray.txt"), b"local").unwrap();
        let (git, reader) = remote_copy(second.path(), &remote);
        assert!(reader.sync().unwrap());
        assert_eq!(git.commit_count(), 2);
        assert_eq!(std::fs::read(second.path().join("doc.json")).unwrap(), b"{}");
    }

    #[test]
    fn transaction_state_errors() {
        let dir = tempdir().unwrap();
        let copy = SyncedWorkingCopy::new(
            Arc::new(InMemoryGit::new(dir.path())),
            &CauldronConfig::new(dir.path()),
        );
        assert!(matches!(
            copy.discard_transaction(),
            Err(CauldronError::TransactionState { .. })
        ));
        assert!(copy.commit_transaction(&"x".into()).is_err());

        copy.begin_transaction().unwrap();
        assert!(copy.has_pending_transaction());
        assert!(matches!(
            copy.begin_transaction(),
            Err(CauldronError::TransactionState { .. })
        ));
        copy.discard_transaction().unwrap();
        assert!(!copy.has_pending_transaction());
    }

    #[test]
    fn discard_drops_staged_files() {
        let dir = tempdir().unwrap();
        let git = Arc::new(InMemoryGit::new(dir.path()));
        let copy = SyncedWorkingCopy::new(git.clone(), &CauldronConfig::new(dir.path()));
        copy.begin_transaction().unwrap();
        std::fs::write(dir.path().join("new.txt"), b"x").unwrap();
        git.add(Path::new("new.txt")).unwrap();
        copy.discard_transaction().unwrap();
        assert!(!dir.path().join("new.txt").exists());
        assert_eq!(git.commit_count(), 1);
    }

    #[test]
    fn forks_share_session_but_not_transactions() {
        let dir = tempdir().unwrap();
        let git = Arc::new(InMemoryGit::new(dir.path()));
        let copy = SyncedWorkingCopy::new(git.clone(), &CauldronConfig::new(dir.path()));
        let sibling = copy.fork();

        copy.begin_transaction().unwrap();
        assert!(!sibling.has_pending_transaction());
        sibling.begin_transaction().unwrap();

        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        git.add(Path::new("a.txt")).unwrap();
        copy.commit_transaction(&["Two", "paragraphs"].into()).unwrap();
        sibling.commit_transaction(&"ignored".into()).unwrap();

        let log = git.commit_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].message, vec!["Two".to_string(), "paragraphs".to_string()]);
    }
}
