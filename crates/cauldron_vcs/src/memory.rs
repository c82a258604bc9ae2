//! In-memory git backend for testing.
//!
//! The working tree is a real directory so that stores can read and write
//! files normally; only the object database, the index and the remotes
//! live in memory.

use crate::backend::GitBackend;
use crate::error::{VcsError, VcsResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File content of a tree, keyed by path relative to the working directory.
pub type Snapshot = BTreeMap<PathBuf, Vec<u8>>;

/// A commit recorded by [`InMemoryGit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Sequential identifier rendered as a 40-character hex string.
    pub id: String,
    /// Message paragraphs, in order.
    pub message: Vec<String>,
    /// Full tree content after the commit.
    pub tree: Snapshot,
}

impl CommitRecord {
    /// Returns the first paragraph of the message.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.message.first().map_or("", String::as_str)
    }
}

#[derive(Debug, Default)]
struct RemoteState {
    branches: HashMap<String, Vec<CommitRecord>>,
    pushes: usize,
}

/// A remote repository shared between [`InMemoryGit`] instances.
///
/// Cloning the handle shares the underlying state, which lets tests model
/// several processes operating against one remote. Pushes overwrite the
/// branch unconditionally (last writer wins).
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<RwLock<RemoteState>>,
}

impl InMemoryRemote {
    /// Creates an empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the commits on `branch`, oldest first.
    #[must_use]
    pub fn commits(&self, branch: &str) -> Vec<CommitRecord> {
        self.state
            .read()
            .branches
            .get(branch)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the content of `path` at the tip of `branch`.
    #[must_use]
    pub fn file(&self, branch: &str, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = self.state.read();
        state
            .branches
            .get(branch)
            .and_then(|log| log.last())
            .and_then(|tip| tip.tree.get(path.as_ref()).cloned())
    }

    /// Returns the number of pushes received.
    #[must_use]
    pub fn push_count(&self) -> usize {
        self.state.read().pushes
    }
}

#[derive(Debug, Default)]
struct RepoState {
    initialized: bool,
    branch: Option<String>,
    log: Vec<CommitRecord>,
    index: BTreeMap<PathBuf, Option<Vec<u8>>>,
    remotes: HashMap<String, String>,
    tracking: HashMap<String, Vec<CommitRecord>>,
    refuse_commits: bool,
}

impl RepoState {
    fn head_tree(&self) -> Snapshot {
        self.log.last().map(|c| c.tree.clone()).unwrap_or_default()
    }

    fn staged_tree(&self) -> Snapshot {
        let mut tree = self.head_tree();
        for (path, content) in &self.index {
            match content {
                Some(bytes) => {
                    tree.insert(path.clone(), bytes.clone());
                }
                None => {
                    tree.remove(path);
                }
            }
        }
        tree
    }

    fn next_id(&self) -> String {
        format!("{:040x}", self.log.len() + 1)
    }
}

/// A git backend that keeps history in memory over a real working tree.
///
/// It reproduces the git semantics the Cauldron store depends on:
///
/// - `commit` fails when nothing is staged, or while commits are refused
/// - `reset_hard` restores tracked files and deletes files that were only
///   staged, leaving untracked files alone
/// - `push` and `fetch_all` exchange commits with a connected
///   [`InMemoryRemote`]
///
/// # Example
///
/// ```rust
/// use cauldron_vcs::{GitBackend, InMemoryGit};
/// use std::path::Path;
///
/// let dir = tempfile::tempdir().unwrap();
/// let git = InMemoryGit::new(dir.path());
/// git.init().unwrap();
/// std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
/// git.add(Path::new("a.txt")).unwrap();
/// git.commit(&["Add a".to_string()]).unwrap();
/// assert_eq!(git.commit_count(), 1);
/// ```
#[derive(Debug)]
pub struct InMemoryGit {
    workdir: PathBuf,
    remote: Option<InMemoryRemote>,
    state: RwLock<RepoState>,
}

impl InMemoryGit {
    /// Creates a backend with no reachable remote.
    #[must_use]
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            remote: None,
            state: RwLock::new(RepoState::default()),
        }
    }

    /// Creates a backend whose remotes all resolve to `remote`.
    #[must_use]
    pub fn connected(workdir: impl Into<PathBuf>, remote: InMemoryRemote) -> Self {
        Self {
            remote: Some(remote),
            ..Self::new(workdir)
        }
    }

    /// Returns all local commits, oldest first.
    #[must_use]
    pub fn commit_log(&self) -> Vec<CommitRecord> {
        self.state.read().log.clone()
    }

    /// Returns the number of local commits.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.state.read().log.len()
    }

    /// Makes `commit` fail while `refuse` is set, the way a rejecting
    /// pre-commit hook does. Staged changes stay staged.
    pub fn refuse_commits(&self, refuse: bool) {
        self.state.write().refuse_commits = refuse;
    }

    /// Returns the checked out branch, if any.
    #[must_use]
    pub fn current_branch(&self) -> Option<String> {
        self.state.read().branch.clone()
    }

    fn ensure_initialized(&self, state: &RepoState) -> VcsResult<()> {
        if state.initialized {
            Ok(())
        } else {
            Err(VcsError::NotARepository {
                path: self.workdir.display().to_string(),
            })
        }
    }

    fn remote_for(&self, state: &RepoState, name: &str) -> VcsResult<&InMemoryRemote> {
        if !state.remotes.contains_key(name) {
            return Err(VcsError::UnknownRemote(name.to_string()));
        }
        self.remote.as_ref().ok_or_else(|| {
            VcsError::command_failed(
                format!("ls-remote {name}"),
                Some(128),
                "could not read from remote repository",
            )
        })
    }

    /// Reads every file under `relative` into `(path, content)` pairs.
    fn read_tree(&self, relative: &Path) -> VcsResult<Vec<(PathBuf, Vec<u8>)>> {
        let absolute = self.workdir.join(relative);
        let mut files = Vec::new();
        if absolute.is_file() {
            files.push((relative.to_path_buf(), std::fs::read(&absolute)?));
        } else if absolute.is_dir() {
            for entry in std::fs::read_dir(&absolute)? {
                let name = entry?.file_name();
                if name == ".git" {
                    continue;
                }
                files.extend(self.read_tree(&relative.join(name))?);
            }
        }
        Ok(files)
    }

    /// Makes the working tree match `target` for every path in `touched`.
    fn checkout(&self, touched: &[PathBuf], target: &Snapshot) -> VcsResult<()> {
        for path in touched {
            let absolute = self.workdir.join(path);
            match target.get(path) {
                Some(content) => {
                    if let Some(parent) = absolute.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&absolute, content)?;
                }
                None => {
                    if absolute.is_file() {
                        std::fs::remove_file(&absolute)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn is_under(path: &Path, prefix: &Path) -> bool {
    prefix.as_os_str().is_empty() || prefix == Path::new(".") || path.starts_with(prefix)
}

impl GitBackend for InMemoryGit {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn is_repository(&self) -> bool {
        self.state.read().initialized
    }

    fn init(&self) -> VcsResult<()> {
        std::fs::create_dir_all(&self.workdir)?;
        self.state.write().initialized = true;
        Ok(())
    }

    fn set_remote(&self, name: &str, url: &str) -> VcsResult<()> {
        let mut state = self.state.write();
        self.ensure_initialized(&state)?;
        state.remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }

    fn list_remote_heads(&self, remote: &str) -> VcsResult<String> {
        let state = self.state.read();
        let remote = self.remote_for(&state, remote)?;
        let remote_state = remote.state.read();
        let mut heads: Vec<_> = remote_state
            .branches
            .iter()
            .filter_map(|(branch, log)| log.last().map(|tip| (branch, &tip.id)))
            .collect();
        heads.sort();
        Ok(heads
            .into_iter()
            .map(|(branch, id)| format!("{id}\trefs/heads/{branch}\n"))
            .collect())
    }

    fn fetch_all(&self) -> VcsResult<()> {
        let mut state = self.state.write();
        self.ensure_initialized(&state)?;
        let names: Vec<String> = state.remotes.keys().cloned().collect();
        for name in names {
            let remote = self.remote_for(&state, &name)?.clone();
            let branches = remote.state.read().branches.clone();
            for (branch, log) in branches {
                state.tracking.insert(format!("{name}/{branch}"), log);
            }
        }
        Ok(())
    }

    fn reset_hard(&self, target: Option<&str>) -> VcsResult<()> {
        let mut state = self.state.write();
        self.ensure_initialized(&state)?;

        let new_log = match target {
            None => state.log.clone(),
            Some(reference) => state
                .tracking
                .get(reference)
                .cloned()
                .or_else(|| {
                    state
                        .branch
                        .as_deref()
                        .filter(|b| *b == reference)
                        .map(|_| state.log.clone())
                })
                .ok_or_else(|| {
                    VcsError::command_failed(
                        format!("reset --hard {reference}"),
                        Some(128),
                        format!("ambiguous argument '{reference}': unknown revision"),
                    )
                })?,
        };
        let new_tree = new_log.last().map(|c| c.tree.clone()).unwrap_or_default();

        let mut touched: Vec<PathBuf> = state.head_tree().into_keys().collect();
        touched.extend(state.index.keys().cloned());
        touched.extend(new_tree.keys().cloned());
        touched.sort();
        touched.dedup();

        self.checkout(&touched, &new_tree)?;
        state.log = new_log;
        state.index.clear();
        Ok(())
    }

    fn checkout_new_branch(&self, branch: &str) -> VcsResult<()> {
        let mut state = self.state.write();
        self.ensure_initialized(&state)?;
        if state.branch.as_deref() == Some(branch) && !state.log.is_empty() {
            return Err(VcsError::command_failed(
                format!("checkout -b {branch}"),
                Some(128),
                format!("a branch named '{branch}' already exists"),
            ));
        }
        state.branch = Some(branch.to_string());
        Ok(())
    }

    fn add(&self, path: &Path) -> VcsResult<()> {
        let mut state = self.state.write();
        self.ensure_initialized(&state)?;

        let path = if path == Path::new(".") { Path::new("") } else { path };
        let on_disk = self.read_tree(path)?;
        let staged = state.staged_tree();
        for tracked in staged.keys().filter(|p| is_under(p, path)) {
            if !on_disk.iter().any(|(p, _)| p == tracked) {
                state.index.insert(tracked.clone(), None);
            }
        }
        for (file, content) in on_disk {
            state.index.insert(file, Some(content));
        }
        Ok(())
    }

    fn rm(&self, path: &Path) -> VcsResult<()> {
        let mut state = self.state.write();
        self.ensure_initialized(&state)?;

        let staged = state.staged_tree();
        let tracked: Vec<PathBuf> = staged
            .keys()
            .filter(|p| is_under(p, path))
            .cloned()
            .collect();
        if tracked.is_empty() {
            return Err(VcsError::command_failed(
                format!("rm -r -f -- {}", path.display()),
                Some(128),
                format!("pathspec '{}' did not match any files", path.display()),
            ));
        }
        for file in tracked {
            let absolute = self.workdir.join(&file);
            if absolute.is_file() {
                std::fs::remove_file(&absolute)?;
            }
            state.index.insert(file, None);
        }
        Ok(())
    }

    fn has_staged_changes(&self) -> VcsResult<bool> {
        let state = self.state.read();
        self.ensure_initialized(&state)?;
        Ok(state.staged_tree() != state.head_tree())
    }

    fn commit(&self, message: &[String]) -> VcsResult<()> {
        let mut state = self.state.write();
        self.ensure_initialized(&state)?;

        if state.refuse_commits {
            return Err(VcsError::command_failed(
                "commit",
                Some(1),
                "pre-commit hook rejected the commit",
            ));
        }
        let tree = state.staged_tree();
        if tree == state.head_tree() {
            return Err(VcsError::command_failed(
                "commit",
                Some(1),
                "nothing to commit, working tree clean",
            ));
        }
        let record = CommitRecord {
            id: state.next_id(),
            message: message.to_vec(),
            tree,
        };
        state.log.push(record);
        state.index.clear();
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> VcsResult<()> {
        let mut state = self.state.write();
        let target = self.remote_for(&state, remote)?.clone();
        if state.log.is_empty() {
            return Err(VcsError::command_failed(
                format!("push {remote} {branch}"),
                Some(1),
                format!("src refspec {branch} does not match any"),
            ));
        }
        let log = state.log.clone();
        {
            let mut remote_state = target.state.write();
            remote_state.branches.insert(branch.to_string(), log.clone());
            remote_state.pushes += 1;
        }
        state.tracking.insert(format!("{remote}/{branch}"), log);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &[u8]) {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn msg(text: &str) -> Vec<String> {
        vec![text.to_string()]
    }

    #[test]
    fn memory_requires_init() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::new(dir.path());
        assert!(!git.is_repository());
        assert!(matches!(
            git.add(Path::new("a")),
            Err(VcsError::NotARepository { .. })
        ));
    }

    #[test]
    fn memory_commit_requires_staged_changes() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::new(dir.path());
        git.init().unwrap();
        assert!(!git.has_staged_changes().unwrap());
        assert!(git.commit(&msg("empty")).is_err());

        write(dir.path(), "a.txt", b"a");
        git.add(Path::new("a.txt")).unwrap();
        assert!(git.has_staged_changes().unwrap());
        git.commit(&msg("Add a")).unwrap();

        let log = git.commit_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].summary(), "Add a");
        assert_eq!(log[0].tree.get(Path::new("a.txt")).unwrap(), b"a");
    }

    #[test]
    fn memory_refused_commit_keeps_index() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::new(dir.path());
        git.init().unwrap();
        write(dir.path(), "a.txt", b"a");
        git.add(Path::new("a.txt")).unwrap();

        git.refuse_commits(true);
        assert!(matches!(
            git.commit(&msg("Add a")),
            Err(VcsError::CommandFailed { .. })
        ));
        assert!(git.has_staged_changes().unwrap());

        git.refuse_commits(false);
        git.commit(&msg("Add a")).unwrap();
        assert_eq!(git.commit_count(), 1);
    }

    #[test]
    fn memory_add_directory_stages_nested_files() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::new(dir.path());
        git.init().unwrap();
        write(dir.path(), "locks/one", b"1");
        write(dir.path(), "locks/two", b"2");
        git.add(Path::new("locks")).unwrap();
        git.commit(&msg("locks")).unwrap();
        assert_eq!(git.commit_log()[0].tree.len(), 2);
    }

    #[test]
    fn memory_reset_hard_discards_staged_and_new_files() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::new(dir.path());
        git.init().unwrap();
        write(dir.path(), "doc.json", b"v1");
        git.add(Path::new("doc.json")).unwrap();
        git.commit(&msg("v1")).unwrap();

        write(dir.path(), "doc.json", b"v2");
        write(dir.path(), "blob", b"new");
        git.add(Path::new("doc.json")).unwrap();
        git.add(Path::new("blob")).unwrap();
        write(dir.path(), "untracked", b"keep");

        git.reset_hard(None).unwrap();

        assert_eq!(std::fs::read(dir.path().join("doc.json")).unwrap(), b"v1");
        assert!(!dir.path().join("blob").exists());
        assert!(dir.path().join("untracked").exists());
        assert!(!git.has_staged_changes().unwrap());
    }

    #[test]
    fn memory_rm_deletes_and_stages() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::new(dir.path());
        git.init().unwrap();
        write(dir.path(), "a.txt", b"a");
        git.add(Path::new("a.txt")).unwrap();
        git.commit(&msg("a")).unwrap();

        git.rm(Path::new("a.txt")).unwrap();
        assert!(!dir.path().join("a.txt").exists());
        git.commit(&msg("rm a")).unwrap();
        assert!(git.commit_log()[1].tree.is_empty());

        assert!(git.rm(Path::new("a.txt")).is_err());
    }

    #[test]
    fn memory_push_fetch_reset_between_clones() {
        let remote = InMemoryRemote::new();
        let first_dir = tempdir().unwrap();
        let second_dir = tempdir().unwrap();

        let first = InMemoryGit::connected(first_dir.path(), remote.clone());
        first.init().unwrap();
        first.set_remote("upstream", "mem://cauldron").unwrap();
        assert_eq!(first.list_remote_heads("upstream").unwrap(), "");

        first.checkout_new_branch("master").unwrap();
        write(first_dir.path(), "README.md", b"hello");
        first.add(Path::new("README.md")).unwrap();
        first.commit(&msg("First Commit!")).unwrap();
        first.push("upstream", "master").unwrap();

        assert_eq!(remote.push_count(), 1);
        assert_eq!(remote.file("master", "README.md").unwrap(), b"hello");

        let second = InMemoryGit::connected(second_dir.path(), remote.clone());
        second.init().unwrap();
        second.set_remote("upstream", "mem://cauldron").unwrap();
        assert!(second
            .list_remote_heads("upstream")
            .unwrap()
            .contains("refs/heads/master"));
        second.fetch_all().unwrap();
        second.reset_hard(Some("upstream/master")).unwrap();

        assert_eq!(
            std::fs::read(second_dir.path().join("README.md")).unwrap(),
            b"hello"
        );
        assert_eq!(second.commit_count(), 1);
    }

    #[test]
    fn memory_unknown_remote_is_an_error() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::connected(dir.path(), InMemoryRemote::new());
        git.init().unwrap();
        assert!(matches!(
            git.list_remote_heads("origin"),
            Err(VcsError::UnknownRemote(_))
        ));
    }

    #[test]
    fn memory_reset_to_unknown_ref_fails() {
        let dir = tempdir().unwrap();
        let git = InMemoryGit::new(dir.path());
        git.init().unwrap();
        assert!(git.reset_hard(Some("upstream/master")).is_err());
    }
}
