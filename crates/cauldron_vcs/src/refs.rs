//! Resolution of git references for branch-tracked packages.

use crate::error::{VcsError, VcsResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::process::Command;
use tracing::debug;

/// Resolves branches of remote git repositories to commit SHAs.
///
/// The release layer uses this to pin a branch-tracked package to the
/// commit its branch currently points at.
pub trait RefResolver: Send + Sync {
    /// Returns true if `reference` names a branch of the repository at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be queried.
    fn is_branch(&self, url: &str, reference: &str) -> VcsResult<bool>;

    /// Returns the commit SHA `reference` currently points at.
    ///
    /// # Errors
    ///
    /// Returns [`VcsError::UnknownRef`] if the reference does not exist.
    fn resolve_commit_sha(&self, url: &str, reference: &str) -> VcsResult<String>;
}

/// A resolver that queries remotes with `git ls-remote`.
#[derive(Debug, Clone, Default)]
pub struct LsRemoteResolver;

impl LsRemoteResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn ls_remote(&self, args: &[&str]) -> VcsResult<String> {
        debug!(?args, "git ls-remote");
        let output = Command::new("git").arg("ls-remote").args(args).output()?;
        if !output.status.success() {
            return Err(VcsError::command_failed(
                format!("ls-remote {}", args.join(" ")),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Returns the SHA of the first `sha\tref` line, if any.
fn first_sha(listing: &str) -> Option<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .find(|sha| !sha.is_empty())
        .map(str::to_string)
}

impl RefResolver for LsRemoteResolver {
    fn is_branch(&self, url: &str, reference: &str) -> VcsResult<bool> {
        let listing = self.ls_remote(&["--heads", url, reference])?;
        Ok(!listing.trim().is_empty())
    }

    fn resolve_commit_sha(&self, url: &str, reference: &str) -> VcsResult<String> {
        let listing = self.ls_remote(&[url, reference])?;
        first_sha(&listing).ok_or_else(|| VcsError::unknown_ref(url, reference))
    }
}

/// A table-driven resolver for tests.
///
/// Branches are registered with [`StaticRefResolver::set_branch`]; moving a
/// branch to a new SHA models a push to the package repository.
#[derive(Debug, Default)]
pub struct StaticRefResolver {
    branches: RwLock<HashMap<(String, String), String>>,
}

impl StaticRefResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a branch, returning the resolver for chaining.
    #[must_use]
    pub fn with_branch(self, url: &str, branch: &str, sha: &str) -> Self {
        self.set_branch(url, branch, sha);
        self
    }

    /// Points `branch` of `url` at `sha`.
    pub fn set_branch(&self, url: &str, branch: &str, sha: &str) {
        self.branches
            .write()
            .insert((url.to_string(), branch.to_string()), sha.to_string());
    }
}

impl RefResolver for StaticRefResolver {
    fn is_branch(&self, url: &str, reference: &str) -> VcsResult<bool> {
        Ok(self
            .branches
            .read()
            .contains_key(&(url.to_string(), reference.to_string())))
    }

    fn resolve_commit_sha(&self, url: &str, reference: &str) -> VcsResult<String> {
        self.branches
            .read()
            .get(&(url.to_string(), reference.to_string()))
            .cloned()
            .ok_or_else(|| VcsError::unknown_ref(url, reference))
    }
}
