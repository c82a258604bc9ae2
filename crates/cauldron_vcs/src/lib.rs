//! # Cauldron VCS
//!
//! Git backend trait and implementations for the Cauldron store.
//!
//! This crate provides the lowest-level persistence primitive of Cauldron:
//! a working directory kept under git and mirrored to a remote. Backends
//! are **opaque working-copy drivers** - they do not interpret the files
//! they stage and commit.
//!
//! ## Design Principles
//!
//! - Backends expose init, add, rm, commit, push, fetch, hard reset and
//!   remote head listing, nothing more
//! - No knowledge of the Cauldron document or blob layouts
//! - Must be `Send + Sync` so several stores can share one repository
//!
//! ## Available Backends
//!
//! - [`GitCli`] - Drives the `git` executable
//! - [`InMemoryGit`] - Keeps history in memory, for tests
//!
//! Branch-tracked packages are pinned through a [`RefResolver`]:
//! [`LsRemoteResolver`] for real repositories and [`StaticRefResolver`]
//! for tests.
//!
//! ## Example
//!
//! ```rust
//! use cauldron_vcs::{GitBackend, InMemoryGit, InMemoryRemote};
//! use std::path::Path;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let remote = InMemoryRemote::new();
//! let git = InMemoryGit::connected(dir.path(), remote.clone());
//! git.init().unwrap();
//! git.set_remote("upstream", "mem://cauldron").unwrap();
//! git.checkout_new_branch("master").unwrap();
//! std::fs::write(dir.path().join("README.md"), b"hello").unwrap();
//! git.add(Path::new("README.md")).unwrap();
//! git.commit(&["First Commit!".to_string()]).unwrap();
//! git.push("upstream", "master").unwrap();
//! assert_eq!(remote.commits("master").len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cli;
mod error;
mod memory;
mod refs;

pub use backend::GitBackend;
pub use cli::{GitCli, Identity};
pub use error::{VcsError, VcsResult};
pub use memory::{CommitRecord, InMemoryGit, InMemoryRemote, Snapshot};
pub use refs::{LsRemoteResolver, RefResolver, StaticRefResolver};
