//! # Cauldron Core
//!
//! Transactional, git-backed release-metadata store for native
//! application fleets.
//!
//! A Cauldron is one JSON document, a tree of native applications,
//! their platforms and their versions, plus the blobs that go with it:
//! configuration files, yarn locks and zipped bundles. Everything lives
//! in a git working copy mirrored to a remote.
//!
//! This crate provides:
//! - [`SyncedWorkingCopy`] - Sync-once-per-session access to the working copy
//! - [`GitDocumentStore`] and [`GitBlobStore`] - The document and its blobs
//! - [`CauldronStore`] - CRUD over the tree, keeping its invariants
//! - [`ReleaseManager`] - Release rules: immutability of released versions,
//!   configuration inheritance, branch tracking, bounded code push history
//! - [`UpgradeRegistry`] - Forward-only schema upgrades
//! - [`ActiveCauldron`] - The cauldron one command invocation works on
//!
//! ## Consistency
//!
//! - The first read of a process fetches the remote and hard-resets to it;
//!   later reads see that snapshot plus local writes
//! - Outside a transaction every mutation is one commit, pushed at once
//! - A transaction spans the document and every blob store and ends in
//!   one commit, without atomicity across stores
//! - Concurrent writers on one remote race: the last push wins
//!
//! ## Example
//!
//! ```rust
//! use cauldron_core::{AppNameDescriptor, CauldronConfig, CauldronStore, NativePlatform};
//! use cauldron_vcs::InMemoryGit;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = CauldronStore::open(
//!     Arc::new(InMemoryGit::new(dir.path())),
//!     &CauldronConfig::new(dir.path()),
//! );
//!
//! store.begin_transaction().unwrap();
//! store.create_native_application(&json!({"name": "myapp"})).unwrap();
//! let app = AppNameDescriptor::new("myapp");
//! store.create_platform(&app, &json!({"name": "ios"})).unwrap();
//! store.commit_transaction("Add myapp").unwrap();
//!
//! assert!(store.has_platform(&app.with_platform(NativePlatform::Ios)).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cauldron;
mod config;
mod context;
mod descriptor;
mod error;
pub mod model;
mod package;
mod release;
mod schema;
mod store;
mod upgrade;
pub mod version;
mod working_copy;

pub use cauldron::{
    normalize_file_path, CauldronObject, CauldronStore, ConfigLevel, VersionPatch, BUNDLES_DIRECTORY,
    YARN_LOCKS_DIRECTORY, YARN_LOCK_CONTAINER_KEY,
};
pub use config::{CauldronConfig, RepositoryUrl, DEFAULT_BRANCH, DEFAULT_REMOTE};
pub use context::{check_schema_version, ActiveCauldron, CauldronRepositories};
pub use descriptor::{
    AppNameDescriptor, AppPlatformDescriptor, AppVersionDescriptor, Descriptor, NativePlatform,
};
pub use error::{CauldronError, CauldronResult};
pub use model::{
    Cauldron, CodePushEntry, CodePushMetadata, CodePushPatch, Container, ContainerKey, JsPackage,
    NativeApp, Platform, Version, SCHEMA_VERSION,
};
pub use package::{PackageKind, PackagePath};
pub use release::{
    AddVersionOptions, CodePushConfig, PackageDelta, ReleaseFilter, ReleaseManager, LATEST_VERSION,
};
pub use schema::{BuiltinValidator, SchemaId, SchemaValidator};
pub use store::{GitBlobStore, GitDocumentStore, TransactionalStore, DOCUMENT_FILE};
pub use upgrade::{SchemaUpgrade, UpgradeInfo, UpgradeRegistry, UpgradeReport, V2ToV3};
pub use working_copy::{CommitMessage, SyncedWorkingCopy};
