//! The Cauldron store.
//!
//! [`CauldronStore`] is the only component that interprets the document's
//! structure. It pairs one [`GitDocumentStore`] with three
//! [`GitBlobStore`]s (arbitrary files, yarn locks and bundles) over the
//! same working copy, and keeps the document invariants intact across
//! every mutation.

mod code_push;
mod container;
mod files;

pub(crate) use container::require_version;
pub use files::{
    normalize_file_path, ConfigLevel, BUNDLES_DIRECTORY, YARN_LOCKS_DIRECTORY, YARN_LOCK_CONTAINER_KEY,
};

use crate::config::CauldronConfig;
use crate::descriptor::{
    AppNameDescriptor, AppPlatformDescriptor, AppVersionDescriptor, Descriptor,
};
use crate::error::{CauldronError, CauldronResult};
use crate::model::{Cauldron, NativeApp, Platform, Version};
use crate::schema::{BuiltinValidator, SchemaId, SchemaValidator};
use crate::store::{GitBlobStore, GitDocumentStore, TransactionalStore};
use crate::upgrade::{UpgradeRegistry, UpgradeReport};
use crate::working_copy::{CommitMessage, SyncedWorkingCopy};
use cauldron_vcs::GitBackend;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// One entity of the tree, as returned by [`CauldronStore::get_descriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum CauldronObject {
    /// A native application.
    App(NativeApp),
    /// A platform.
    Platform(Platform),
    /// A version.
    Version(Version),
}

/// Editable fields of an existing version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPatch {
    /// New release status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_released: Option<bool>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CRUD access to a Cauldron.
///
/// Every mutation either commits at once, or, inside a transaction opened
/// with [`begin_transaction`](Self::begin_transaction), waits for
/// [`commit_transaction`](Self::commit_transaction).
///
/// # Transactions
///
/// Transactions span the document store and every blob store. There is no
/// two-phase commit: stores commit one after the other, and a failure in a
/// later store leaves earlier commits in place.
///
/// # Example
///
/// ```rust
/// use cauldron_core::{AppNameDescriptor, CauldronConfig, CauldronStore, NativePlatform};
/// use cauldron_vcs::InMemoryGit;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let dir = tempfile::tempdir().unwrap();
/// let git = Arc::new(InMemoryGit::new(dir.path()));
/// let store = CauldronStore::open(git, &CauldronConfig::new(dir.path()));
///
/// store.create_native_application(&json!({"name": "myapp"})).unwrap();
/// let app = AppNameDescriptor::new("myapp");
/// store.create_platform(&app, &json!({"name": "android"})).unwrap();
///
/// let platform = app.with_platform(NativePlatform::Android);
/// store.create_version(&platform, &json!({"name": "1.0.0"})).unwrap();
/// assert!(store.has_version(&platform.with_version("1.0.0")).unwrap());
/// ```
pub struct CauldronStore {
    document: GitDocumentStore,
    files: GitBlobStore,
    yarn_locks: GitBlobStore,
    bundles: GitBlobStore,
    validator: Arc<dyn SchemaValidator>,
}

impl CauldronStore {
    /// Creates a store over `copy`.
    ///
    /// Each inner store gets its own handle on the working copy.
    #[must_use]
    pub fn new(copy: SyncedWorkingCopy) -> Self {
        Self {
            files: GitBlobStore::new(copy.fork(), ""),
            yarn_locks: GitBlobStore::new(copy.fork(), YARN_LOCKS_DIRECTORY),
            bundles: GitBlobStore::new(copy.fork(), BUNDLES_DIRECTORY),
            document: GitDocumentStore::new(copy),
            validator: Arc::new(BuiltinValidator::new()),
        }
    }

    /// Creates a store over the working copy described by `config`.
    pub fn open(backend: Arc<dyn GitBackend>, config: &CauldronConfig) -> Self {
        Self::new(SyncedWorkingCopy::new(backend, config))
    }

    /// Replaces the schema validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Returns the working copy of the document store.
    #[must_use]
    pub fn working_copy(&self) -> &SyncedWorkingCopy {
        self.document.working_copy()
    }

    fn stores(&self) -> [&dyn TransactionalStore; 4] {
        [&self.document, &self.files, &self.yarn_locks, &self.bundles]
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Opens a transaction on every store.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if one is pending.
    pub fn begin_transaction(&self) -> CauldronResult<()> {
        for store in self.stores() {
            store.begin_transaction()?;
        }
        Ok(())
    }

    /// Drops every change made since the transaction began.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if none is pending.
    pub fn discard_transaction(&self) -> CauldronResult<()> {
        for store in self.stores() {
            store.discard_transaction()?;
        }
        Ok(())
    }

    /// Commits every change made since the transaction began, as one
    /// commit, and pushes it.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if none is pending, or
    /// [`CauldronError::Sync`] if a store fails to commit. Stores that
    /// committed before the failure are not rolled back.
    pub fn commit_transaction(&self, message: impl Into<CommitMessage>) -> CauldronResult<()> {
        let message = message.into();
        for store in self.stores() {
            store.commit_transaction(&message)?;
        }
        info!(message = message.summary(), "cauldron transaction committed");
        Ok(())
    }

    /// Writes the in-memory document, committing it outside a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or a git operation fails.
    pub fn commit(&self, message: impl Into<CommitMessage>) -> CauldronResult<()> {
        self.document.commit(message)
    }

    fn mutate<R>(
        &self,
        message: impl Into<CommitMessage>,
        f: impl FnOnce(&mut Cauldron) -> CauldronResult<R>,
    ) -> CauldronResult<R> {
        let result = self.document.update(f)?;
        if let Err(error) = self.document.commit(message) {
            self.recover_from_failed_commit(&error);
            return Err(error);
        }
        Ok(result)
    }

    /// Brings the cached document back in line with the working copy.
    ///
    /// Outside a transaction, uncommitted changes of every store are
    /// dropped first.
    fn recover_from_failed_commit(&self, error: &CauldronError) {
        warn!(%error, "cauldron commit failed, reloading document");
        let copy = self.working_copy();
        if !copy.has_pending_transaction() {
            if let Err(reset) = copy.backend().reset_hard(None) {
                warn!(error = %reset, "failed to drop uncommitted changes");
            }
        }
        self.document.reload();
    }

    fn mutate_version<R>(
        &self,
        descriptor: &AppVersionDescriptor,
        message: impl Into<CommitMessage>,
        f: impl FnOnce(&mut Version) -> CauldronResult<R>,
    ) -> CauldronResult<R> {
        self.mutate(message, |doc| {
            let version = doc
                .version_mut(descriptor)
                .ok_or_else(|| CauldronError::not_found(descriptor.to_string()))?;
            f(version)
        })
    }

    fn validated<T: Serialize, U: DeserializeOwned>(&self, candidate: &T, schema: SchemaId) -> CauldronResult<U> {
        let value = serde_json::to_value(candidate)?;
        let validated = self.validator.validate(value, schema)?;
        Ok(serde_json::from_value(validated)?)
    }

    // ------------------------------------------------------------------
    // Document
    // ------------------------------------------------------------------

    /// Returns the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn get_cauldron(&self) -> CauldronResult<Cauldron> {
        self.document.document()
    }

    /// Returns the document schema version, `0.0.0` if it has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn schema_version(&self) -> CauldronResult<String> {
        Ok(self.get_cauldron()?.schema_version().to_string())
    }

    /// Mutates the raw document and commits it.
    ///
    /// Used by schema upgrades, which need fields the typed operations do
    /// not expose. The invariants are checked again before committing.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or [`CauldronError::InvalidDocument`] if
    /// `f` broke an invariant.
    pub fn update_cauldron<R>(
        &self,
        message: impl Into<CommitMessage>,
        f: impl FnOnce(&mut Cauldron) -> CauldronResult<R>,
    ) -> CauldronResult<R> {
        self.mutate(message, |doc| {
            let result = f(doc)?;
            doc.check_invariants()?;
            Ok(result)
        })
    }

    /// Removes every native application.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    pub fn clear_cauldron(&self) -> CauldronResult<()> {
        self.mutate("Clear Cauldron", |doc| {
            doc.native_apps.clear();
            Ok(())
        })
    }

    /// Applies the schema upgrades of `registry` to the document.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Upgrade`] if the document already uses the
    /// latest schema, or if no upgrade starts at its version.
    pub fn upgrade_cauldron_schema(&self, registry: &UpgradeRegistry) -> CauldronResult<UpgradeReport> {
        registry.upgrade(self)
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Returns every native application.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn get_native_applications(&self) -> CauldronResult<Vec<NativeApp>> {
        Ok(self.get_cauldron()?.native_apps)
    }

    /// Returns a native application.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn get_native_application(&self, descriptor: &AppNameDescriptor) -> CauldronResult<NativeApp> {
        self.get_cauldron()?
            .app(descriptor)
            .cloned()
            .ok_or_else(|| CauldronError::not_found(descriptor.to_string()))
    }

    /// Returns the platforms of a native application.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the application does not exist.
    pub fn get_platforms(&self, descriptor: &AppNameDescriptor) -> CauldronResult<Vec<Platform>> {
        Ok(self.get_native_application(descriptor)?.platforms)
    }

    /// Returns a platform.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn get_platform(&self, descriptor: &AppPlatformDescriptor) -> CauldronResult<Platform> {
        self.get_cauldron()?
            .platform(descriptor)
            .cloned()
            .ok_or_else(|| CauldronError::not_found(descriptor.to_string()))
    }

    /// Returns the versions of a platform, in version order.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the platform does not exist.
    pub fn get_versions(&self, descriptor: &AppPlatformDescriptor) -> CauldronResult<Vec<Version>> {
        Ok(self.get_platform(descriptor)?.versions)
    }

    /// Returns a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn get_version(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Version> {
        self.get_cauldron()?
            .version(descriptor)
            .cloned()
            .ok_or_else(|| CauldronError::not_found(descriptor.to_string()))
    }

    /// Returns true if the native application exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn has_native_application(&self, descriptor: &AppNameDescriptor) -> CauldronResult<bool> {
        Ok(self.get_cauldron()?.app(descriptor).is_some())
    }

    /// Returns true if the platform exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn has_platform(&self, descriptor: &AppPlatformDescriptor) -> CauldronResult<bool> {
        Ok(self.get_cauldron()?.platform(descriptor).is_some())
    }

    /// Returns true if the version exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn has_version(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<bool> {
        Ok(self.get_cauldron()?.version(descriptor).is_some())
    }

    /// Returns the entity a descriptor of any depth points at.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn get_descriptor(&self, descriptor: &Descriptor) -> CauldronResult<CauldronObject> {
        match descriptor {
            Descriptor::App(d) => self.get_native_application(d).map(CauldronObject::App),
            Descriptor::Platform(d) => self.get_platform(d).map(CauldronObject::Platform),
            Descriptor::Version(d) => self.get_version(d).map(CauldronObject::Version),
        }
    }

    /// Returns true if the entity a descriptor points at exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn has_descriptor(&self, descriptor: &Descriptor) -> CauldronResult<bool> {
        match descriptor {
            Descriptor::App(d) => self.has_native_application(d),
            Descriptor::Platform(d) => self.has_platform(d),
            Descriptor::Version(d) => self.has_version(d),
        }
    }

    // ------------------------------------------------------------------
    // Creation and removal
    // ------------------------------------------------------------------

    /// Creates every missing level of `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error if a creation fails.
    pub fn add_descriptor(&self, descriptor: &Descriptor) -> CauldronResult<()> {
        let app = descriptor.to_name();
        if !self.has_native_application(&app)? {
            self.create_native_application(&NativeApp::new(app.name()))?;
        }
        if let Some(platform) = descriptor.to_platform() {
            if !self.has_platform(&platform)? {
                self.create_platform(&app, &Platform::new(platform.platform()))?;
            }
            if let Descriptor::Version(version) = descriptor {
                if !self.has_version(version)? {
                    self.create_version(&platform, &Version::new(version.version()))?;
                }
            }
        }
        Ok(())
    }

    /// Removes the entity `descriptor` points at, with its subtree.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn remove_descriptor(&self, descriptor: &Descriptor) -> CauldronResult<()> {
        match descriptor {
            Descriptor::App(d) => self.remove_native_application(d),
            Descriptor::Platform(d) => self.remove_platform(d),
            Descriptor::Version(d) => self.remove_version(d),
        }
    }

    /// Validates and inserts a native application.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Validation`] for a malformed candidate or
    /// [`CauldronError::AlreadyExists`] if the name is taken.
    pub fn create_native_application<T: Serialize>(&self, candidate: &T) -> CauldronResult<()> {
        let app: NativeApp = self.validated(candidate, SchemaId::NativeApplication)?;
        let message = format!("Create {} native application", app.name);
        self.mutate(message, |doc| {
            if doc.native_apps.iter().any(|a| a.name == app.name) {
                return Err(CauldronError::already_exists(app.name.clone()));
            }
            doc.insert_app(app);
            doc.check_invariants()
        })
    }

    /// Removes a native application.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn remove_native_application(&self, descriptor: &AppNameDescriptor) -> CauldronResult<()> {
        self.mutate(format!("Remove {descriptor}"), |doc| {
            let before = doc.native_apps.len();
            doc.native_apps.retain(|a| a.name != descriptor.name());
            if doc.native_apps.len() == before {
                return Err(CauldronError::not_found(descriptor.to_string()));
            }
            Ok(())
        })
    }

    /// Validates and inserts a platform into a native application.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the application does not
    /// exist, [`CauldronError::Validation`] for a malformed candidate or
    /// [`CauldronError::AlreadyExists`] if the platform exists.
    pub fn create_platform<T: Serialize>(&self, descriptor: &AppNameDescriptor, candidate: &T) -> CauldronResult<()> {
        let platform: Platform = self.validated(candidate, SchemaId::NativeApplicationPlatform)?;
        let message = format!("Create {} platform for {descriptor}", platform.name);
        self.mutate(message, |doc| {
            let app = doc
                .app_mut(descriptor)
                .ok_or_else(|| CauldronError::not_found(descriptor.to_string()))?;
            if app.platform(platform.name).is_some() {
                return Err(CauldronError::already_exists(format!(
                    "{} platform of {descriptor}",
                    platform.name
                )));
            }
            app.insert_platform(platform);
            doc.check_invariants()
        })
    }

    /// Removes a platform.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn remove_platform(&self, descriptor: &AppPlatformDescriptor) -> CauldronResult<()> {
        self.mutate(format!("Remove {descriptor}"), |doc| {
            let app = doc
                .app_mut(&descriptor.to_name())
                .ok_or_else(|| CauldronError::not_found(descriptor.to_name().to_string()))?;
            let before = app.platforms.len();
            app.platforms.retain(|p| p.name != descriptor.platform());
            if app.platforms.len() == before {
                return Err(CauldronError::not_found(descriptor.to_string()));
            }
            Ok(())
        })
    }

    /// Validates and inserts a version into a platform.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the platform does not exist,
    /// [`CauldronError::Validation`] for a malformed candidate or
    /// [`CauldronError::AlreadyExists`] if the version exists.
    pub fn create_version<T: Serialize>(&self, descriptor: &AppPlatformDescriptor, candidate: &T) -> CauldronResult<()> {
        let version: Version = self.validated(candidate, SchemaId::NativeApplicationVersion)?;
        let message = format!("Create version {} for {descriptor}", version.name);
        self.mutate(message, |doc| {
            let platform = doc
                .platform_mut(descriptor)
                .ok_or_else(|| CauldronError::not_found(descriptor.to_string()))?;
            if platform.version(&version.name).is_some() {
                return Err(CauldronError::already_exists(format!(
                    "{} version of {descriptor}",
                    version.name
                )));
            }
            platform.insert_version(version);
            doc.check_invariants()
        })
    }

    /// Removes a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if it does not exist.
    pub fn remove_version(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<()> {
        self.mutate(format!("Remove {descriptor}"), |doc| {
            let platform_descriptor = descriptor.to_platform();
            let platform = doc
                .platform_mut(&platform_descriptor)
                .ok_or_else(|| CauldronError::not_found(platform_descriptor.to_string()))?;
            let before = platform.versions.len();
            platform.versions.retain(|v| v.name != descriptor.version());
            if platform.versions.len() == before {
                return Err(CauldronError::not_found(descriptor.to_string()));
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Version fields
    // ------------------------------------------------------------------

    /// Applies a validated patch to a version.
    ///
    /// Only the release status is committed, matching what tooling expects
    /// from this operation; use
    /// [`add_or_update_description`](Self::add_or_update_description) for
    /// the description.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Validation`] for a malformed patch or
    /// [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_version<T: Serialize>(&self, descriptor: &AppVersionDescriptor, patch: &T) -> CauldronResult<()> {
        let patch: VersionPatch = self.validated(patch, SchemaId::NativeApplicationVersionPatch)?;
        let Some(is_released) = patch.is_released else {
            return Ok(());
        };
        self.update_version_release_status(descriptor, is_released)
    }

    /// Sets the release status of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_version_release_status(&self, descriptor: &AppVersionDescriptor, is_released: bool) -> CauldronResult<()> {
        self.mutate_version(
            descriptor,
            format!("Update release status of {descriptor}"),
            |version| {
                version.is_released = is_released;
                Ok(())
            },
        )
    }

    /// Sets the description of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn add_or_update_description(&self, descriptor: &AppVersionDescriptor, description: &str) -> CauldronResult<()> {
        self.mutate_version(
            descriptor,
            format!("Update description of {descriptor}"),
            |version| {
                version.description = Some(description.to_string());
                Ok(())
            },
        )
    }
}

impl std::fmt::Debug for CauldronStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CauldronStore")
            .field("document", &self.document)
            .field("files", &self.files)
            .field("yarn_locks", &self.yarn_locks)
            .field("bundles", &self.bundles)
            .finish_non_exhaustive()
    }
}
