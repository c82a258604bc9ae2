//! Descriptor-oriented release rules.
//!
//! [`ReleaseManager`] layers the business rules of a release workflow on
//! top of [`CauldronStore`]:
//!
//! - released versions are immutable: container and yarn lock mutations
//!   fail with [`CauldronError::ReleasedVersion`]
//! - configuration bubbles up from a version to its platform, its native
//!   application and the top level
//! - MiniApps and JS API implementations can follow a git branch, pinned
//!   to the commit the branch pointed at when last resolved
//! - code push history is bounded by `codePush.entriesLimit`
//! - the platform-level container version follows the highest container
//!   version generated for any of its versions

mod code_push;
mod container;
mod delta;

pub use delta::PackageDelta;

use crate::cauldron::{CauldronStore, ConfigLevel};
use crate::descriptor::{AppPlatformDescriptor, AppVersionDescriptor, Descriptor, NativePlatform};
use crate::error::{CauldronError, CauldronResult};
use crate::model::Version;
use crate::version::{coerce, normalize_to_semver, parse_semver, VersionRange};
use crate::working_copy::CommitMessage;
use cauldron_vcs::RefResolver;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Copy source meaning "the most recent version of the platform".
pub const LATEST_VERSION: &str = "latest";

/// Options of [`ReleaseManager::add_native_application_version`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddVersionOptions {
    /// Configuration of the new version. When set, the configuration of
    /// the copied version is not carried over.
    pub config: Option<Value>,
    /// Version of the same platform to copy from, or [`LATEST_VERSION`].
    pub copy_from: Option<String>,
    /// Description of the new version. Ignored when copying, the source
    /// description wins.
    pub description: Option<String>,
}

impl AddVersionOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration of the new version.
    #[must_use]
    pub fn config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Copies from another version of the same platform.
    #[must_use]
    pub fn copy_from(mut self, version: impl Into<String>) -> Self {
        self.copy_from = Some(version.into());
        self
    }

    /// Sets the description of the new version.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Filters versions by release status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReleaseFilter {
    /// Every version.
    #[default]
    All,
    /// Released versions only.
    Released,
    /// Versions still in development only.
    NonReleased,
}

impl ReleaseFilter {
    const fn accepts(self, version: &Version) -> bool {
        match self {
            Self::All => true,
            Self::Released => version.is_released,
            Self::NonReleased => !version.is_released,
        }
    }
}

/// The `codePush` configuration key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePushConfig {
    /// Maximum number of entries kept per deployment. `0` or absent means
    /// unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries_limit: Option<usize>,
}

/// Business rules over a [`CauldronStore`].
///
/// The manager shares the store with its caller; transactions opened on
/// either side cover operations made through both.
///
/// # Example
///
/// ```rust
/// use cauldron_core::{AddVersionOptions, AppVersionDescriptor, CauldronConfig, CauldronStore, ReleaseManager};
/// use cauldron_vcs::{InMemoryGit, StaticRefResolver};
/// use std::sync::Arc;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = Arc::new(CauldronStore::open(
///     Arc::new(InMemoryGit::new(dir.path())),
///     &CauldronConfig::new(dir.path()),
/// ));
/// let manager = ReleaseManager::new(store, Arc::new(StaticRefResolver::new()));
///
/// let v1: AppVersionDescriptor = "myapp:android:1.0.0".parse().unwrap();
/// manager.add_native_application_version(&v1, AddVersionOptions::new()).unwrap();
/// manager.add_native_dependency(&v1, &"react-native@0.72.0".into()).unwrap();
///
/// let v2: AppVersionDescriptor = "myapp:android:1.1.0".parse().unwrap();
/// manager
///     .add_native_application_version(&v2, AddVersionOptions::new().copy_from("latest"))
///     .unwrap();
/// assert_eq!(manager.store().get_version(&v2).unwrap().container.native_deps.len(), 1);
/// ```
pub struct ReleaseManager {
    store: Arc<CauldronStore>,
    resolver: Arc<dyn RefResolver>,
}

impl ReleaseManager {
    /// Creates a manager over `store`, resolving git branches with
    /// `resolver`.
    #[must_use]
    pub fn new(store: Arc<CauldronStore>, resolver: Arc<dyn RefResolver>) -> Self {
        Self { store, resolver }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<CauldronStore> {
        &self.store
    }

    /// Returns the git reference resolver.
    #[must_use]
    pub fn resolver(&self) -> &dyn RefResolver {
        self.resolver.as_ref()
    }

    /// Opens a transaction on the store.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if one is pending.
    pub fn begin_transaction(&self) -> CauldronResult<()> {
        self.store.begin_transaction()
    }

    /// Discards the pending transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if none is pending.
    pub fn discard_transaction(&self) -> CauldronResult<()> {
        self.store.discard_transaction()
    }

    /// Commits the pending transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::TransactionState`] if none is pending.
    pub fn commit_transaction(&self, message: impl Into<CommitMessage>) -> CauldronResult<()> {
        self.store.commit_transaction(message)
    }

    // ------------------------------------------------------------------
    // Released-version guard
    // ------------------------------------------------------------------

    /// Fails if `descriptor` is a released version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] carrying `message` if the
    /// version is released, or [`CauldronError::NotFound`] if it does not
    /// exist.
    pub fn ensure_not_released(&self, descriptor: &AppVersionDescriptor, message: &str) -> CauldronResult<()> {
        if self.store.get_version(descriptor)?.is_released {
            return Err(CauldronError::released_version(descriptor, message));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Version lifecycle
    // ------------------------------------------------------------------

    /// Adds a version, creating its native application and platform when
    /// missing.
    ///
    /// When copying, the container, yarn locks, container versions and
    /// description of the source are carried over, and so is its own
    /// configuration unless `options.config` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::AlreadyExists`] if the version exists, or
    /// [`CauldronError::NotFound`] if the copy source does not.
    pub fn add_native_application_version(
        &self,
        descriptor: &AppVersionDescriptor,
        options: AddVersionOptions,
    ) -> CauldronResult<()> {
        if self.store.has_version(descriptor)? {
            return Err(CauldronError::already_exists(descriptor.to_string()));
        }
        let source = match options.copy_from.as_deref() {
            Some(LATEST_VERSION) => {
                let latest = self
                    .get_most_recent_native_application_version(&descriptor.to_platform())?
                    .ok_or_else(|| {
                        CauldronError::not_found(format!("latest version of {}", descriptor.to_platform()))
                    })?;
                Some(descriptor.to_platform().with_version(latest.name))
            }
            Some(name) => Some(descriptor.to_platform().with_version(name)),
            None => None,
        };
        if let Some(source) = &source {
            if !self.store.has_version(source)? {
                return Err(CauldronError::not_found(source.to_string()));
            }
        }

        self.store.add_descriptor(&Descriptor::from(descriptor))?;
        match &source {
            Some(source) => {
                self.copy_native_application_version(source, descriptor, options.config.is_none())?;
            }
            None => {
                if let Some(description) = &options.description {
                    self.store.add_or_update_description(descriptor, description)?;
                }
            }
        }
        if let Some(config) = &options.config {
            self.store
                .set_config(Some(&Descriptor::from(descriptor)), config)?;
        }
        info!(version = %descriptor, copied_from = ?source, "Added native application version");
        Ok(())
    }

    /// Copies the container, yarn locks, container versions and description
    /// of `source` into the existing version `target`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if either version does not
    /// exist.
    pub fn copy_native_application_version(
        &self,
        source: &AppVersionDescriptor,
        target: &AppVersionDescriptor,
        copy_config: bool,
    ) -> CauldronResult<()> {
        let from = self.store.get_version(source)?;
        self.store.get_version(target)?;

        self.store
            .update_cauldron(format!("Copy {source} into {target}"), |doc| {
                let version = doc
                    .version_mut(target)
                    .ok_or_else(|| CauldronError::not_found(target.to_string()))?;
                version.container = from.container.clone();
                if from.container_version.is_some() {
                    version.container_version.clone_from(&from.container_version);
                }
                if from.description.is_some() {
                    version.description.clone_from(&from.description);
                }
                Ok(())
            })?;
        for key in from.yarn_locks.keys() {
            self.store.copy_yarn_lock(source, target, key)?;
        }
        if copy_config {
            if let Some(config) = self.store.get_config_strict(Some(&Descriptor::from(source)))? {
                self.store
                    .set_config(Some(&Descriptor::from(target)), &config)?;
            }
        }
        Ok(())
    }

    /// Sets the release status of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_native_app_is_released(&self, descriptor: &AppVersionDescriptor, is_released: bool) -> CauldronResult<()> {
        self.store
            .update_version_release_status(descriptor, is_released)
    }

    // ------------------------------------------------------------------
    // Descriptor queries
    // ------------------------------------------------------------------

    /// Returns the version of a platform with the highest coerced semver,
    /// or `None` if the platform has no version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the platform does not exist.
    pub fn get_most_recent_native_application_version(
        &self,
        descriptor: &AppPlatformDescriptor,
    ) -> CauldronResult<Option<Version>> {
        let versions = self.store.get_versions(descriptor)?;
        Ok(versions
            .into_iter()
            .filter_map(|v| coerce(&v.name).map(|semver| (semver, v)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v))
    }

    /// Returns every version descriptor, optionally restricted to one
    /// platform and filtered by release status.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn get_nap_descriptor_strings(
        &self,
        platform: Option<NativePlatform>,
        filter: ReleaseFilter,
    ) -> CauldronResult<Vec<String>> {
        let mut result = Vec::new();
        for app in self.store.get_native_applications()? {
            for p in &app.platforms {
                if platform.is_some_and(|wanted| wanted != p.name) {
                    continue;
                }
                result.extend(
                    p.versions
                        .iter()
                        .filter(|v| filter.accepts(v))
                        .map(|v| AppVersionDescriptor::new(&app.name, p.name, &v.name).to_string()),
                );
            }
        }
        Ok(result)
    }

    /// Returns the names of the native applications that have `platform`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read.
    pub fn get_native_apps_for_platform(&self, platform: NativePlatform) -> CauldronResult<Vec<String>> {
        Ok(self
            .store
            .get_native_applications()?
            .into_iter()
            .filter(|app| app.platform(platform).is_some())
            .map(|app| app.name)
            .collect())
    }

    /// Resolves a descriptor whose version is a semver range, such as
    /// `myapp:android:^1.0.0`, into the versions it matches.
    ///
    /// Version names are normalized before matching (`1.2` is compared as
    /// `1.2.0`) and returned unnormalized. Names that cannot be normalized
    /// never match.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidDescriptor`] if the descriptor lacks
    /// a platform or a version, [`CauldronError::InvalidVersion`] for a
    /// malformed range, or [`CauldronError::NotFound`] if the platform does
    /// not exist.
    pub fn get_descriptors_matching_semver_descriptor(
        &self,
        descriptor: &Descriptor,
    ) -> CauldronResult<Vec<AppVersionDescriptor>> {
        let (Some(platform), Some(range)) = (descriptor.to_platform(), descriptor.version()) else {
            return Err(CauldronError::invalid_descriptor(
                descriptor.to_string(),
                "platform and version range are required",
            ));
        };
        let range = VersionRange::parse(range)?;
        let mut matching = Vec::new();
        for version in self.store.get_versions(&platform)? {
            let Ok(normalized) = normalize_to_semver(&version.name) else {
                continue;
            };
            if parse_semver(&normalized).is_some_and(|v| range.matches(&v)) {
                matching.push(platform.with_version(version.name));
            }
        }
        Ok(matching)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Returns the most specific non-empty configuration object from
    /// `descriptor` up to the top level.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn get_config(&self, descriptor: Option<&Descriptor>) -> CauldronResult<Option<Value>> {
        self.store.get_config(descriptor)
    }

    /// Returns the configuration stored at the level of `descriptor` only.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn get_config_strict(&self, descriptor: Option<&Descriptor>) -> CauldronResult<Option<Value>> {
        self.store.get_config_strict(descriptor)
    }

    /// Returns the most specific value of `key` from `descriptor` up to
    /// the top level.
    ///
    /// A level that has a config object without `key`, or with `key` set
    /// to `null`, is skipped. `false` and `0` are values.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn get_config_for_key(&self, key: &str, descriptor: Option<&Descriptor>) -> CauldronResult<Option<Value>> {
        if let Some(d) = descriptor {
            if !self.store.has_descriptor(d)? {
                return Err(CauldronError::not_found(d.to_string()));
            }
        }
        Ok(self
            .store
            .get_config_by_level(descriptor)?
            .into_values()
            .rev()
            .find_map(|config| config.get(key).filter(|v| !v.is_null()).cloned()))
    }

    /// Returns the value of `key` at the level of `descriptor` only.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn get_config_for_key_strict(&self, key: &str, descriptor: Option<&Descriptor>) -> CauldronResult<Option<Value>> {
        Ok(self
            .store
            .get_config_strict(descriptor)?
            .and_then(|config| config.get(key).filter(|v| !v.is_null()).cloned()))
    }

    /// Returns the value of `key`, as [`get_config_for_key`], deserialized
    /// into `T`.
    ///
    /// [`get_config_for_key`]: Self::get_config_for_key
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Json`] if the value does not fit `T`.
    pub fn get_config_for_key_as<T: DeserializeOwned>(&self, key: &str, descriptor: Option<&Descriptor>) -> CauldronResult<Option<T>> {
        match self.get_config_for_key(key, descriptor)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Returns the level whose configuration `descriptor` addresses.
    #[must_use]
    pub fn get_config_level_matching_descriptor(&self, descriptor: Option<&Descriptor>) -> ConfigLevel {
        ConfigLevel::matching(descriptor)
    }

    /// Returns the `codePush` configuration of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Json`] if the stored value is malformed.
    pub fn get_code_push_config(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<CodePushConfig> {
        Ok(self
            .get_config_for_key_as("codePush", Some(&Descriptor::from(descriptor)))?
            .unwrap_or_default())
    }

    /// Replaces the configuration of `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn set_config(&self, descriptor: Option<&Descriptor>, config: &Value) -> CauldronResult<()> {
        self.store.set_config(descriptor, config)
    }

    /// Merges `config` into the configuration of `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn update_config(&self, descriptor: Option<&Descriptor>, config: &Value) -> CauldronResult<()> {
        self.store.update_config(descriptor, config)
    }

    /// Deletes the configuration of `descriptor`. Returns false if there
    /// was none.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn del_config(&self, descriptor: Option<&Descriptor>) -> CauldronResult<bool> {
        self.store.del_config(descriptor)
    }

    // ------------------------------------------------------------------
    // Container versions
    // ------------------------------------------------------------------

    /// Sets the container version of a version, and raises the
    /// platform-level container version to it.
    ///
    /// The platform-level value only moves up, only between valid semver
    /// versions, and not at all when `detachContainerVersionFromRoot` is
    /// set in the configuration of the version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_container_version(&self, descriptor: &AppVersionDescriptor, version: &str) -> CauldronResult<()> {
        self.store.update_container_version(descriptor, version)?;
        let detached = self
            .get_config_for_key("detachContainerVersionFromRoot", Some(&Descriptor::from(descriptor)))?
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if detached {
            debug!(version = %descriptor, "Container version detached from platform");
            return Ok(());
        }
        let platform = descriptor.to_platform();
        let Some(top) = self.store.get_top_level_container_version(&platform)? else {
            return Ok(());
        };
        match (parse_semver(version), parse_semver(&top)) {
            (Some(new), Some(current)) if new > current => {
                self.store
                    .update_top_level_container_version(&platform, version)
            }
            _ => Ok(()),
        }
    }

    /// Returns the container version of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_version(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Option<String>> {
        self.store.get_container_version(descriptor)
    }

    /// Returns the platform-level container version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the platform does not exist.
    pub fn get_top_level_container_version(&self, descriptor: &AppPlatformDescriptor) -> CauldronResult<Option<String>> {
        self.store.get_top_level_container_version(descriptor)
    }

    /// Sets the tooling version used to generate the container of a
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_container_ern_version(&self, descriptor: &AppVersionDescriptor, ern_version: &str) -> CauldronResult<()> {
        self.store
            .update_container_ern_version(descriptor, ern_version)
    }

    // ------------------------------------------------------------------
    // Yarn locks
    // ------------------------------------------------------------------

    /// Stores or replaces the yarn lock `key` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version.
    pub fn add_or_update_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str, lock: &[u8]) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot update a yarn.lock of a released native application version")?;
        if self.store.has_yarn_lock(descriptor, key)? {
            self.store.update_yarn_lock(descriptor, key, lock)?;
        } else {
            self.store.add_yarn_lock(descriptor, key, lock)?;
        }
        Ok(())
    }

    /// Stores a yarn lock and maps `key` to it. Returns the lock id.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version.
    pub fn add_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str, lock: &[u8]) -> CauldronResult<String> {
        self.ensure_not_released(descriptor, "Cannot add a yarn.lock to a released native application version")?;
        self.store.add_yarn_lock(descriptor, key, lock)
    }

    /// Replaces the content of the yarn lock `key` maps to. Returns false
    /// if `key` maps to nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version.
    pub fn update_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str, lock: &[u8]) -> CauldronResult<bool> {
        self.ensure_not_released(descriptor, "Cannot update a yarn.lock of a released native application version")?;
        self.store.update_yarn_lock(descriptor, key, lock)
    }

    /// Maps `key` to another existing lock id.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version.
    pub fn update_yarn_lock_id(&self, descriptor: &AppVersionDescriptor, key: &str, id: &str) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot update a yarn.lock of a released native application version")?;
        self.store.update_yarn_lock_id(descriptor, key, id)
    }

    /// Maps `key` to an existing lock id.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version.
    pub fn set_yarn_lock_id(&self, descriptor: &AppVersionDescriptor, key: &str, id: &str) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot add a yarn.lock to a released native application version")?;
        self.store.set_yarn_lock_id(descriptor, key, id)
    }

    /// Replaces the whole key to lock id map of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version.
    pub fn set_yarn_locks(
        &self,
        descriptor: &AppVersionDescriptor,
        locks: std::collections::HashMap<String, String>,
    ) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot update yarn.locks of a released native application version")?;
        self.store.set_yarn_locks(descriptor, locks)
    }

    /// Removes the yarn lock `key` maps to. Returns false if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version.
    pub fn remove_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str) -> CauldronResult<bool> {
        self.ensure_not_released(descriptor, "Cannot remove a yarn.lock from a released native application version")?;
        self.store.remove_yarn_lock(descriptor, key)
    }

    /// Returns the content of the yarn lock `key` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str) -> CauldronResult<Option<Vec<u8>>> {
        self.store.get_yarn_lock(descriptor, key)
    }

    /// Returns the absolute path of the yarn lock `key` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_path_to_yarn_lock(
        &self,
        descriptor: &AppVersionDescriptor,
        key: &str,
    ) -> CauldronResult<Option<std::path::PathBuf>> {
        self.store.get_path_to_yarn_lock(descriptor, key)
    }
}

impl std::fmt::Debug for ReleaseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseManager")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::CauldronConfig;
    use crate::package::PackagePath;
    use cauldron_vcs::{InMemoryGit, StaticRefResolver};
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    pub(crate) const MOVIES: &str = "https://github.com/acme/movies.git";

    pub(crate) struct Fixture {
        pub(crate) _dir: TempDir,
        pub(crate) git: Arc<InMemoryGit>,
        pub(crate) resolver: Arc<StaticRefResolver>,
        pub(crate) manager: ReleaseManager,
    }

    pub(crate) fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let git = Arc::new(InMemoryGit::new(dir.path()));
        let store = Arc::new(CauldronStore::open(git.clone(), &CauldronConfig::new(dir.path())));
        let resolver = Arc::new(StaticRefResolver::new().with_branch(MOVIES, "develop", "abc123"));
        let manager = ReleaseManager::new(store, resolver.clone());
        Fixture {
            _dir: dir,
            git,
            resolver,
            manager,
        }
    }

    pub(crate) fn version(manager: &ReleaseManager, descriptor: &str) -> AppVersionDescriptor {
        let descriptor: AppVersionDescriptor = descriptor.parse().unwrap();
        manager
            .add_native_application_version(&descriptor, AddVersionOptions::new())
            .unwrap();
        descriptor
    }

    #[test]
    fn adding_an_existing_version_fails() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        assert!(matches!(
            f.manager.add_native_application_version(&v, AddVersionOptions::new()),
            Err(CauldronError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn add_version_with_description_and_config() {
        let f = fixture();
        let v: AppVersionDescriptor = "myapp:ios:2.0.0".parse().unwrap();
        f.manager
            .add_native_application_version(
                &v,
                AddVersionOptions::new()
                    .description("Spring release")
                    .config(json!({"codePush": {"entriesLimit": 3}})),
            )
            .unwrap();
        let stored = f.manager.store().get_version(&v).unwrap();
        assert_eq!(stored.description.as_deref(), Some("Spring release"));
        assert_eq!(
            f.manager.get_code_push_config(&v).unwrap().entries_limit,
            Some(3)
        );
    }

    #[test]
    fn copy_from_latest_carries_container_locks_and_config() {
        let f = fixture();
        let old = version(&f.manager, "myapp:android:1.0.0");
        let latest = version(&f.manager, "myapp:android:1.10.0");
        version(&f.manager, "myapp:android:1.9.0");
        f.manager
            .add_native_dependency(&latest, &"react-native@0.72.0".into())
            .unwrap();
        f.manager
            .add_mini_app(&latest, &"movielist@1.0.0".into())
            .unwrap();
        f.manager
            .add_yarn_lock(&latest, "container", b"lock")
            .unwrap();
        f.manager
            .update_container_version(&latest, "1.2.3")
            .unwrap();
        f.manager
            .set_config(Some(&Descriptor::from(&latest)), &json!({"bundleStore": "prod"}))
            .unwrap();
        f.manager
            .set_config(Some(&Descriptor::from(&old)), &json!({"bundleStore": "old"}))
            .unwrap();

        let target: AppVersionDescriptor = "myapp:android:2.0.0".parse().unwrap();
        f.manager
            .add_native_application_version(&target, AddVersionOptions::new().copy_from(LATEST_VERSION))
            .unwrap();

        let copied = f.manager.store().get_version(&target).unwrap();
        assert_eq!(copied.container.native_deps, vec![PackagePath::new("react-native@0.72.0")]);
        assert_eq!(copied.container_version.as_deref(), Some("1.2.3"));
        assert_eq!(
            f.manager.get_yarn_lock(&target, "container").unwrap().as_deref(),
            Some(&b"lock"[..])
        );
        assert_ne!(
            f.manager.store().get_yarn_lock_id(&target, "container").unwrap(),
            f.manager.store().get_yarn_lock_id(&latest, "container").unwrap()
        );
        assert_eq!(
            f.manager
                .get_config_strict(Some(&Descriptor::from(&target)))
                .unwrap(),
            Some(json!({"bundleStore": "prod"}))
        );
    }

    #[test]
    fn explicit_config_replaces_copied_config() {
        let f = fixture();
        let source = version(&f.manager, "myapp:android:1.0.0");
        f.manager
            .set_config(Some(&Descriptor::from(&source)), &json!({"a": 1}))
            .unwrap();
        let target: AppVersionDescriptor = "myapp:android:1.1.0".parse().unwrap();
        f.manager
            .add_native_application_version(
                &target,
                AddVersionOptions::new().copy_from("1.0.0").config(json!({"b": 2})),
            )
            .unwrap();
        assert_eq!(
            f.manager
                .get_config_strict(Some(&Descriptor::from(&target)))
                .unwrap(),
            Some(json!({"b": 2}))
        );
    }

    #[test]
    fn copy_from_missing_version_fails_without_creating_target() {
        let f = fixture();
        version(&f.manager, "myapp:android:1.0.0");
        let target: AppVersionDescriptor = "myapp:android:1.1.0".parse().unwrap();
        let err = f
            .manager
            .add_native_application_version(&target, AddVersionOptions::new().copy_from("0.9.0"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!f.manager.store().has_version(&target).unwrap());
    }

    #[test]
    fn most_recent_version_coerces_names() {
        let f = fixture();
        version(&f.manager, "myapp:android:1.2");
        version(&f.manager, "myapp:android:1.10.0-beta");
        version(&f.manager, "myapp:android:1.9.0");
        let latest = f
            .manager
            .get_most_recent_native_application_version(&"myapp:android".parse().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(latest.name, "1.10.0-beta");
    }

    #[test]
    fn descriptor_strings_filter_by_platform_and_release() {
        let f = fixture();
        let released = version(&f.manager, "myapp:android:1.0.0");
        version(&f.manager, "myapp:android:1.1.0");
        version(&f.manager, "myapp:ios:1.0.0");
        version(&f.manager, "other:ios:3.0.0");
        f.manager
            .update_native_app_is_released(&released, true)
            .unwrap();

        assert_eq!(
            f.manager
                .get_nap_descriptor_strings(Some(NativePlatform::Android), ReleaseFilter::All)
                .unwrap(),
            vec!["myapp:android:1.0.0", "myapp:android:1.1.0"]
        );
        assert_eq!(
            f.manager
                .get_nap_descriptor_strings(None, ReleaseFilter::Released)
                .unwrap(),
            vec!["myapp:android:1.0.0"]
        );
        assert_eq!(
            f.manager
                .get_nap_descriptor_strings(None, ReleaseFilter::NonReleased)
                .unwrap()
                .len(),
            3
        );
        assert_eq!(
            f.manager
                .get_native_apps_for_platform(NativePlatform::Ios)
                .unwrap(),
            vec!["myapp", "other"]
        );
    }

    #[test]
    fn semver_descriptor_matches_normalized_names() {
        let f = fixture();
        for v in ["1.0", "1.5.0", "2.0.0", "nightly"] {
            version(&f.manager, &format!("myapp:android:{v}"));
        }
        let matching = f
            .manager
            .get_descriptors_matching_semver_descriptor(&"myapp:android:^1.0.0".parse().unwrap())
            .unwrap();
        let names: Vec<&str> = matching.iter().map(AppVersionDescriptor::version).collect();
        // Valid semver names sort first.
        assert_eq!(names, vec!["1.5.0", "1.0"]);

        assert!(matches!(
            f.manager
                .get_descriptors_matching_semver_descriptor(&"myapp".parse().unwrap()),
            Err(CauldronError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn config_bubbles_up_and_keys_fall_through() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        let app = Descriptor::from(v.to_name());
        let vd = Descriptor::from(&v);
        f.manager
            .set_config(Some(&app), &json!({"detachContainerVersionFromRoot": true, "x": 1}))
            .unwrap();
        f.manager
            .set_config(Some(&vd), &json!({"x": 2, "flag": false, "nothing": null}))
            .unwrap();

        assert_eq!(f.manager.get_config(Some(&vd)).unwrap(), Some(json!({"x": 2, "flag": false, "nothing": null})));
        assert_eq!(f.manager.get_config_for_key("x", Some(&vd)).unwrap(), Some(json!(2)));
        assert_eq!(f.manager.get_config_for_key("flag", Some(&vd)).unwrap(), Some(json!(false)));
        assert_eq!(
            f.manager
                .get_config_for_key("detachContainerVersionFromRoot", Some(&vd))
                .unwrap(),
            Some(json!(true))
        );
        assert_eq!(f.manager.get_config_for_key("nothing", Some(&vd)).unwrap(), None);
        assert_eq!(
            f.manager
                .get_config_for_key_strict("detachContainerVersionFromRoot", Some(&vd))
                .unwrap(),
            None
        );
        assert_eq!(
            f.manager.get_config_level_matching_descriptor(Some(&vd)),
            ConfigLevel::NativeAppVersion
        );
        assert_eq!(f.manager.get_config_level_matching_descriptor(None), ConfigLevel::Top);
        assert!(f.manager.del_config(Some(&vd)).unwrap());
        assert_eq!(f.manager.get_config_for_key("x", Some(&vd)).unwrap(), Some(json!(1)));
    }

    #[test]
    fn container_version_raises_platform_version_only_upwards() {
        let f = fixture();
        let v1 = version(&f.manager, "myapp:android:1.0.0");
        let v2 = version(&f.manager, "myapp:android:2.0.0");
        let platform = v1.to_platform();
        f.manager
            .store()
            .update_top_level_container_version(&platform, "1.0.0")
            .unwrap();

        f.manager.update_container_version(&v1, "1.2.0").unwrap();
        assert_eq!(f.manager.get_top_level_container_version(&platform).unwrap().as_deref(), Some("1.2.0"));

        f.manager.update_container_version(&v2, "1.1.0").unwrap();
        assert_eq!(f.manager.get_container_version(&v2).unwrap().as_deref(), Some("1.1.0"));
        assert_eq!(f.manager.get_top_level_container_version(&platform).unwrap().as_deref(), Some("1.2.0"));

        f.manager.update_container_version(&v2, "not-semver").unwrap();
        assert_eq!(f.manager.get_top_level_container_version(&platform).unwrap().as_deref(), Some("1.2.0"));
    }

    #[test]
    fn detached_container_version_leaves_platform_alone() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        let platform = v.to_platform();
        f.manager
            .store()
            .update_top_level_container_version(&platform, "1.0.0")
            .unwrap();
        f.manager
            .set_config(Some(&Descriptor::from(&platform)), &json!({"detachContainerVersionFromRoot": true}))
            .unwrap();
        f.manager.update_container_version(&v, "5.0.0").unwrap();
        assert_eq!(f.manager.get_top_level_container_version(&platform).unwrap().as_deref(), Some("1.0.0"));
    }

    #[test]
    fn released_version_rejects_yarn_lock_changes() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        f.manager.add_yarn_lock(&v, "container", b"one").unwrap();
        f.manager.update_native_app_is_released(&v, true).unwrap();
        let commits = f.git.commit_log().len();

        let err = f
            .manager
            .add_or_update_yarn_lock(&v, "container", b"two")
            .unwrap_err();
        assert!(matches!(err, CauldronError::ReleasedVersion { .. }));
        assert!(err.to_string().starts_with("myapp:android:1.0.0 is a released native application version."));
        assert!(f.manager.remove_yarn_lock(&v, "container").is_err());
        assert!(f.manager.set_yarn_locks(&v, Default::default()).is_err());
        assert_eq!(f.manager.get_yarn_lock(&v, "container").unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(f.git.commit_log().len(), commits);
    }

    #[test]
    fn add_or_update_yarn_lock_upserts() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        f.manager.add_or_update_yarn_lock(&v, "container", b"one").unwrap();
        f.manager.add_or_update_yarn_lock(&v, "container", b"two").unwrap();
        assert_eq!(f.manager.get_yarn_lock(&v, "container").unwrap().as_deref(), Some(&b"two"[..]));
        assert!(f.manager.get_path_to_yarn_lock(&v, "container").unwrap().is_some());
        assert!(f.manager.remove_yarn_lock(&v, "container").unwrap());
        assert!(!f.manager.remove_yarn_lock(&v, "container").unwrap());
    }
}
