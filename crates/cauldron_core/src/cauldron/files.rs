//! Configuration files, arbitrary files, yarn locks and bundles.
//!
//! All of these live outside the document. Configuration and arbitrary
//! files share the unprefixed blob store; yarn locks and bundles get their
//! own prefix directories, which other tooling reads directly.

use super::CauldronStore;
use crate::descriptor::{AppVersionDescriptor, Descriptor};
use crate::error::{CauldronError, CauldronResult};
use crate::store::check_relative_path;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::warn;

/// Directory holding yarn lock blobs.
pub const YARN_LOCKS_DIRECTORY: &str = "yarnlocks";

/// Directory holding zipped JS bundles.
pub const BUNDLES_DIRECTORY: &str = "bundles";

/// Yarn lock key of the lock used to generate the container.
pub const YARN_LOCK_CONTAINER_KEY: &str = "container";

const FILE_URL_PREFIX: &str = "cauldron://";

/// Strips the `cauldron://` scheme from a file path.
#[must_use]
pub fn normalize_file_path(path: &str) -> &str {
    path.strip_prefix(FILE_URL_PREFIX).unwrap_or(path)
}

/// A level of the configuration hierarchy, least specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLevel {
    /// Applies to the whole Cauldron.
    Top,
    /// Applies to one native application.
    NativeApp,
    /// Applies to one platform of a native application.
    NativeAppPlatform,
    /// Applies to one version.
    NativeAppVersion,
}

impl ConfigLevel {
    /// Returns the level a descriptor addresses, `Top` for none.
    #[must_use]
    pub fn matching(descriptor: Option<&Descriptor>) -> Self {
        match descriptor {
            None => Self::Top,
            Some(Descriptor::App(_)) => Self::NativeApp,
            Some(Descriptor::Platform(_)) => Self::NativeAppPlatform,
            Some(Descriptor::Version(_)) => Self::NativeAppVersion,
        }
    }
}

/// Returns the config file of a descriptor, relative to the working copy.
///
/// `config/default.json` holds the top-level configuration, the other
/// levels use `config/{app}[-{platform}[-{version}]].json`.
#[must_use]
pub fn config_file_path(descriptor: Option<&Descriptor>) -> String {
    let Some(descriptor) = descriptor else {
        return "config/default.json".to_string();
    };
    let mut name = descriptor.name().to_string();
    if let Some(platform) = descriptor.platform() {
        name.push('-');
        name.push_str(platform.as_str());
    }
    if let Some(version) = descriptor.version() {
        name.push('-');
        name.push_str(version);
    }
    format!("config/{name}.json")
}

fn describe(descriptor: Option<&Descriptor>) -> String {
    descriptor.map_or_else(|| "top level".to_string(), ToString::to_string)
}

fn is_empty_config(value: &Value) -> bool {
    value.is_null() || value.as_object().is_some_and(Map::is_empty)
}

impl CauldronStore {
    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    fn ensure_descriptor(&self, descriptor: Option<&Descriptor>) -> CauldronResult<()> {
        match descriptor {
            Some(d) if !self.has_descriptor(d)? => Err(CauldronError::not_found(d.to_string())),
            _ => Ok(()),
        }
    }

    fn read_config_file(&self, path: &str) -> CauldronResult<Option<Value>> {
        match self.files.get_file(path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Returns the config file of a descriptor, relative to the working copy.
    #[must_use]
    pub fn config_file_path(&self, descriptor: Option<&Descriptor>) -> String {
        config_file_path(descriptor)
    }

    /// Returns the configuration stored at each level from `descriptor` up
    /// to the top. Levels without a config file are absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file cannot be read or parsed.
    pub fn get_config_by_level(&self, descriptor: Option<&Descriptor>) -> CauldronResult<BTreeMap<ConfigLevel, Value>> {
        let mut levels = Vec::with_capacity(4);
        if let Some(descriptor) = descriptor {
            if let Descriptor::Version(version) = descriptor {
                levels.push((ConfigLevel::NativeAppVersion, Descriptor::from(version)));
            }
            if let Some(platform) = descriptor.to_platform() {
                levels.push((ConfigLevel::NativeAppPlatform, Descriptor::from(platform)));
            }
            levels.push((ConfigLevel::NativeApp, Descriptor::from(descriptor.to_name())));
        }

        let mut result = BTreeMap::new();
        for (level, descriptor) in levels {
            if let Some(config) = self.read_config_file(&config_file_path(Some(&descriptor)))? {
                result.insert(level, config);
            }
        }
        if let Some(config) = self.read_config_file(&config_file_path(None))? {
            result.insert(ConfigLevel::Top, config);
        }
        Ok(result)
    }

    /// Returns the most specific non-empty configuration from `descriptor`
    /// up to the top.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn get_config(&self, descriptor: Option<&Descriptor>) -> CauldronResult<Option<Value>> {
        self.ensure_descriptor(descriptor)?;
        let levels = self.get_config_by_level(descriptor)?;
        Ok(levels
            .into_values()
            .rev()
            .find(|config| !is_empty_config(config)))
    }

    /// Returns the configuration stored at the level of `descriptor` only.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn get_config_strict(&self, descriptor: Option<&Descriptor>) -> CauldronResult<Option<Value>> {
        self.ensure_descriptor(descriptor)?;
        self.read_config_file(&config_file_path(descriptor))
    }

    /// Replaces the configuration of `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn set_config(&self, descriptor: Option<&Descriptor>, config: &Value) -> CauldronResult<()> {
        self.ensure_descriptor(descriptor)?;
        let path = config_file_path(descriptor);
        self.files
            .stage_file(&path, serde_json::to_string_pretty(config)?.as_bytes(), None)?;
        self.files
            .commit(format!("Set config of {}", describe(descriptor)))
    }

    /// Merges the top-level keys of `config` into the configuration of
    /// `descriptor`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist,
    /// or [`CauldronError::InvalidOperation`] if either side is not a JSON
    /// object.
    pub fn update_config(&self, descriptor: Option<&Descriptor>, config: &Value) -> CauldronResult<()> {
        self.ensure_descriptor(descriptor)?;
        let Value::Object(patch) = config else {
            return Err(CauldronError::invalid_operation("config must be a JSON object"));
        };
        let merged = match self.read_config_file(&config_file_path(descriptor))? {
            Some(Value::Object(mut current)) => {
                current.extend(patch.clone());
                Value::Object(current)
            }
            Some(_) => {
                return Err(CauldronError::invalid_operation(format!(
                    "stored config of {} is not a JSON object",
                    describe(descriptor)
                )))
            }
            None => config.clone(),
        };
        let path = config_file_path(descriptor);
        self.files
            .stage_file(&path, serde_json::to_string_pretty(&merged)?.as_bytes(), None)?;
        self.files
            .commit(format!("Update config of {}", describe(descriptor)))
    }

    /// Deletes the configuration of `descriptor`. Returns false if there was
    /// none.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the descriptor does not exist.
    pub fn del_config(&self, descriptor: Option<&Descriptor>) -> CauldronResult<bool> {
        self.ensure_descriptor(descriptor)?;
        if !self.files.stage_removal(&config_file_path(descriptor))? {
            return Ok(false);
        }
        self.files
            .commit(format!("Delete config of {}", describe(descriptor)))?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Arbitrary files
    // ------------------------------------------------------------------

    fn checked_file_path<'a>(path: &'a str, content: Option<&[u8]>) -> CauldronResult<&'a str> {
        let path = normalize_file_path(path);
        if path.is_empty() {
            return Err(CauldronError::invalid_operation("a file path is required"));
        }
        check_relative_path(path)?;
        if content.is_some_and(<[u8]>::is_empty) {
            return Err(CauldronError::invalid_operation(format!(
                "content of {path} is required"
            )));
        }
        Ok(path)
    }

    /// Adds a file to the Cauldron.
    ///
    /// `path` may carry the `cauldron://` scheme.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::AlreadyExists`] if the file exists, or
    /// [`CauldronError::InvalidOperation`] for an empty path or content, or
    /// a path that leaves the working copy.
    pub fn add_file(&self, path: &str, content: &[u8], mode: Option<u32>) -> CauldronResult<()> {
        let path = Self::checked_file_path(path, Some(content))?;
        if self.files.has_file(path)? {
            return Err(CauldronError::already_exists(format!(
                "{path} (use update_file instead)"
            )));
        }
        self.files.store_file(path, content, mode)
    }

    /// Replaces the content of an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the file does not exist, or
    /// [`CauldronError::InvalidOperation`] for an empty path or content.
    pub fn update_file(&self, path: &str, content: &[u8], mode: Option<u32>) -> CauldronResult<()> {
        let path = Self::checked_file_path(path, Some(content))?;
        if !self.files.has_file(path)? {
            return Err(CauldronError::not_found(format!(
                "{path} (use add_file first)"
            )));
        }
        self.files.stage_file(path, content, mode)?;
        self.files.commit(format!("Update file {path}"))
    }

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the file does not exist.
    pub fn remove_file(&self, path: &str) -> CauldronResult<()> {
        let path = Self::checked_file_path(path, None)?;
        if !self.files.remove_file(path)? {
            return Err(CauldronError::not_found(path));
        }
        Ok(())
    }

    /// Returns true if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing fails, or
    /// [`CauldronError::InvalidOperation`] for a path that leaves the
    /// working copy.
    pub fn has_file(&self, path: &str) -> CauldronResult<bool> {
        self.files.has_file(normalize_file_path(path))
    }

    /// Returns the content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the file does not exist.
    pub fn get_file(&self, path: &str) -> CauldronResult<Vec<u8>> {
        let path = Self::checked_file_path(path, None)?;
        self.files
            .get_file(path)?
            .ok_or_else(|| CauldronError::not_found(path))
    }

    // ------------------------------------------------------------------
    // Yarn locks
    // ------------------------------------------------------------------

    /// Returns true if the version maps `key` to a yarn lock.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn has_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str) -> CauldronResult<bool> {
        Ok(self.get_yarn_lock_id(descriptor, key)?.is_some())
    }

    /// Stores a yarn lock under a new id and maps `key` to it. Returns the
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn add_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str, lock: &[u8]) -> CauldronResult<String> {
        self.get_version(descriptor)?;
        let id = uuid::Uuid::new_v4().to_string();
        self.with_staged_yarn_lock(&id, lock, || {
            self.mutate_version(
                descriptor,
                format!("Add yarn.lock for {descriptor} {key}"),
                |version| {
                    version.yarn_locks.insert(key.to_string(), id.clone());
                    Ok(())
                },
            )
        })?;
        Ok(id)
    }

    /// Stages `lock` as `id`, then runs `record`. The blob is unstaged if
    /// `record` fails.
    fn with_staged_yarn_lock(&self, id: &str, lock: &[u8], record: impl FnOnce() -> CauldronResult<()>) -> CauldronResult<()> {
        self.yarn_locks.stage_file(id, lock, None)?;
        let result = record();
        if result.is_err() {
            if let Err(error) = self.yarn_locks.stage_removal(id) {
                warn!(%id, %error, "failed to unstage yarn lock");
            }
        }
        result
    }

    /// Copies the yarn lock mapped to `key` from one version to another.
    /// Returns the new id, or `None` if the source has no such lock.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if either version does not exist.
    pub fn copy_yarn_lock(
        &self,
        source: &AppVersionDescriptor,
        target: &AppVersionDescriptor,
        key: &str,
    ) -> CauldronResult<Option<String>> {
        match self.get_yarn_lock(source, key)? {
            Some(lock) => self.add_yarn_lock(target, key, &lock).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the id `key` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_yarn_lock_id(&self, descriptor: &AppVersionDescriptor, key: &str) -> CauldronResult<Option<String>> {
        Ok(self.get_version(descriptor)?.yarn_locks.remove(key))
    }

    /// Maps `key` to an existing lock id.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn set_yarn_lock_id(&self, descriptor: &AppVersionDescriptor, key: &str, id: &str) -> CauldronResult<()> {
        self.mutate_version(
            descriptor,
            format!("Add yarn.lock for {descriptor} {key}"),
            |version| {
                version.yarn_locks.insert(key.to_string(), id.to_string());
                Ok(())
            },
        )
    }

    /// Returns the content of the yarn lock `key` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str) -> CauldronResult<Option<Vec<u8>>> {
        match self.get_yarn_lock_id(descriptor, key)? {
            Some(id) => self.yarn_locks.get_file(&id),
            None => Ok(None),
        }
    }

    /// Returns the absolute path of the yarn lock `key` maps to.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_path_to_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str) -> CauldronResult<Option<PathBuf>> {
        match self.get_yarn_lock_id(descriptor, key)? {
            Some(id) => self.yarn_locks.get_path_to_file(&id),
            None => Ok(None),
        }
    }

    /// Removes the yarn lock `key` maps to. Returns false if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn remove_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str) -> CauldronResult<bool> {
        let Some(id) = self.get_yarn_lock_id(descriptor, key)? else {
            return Ok(false);
        };
        if !self.yarn_locks.stage_removal(&id)? {
            return Ok(false);
        }
        self.mutate_version(
            descriptor,
            format!("Remove yarn.lock for {descriptor} {key}"),
            |version| {
                version.yarn_locks.remove(key);
                Ok(())
            },
        )?;
        Ok(true)
    }

    /// Replaces the yarn lock `key` maps to with new content under a new
    /// id. Returns false if `key` maps to nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_yarn_lock(&self, descriptor: &AppVersionDescriptor, key: &str, lock: &[u8]) -> CauldronResult<bool> {
        let Some(old) = self.get_yarn_lock_id(descriptor, key)? else {
            return Ok(false);
        };
        self.yarn_locks.stage_removal(&old)?;
        let id = uuid::Uuid::new_v4().to_string();
        self.with_staged_yarn_lock(&id, lock, || {
            self.mutate_version(
                descriptor,
                format!("Updated yarn.lock for {descriptor} {key}"),
                |version| {
                    version.yarn_locks.insert(key.to_string(), id.clone());
                    Ok(())
                },
            )
        })?;
        Ok(true)
    }

    /// Maps `key` to another lock id, removing the lock it mapped to.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_yarn_lock_id(&self, descriptor: &AppVersionDescriptor, key: &str, id: &str) -> CauldronResult<()> {
        if let Some(old) = self.get_yarn_lock_id(descriptor, key)? {
            if old != id {
                self.yarn_locks.stage_removal(&old)?;
            }
        }
        self.mutate_version(
            descriptor,
            format!("Updated yarn.lock id for {descriptor} {key}"),
            |version| {
                version.yarn_locks.insert(key.to_string(), id.to_string());
                Ok(())
            },
        )
    }

    /// Replaces the whole key to lock id map of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn set_yarn_locks(&self, descriptor: &AppVersionDescriptor, locks: HashMap<String, String>) -> CauldronResult<()> {
        self.mutate_version(
            descriptor,
            format!("Set yarn locks for {descriptor}"),
            |version| {
                version.yarn_locks = locks.into_iter().collect();
                Ok(())
            },
        )
    }

    // ------------------------------------------------------------------
    // Bundles
    // ------------------------------------------------------------------

    /// Returns the file name of the bundle of a version.
    #[must_use]
    pub fn bundle_file_name(descriptor: &AppVersionDescriptor) -> String {
        format!(
            "{}-{}-{}.zip",
            descriptor.name(),
            descriptor.platform(),
            descriptor.version()
        )
    }

    /// Stores the zipped JS bundle of a version.
    ///
    /// # Errors
    ///
    /// Returns an error if writing or a git operation fails.
    pub fn add_bundle(&self, descriptor: &AppVersionDescriptor, bundle: &[u8]) -> CauldronResult<()> {
        self.bundles
            .stage_file(&Self::bundle_file_name(descriptor), bundle, None)?;
        self.bundles.commit(format!("Add bundle for {descriptor}"))
    }

    /// Returns true if a bundle is stored for the version.
    ///
    /// # Errors
    ///
    /// Returns an error if syncing fails.
    pub fn has_bundle(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<bool> {
        self.bundles.has_file(&Self::bundle_file_name(descriptor))
    }

    /// Returns the zipped JS bundle of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if no bundle is stored.
    pub fn get_bundle(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Vec<u8>> {
        self.bundles
            .get_file(&Self::bundle_file_name(descriptor))?
            .ok_or_else(|| CauldronError::not_found(format!("zipped bundle of {descriptor}")))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, with_version};
    use super::*;
    use serde_json::json;

    fn d(input: &str) -> Descriptor {
        Descriptor::parse(input).unwrap()
    }

    #[test]
    fn config_file_paths() {
        assert_eq!(config_file_path(None), "config/default.json");
        assert_eq!(config_file_path(Some(&d("myapp"))), "config/myapp.json");
        assert_eq!(
            config_file_path(Some(&d("myapp:ios:1.0.0"))),
            "config/myapp-ios-1.0.0.json"
        );
    }

    #[test]
    fn normalizes_cauldron_scheme() {
        assert_eq!(normalize_file_path("cauldron://dir/file.json"), "dir/file.json");
        assert_eq!(normalize_file_path("dir/file.json"), "dir/file.json");
    }

    #[test]
    fn config_bubbles_up_but_strict_does_not() {
        let (_dir, _git, store) = fixture();
        let version = Descriptor::from(with_version(&store, "myapp:android:1.0.0"));
        store
            .set_config(Some(&d("myapp")), &json!({"codePush": {"entriesLimit": 2}}))
            .unwrap();

        assert_eq!(
            store.get_config(Some(&version)).unwrap(),
            Some(json!({"codePush": {"entriesLimit": 2}}))
        );
        assert_eq!(store.get_config_strict(Some(&version)).unwrap(), None);

        let levels = store.get_config_by_level(Some(&version)).unwrap();
        assert_eq!(levels.keys().copied().collect::<Vec<_>>(), vec![ConfigLevel::NativeApp]);
    }

    #[test]
    fn empty_level_does_not_shadow_parent() {
        let (_dir, _git, store) = fixture();
        let version = Descriptor::from(with_version(&store, "myapp:android:1.0.0"));
        store.set_config(None, &json!({"top": true})).unwrap();
        store.set_config(Some(&version), &json!({})).unwrap();
        assert_eq!(store.get_config(Some(&version)).unwrap(), Some(json!({"top": true})));
    }

    #[test]
    fn update_config_merges_shallowly() {
        let (_dir, _git, store) = fixture();
        store
            .set_config(None, &json!({"a": 1, "nested": {"x": 1}}))
            .unwrap();
        store
            .update_config(None, &json!({"b": 2, "nested": {"y": 2}}))
            .unwrap();
        assert_eq!(
            store.get_config_strict(None).unwrap(),
            Some(json!({"a": 1, "b": 2, "nested": {"y": 2}}))
        );
        assert!(store.del_config(None).unwrap());
        assert!(!store.del_config(None).unwrap());
    }

    #[test]
    fn config_of_missing_descriptor_fails() {
        let (_dir, _git, store) = fixture();
        assert!(store
            .set_config(Some(&d("ghost")), &json!({}))
            .unwrap_err()
            .is_not_found());
        assert!(store.get_config(Some(&d("ghost:ios"))).unwrap_err().is_not_found());
    }

    #[test]
    fn file_lifecycle() {
        let (_dir, _git, store) = fixture();
        store.add_file("cauldron://scripts/run.sh", b"echo", Some(0o755)).unwrap();
        assert!(matches!(
            store.add_file("scripts/run.sh", b"echo", None),
            Err(CauldronError::AlreadyExists { .. })
        ));
        store.update_file("scripts/run.sh", b"echo 2", None).unwrap();
        assert_eq!(store.get_file("cauldron://scripts/run.sh").unwrap(), b"echo 2");
        store.remove_file("scripts/run.sh").unwrap();
        assert!(!store.has_file("scripts/run.sh").unwrap());
        assert!(store.get_file("scripts/run.sh").unwrap_err().is_not_found());
        assert!(store.update_file("scripts/run.sh", b"x", None).unwrap_err().is_not_found());
        assert!(matches!(
            store.add_file("", b"x", None),
            Err(CauldronError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn file_paths_stay_inside_the_working_copy() {
        let (dir, git, store) = fixture();
        let outside = tempfile::tempdir().unwrap();
        let absolute = outside.path().join("abs_escape.txt");
        let sibling = format!(
            "{}-escape.txt",
            dir.path().file_name().unwrap().to_string_lossy()
        );
        let commits = git.commit_count();

        for path in [
            format!("cauldron://../{sibling}"),
            format!("scripts/../../{sibling}"),
            absolute.to_string_lossy().into_owned(),
        ] {
            assert!(matches!(
                store.add_file(&path, b"x", None),
                Err(CauldronError::InvalidOperation { .. })
            ));
            assert!(store.get_file(&path).is_err());
            assert!(store.has_file(&path).is_err());
        }
        assert!(!absolute.exists());
        assert!(!dir.path().parent().unwrap().join(&sibling).exists());
        assert_eq!(git.commit_count(), commits);
    }

    #[test]
    fn failed_yarn_lock_leaves_nothing_staged() {
        let (dir, git, store) = fixture();
        let v = with_version(&store, "myapp:android:1.0.0");
        let unknown: AppVersionDescriptor = "myapp:android:9.9.9".parse().unwrap();
        assert!(store.add_yarn_lock(&unknown, "container", b"lock").unwrap_err().is_not_found());

        git.refuse_commits(true);
        assert!(store.add_yarn_lock(&v, "container", b"lock").is_err());
        git.refuse_commits(false);
        assert!(!store.has_yarn_lock(&v, "container").unwrap());

        store.add_or_update_description(&v, "next").unwrap();
        let commit_log = git.commit_log();
        let tree = &commit_log.last().unwrap().tree;
        assert!(!tree.keys().any(|p| p.starts_with(YARN_LOCKS_DIRECTORY)));
        let locks = dir.path().join(YARN_LOCKS_DIRECTORY);
        assert!(!locks.exists() || std::fs::read_dir(locks).unwrap().next().is_none());
    }

    #[test]
    fn yarn_lock_round_trip() {
        let (dir, git, store) = fixture();
        let v = with_version(&store, "myapp:android:1.0.0");
        let commits = git.commit_count();
        let id = store.add_yarn_lock(&v, "container", b"lock v1").unwrap();

        assert_eq!(git.commit_count(), commits + 1);
        assert_eq!(
            git.commit_log().last().unwrap().summary(),
            "Add yarn.lock for myapp:android:1.0.0 container"
        );
        assert_eq!(store.get_yarn_lock(&v, "container").unwrap().unwrap(), b"lock v1");
        assert_eq!(
            store.get_path_to_yarn_lock(&v, "container").unwrap().unwrap(),
            dir.path().join(YARN_LOCKS_DIRECTORY).join(&id)
        );

        assert!(store.update_yarn_lock(&v, "container", b"lock v2").unwrap());
        assert_ne!(store.get_yarn_lock_id(&v, "container").unwrap().unwrap(), id);
        assert!(!dir.path().join(YARN_LOCKS_DIRECTORY).join(&id).exists());

        assert!(store.remove_yarn_lock(&v, "container").unwrap());
        assert!(store.get_yarn_lock(&v, "container").unwrap().is_none());
        assert!(!store.remove_yarn_lock(&v, "container").unwrap());
        assert!(!store.update_yarn_lock(&v, "container", b"x").unwrap());
    }

    #[test]
    fn copy_yarn_lock_between_versions() {
        let (_dir, _git, store) = fixture();
        let source = with_version(&store, "myapp:android:1.0.0");
        let target = with_version(&store, "myapp:android:2.0.0");
        store.add_yarn_lock(&source, "prod", b"lock").unwrap();

        let copied = store.copy_yarn_lock(&source, &target, "prod").unwrap().unwrap();
        assert_ne!(Some(copied), store.get_yarn_lock_id(&source, "prod").unwrap());
        assert_eq!(store.get_yarn_lock(&target, "prod").unwrap().unwrap(), b"lock");
        assert!(store.copy_yarn_lock(&source, &target, "qa").unwrap().is_none());
    }

    #[test]
    fn yarn_lock_ids() {
        let (_dir, _git, store) = fixture();
        let v = with_version(&store, "myapp:ios:1.0.0");
        let id = store.add_yarn_lock(&v, "container", b"lock").unwrap();
        store.update_yarn_lock_id(&v, "container", "external-id").unwrap();
        assert_eq!(store.get_yarn_lock_id(&v, "container").unwrap().as_deref(), Some("external-id"));
        assert!(!store.yarn_locks.has_file(&id).unwrap());

        store
            .set_yarn_locks(&v, HashMap::from([("a".to_string(), "1".to_string())]))
            .unwrap();
        assert!(store.has_yarn_lock(&v, "a").unwrap());
        assert!(!store.has_yarn_lock(&v, "container").unwrap());
    }

    #[test]
    fn bundles() {
        let (dir, git, store) = fixture();
        let v: AppVersionDescriptor = "myapp:android:1.0.0".parse().unwrap();
        assert!(!store.has_bundle(&v).unwrap());
        assert!(store.get_bundle(&v).unwrap_err().is_not_found());

        store.add_bundle(&v, b"zip").unwrap();
        assert!(dir.path().join("bundles/myapp-android-1.0.0.zip").is_file());
        assert_eq!(store.get_bundle(&v).unwrap(), b"zip");
        assert_eq!(
            git.commit_log().last().unwrap().summary(),
            "Add bundle for myapp:android:1.0.0"
        );
    }
}
