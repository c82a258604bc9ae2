//! Container contents and container versions.

use super::{CauldronStore, YARN_LOCK_CONTAINER_KEY};
use crate::descriptor::{AppPlatformDescriptor, AppVersionDescriptor};
use crate::error::{CauldronError, CauldronResult};
use crate::model::{Container, ContainerKey};
use crate::package::PackagePath;
use crate::working_copy::CommitMessage;

pub(crate) fn require_version(pkg: &PackagePath) -> CauldronResult<()> {
    if pkg.version().is_none() && !pkg.is_file_path() {
        return Err(CauldronError::invalid_package(
            pkg,
            "no version, branch or tag specified",
        ));
    }
    Ok(())
}

fn not_in_container(base_path: &str, descriptor: &AppVersionDescriptor) -> CauldronError {
    CauldronError::not_found(format!("{base_path} in {descriptor} Container"))
}

impl CauldronStore {
    /// Returns the packages stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_packages(&self, descriptor: &AppVersionDescriptor, key: ContainerKey) -> CauldronResult<Vec<PackagePath>> {
        Ok(self.get_version(descriptor)?.container.packages(key))
    }

    /// Returns the package stored under `key` with the given base path.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_package(
        &self,
        descriptor: &AppVersionDescriptor,
        key: ContainerKey,
        base_path: &str,
    ) -> CauldronResult<Option<PackagePath>> {
        Ok(self.get_version(descriptor)?.container.find(key, base_path))
    }

    /// Returns true if a package with the base path of `pkg` is stored
    /// under `key`, whatever its version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn is_package_in_container(&self, descriptor: &AppVersionDescriptor, key: ContainerKey, pkg: &PackagePath) -> CauldronResult<bool> {
        Ok(self
            .get_container_package(descriptor, key, pkg.base_path())?
            .is_some())
    }

    /// Adds a package under `key`.
    ///
    /// Registry and git packages need an explicit version; local file
    /// paths do not.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidPackage`] for a package without a
    /// version, [`CauldronError::AlreadyExists`] if a package with the same
    /// base path is stored under `key`, or [`CauldronError::NotFound`] if
    /// the version does not exist.
    pub fn add_package_to_container(&self, descriptor: &AppVersionDescriptor, key: ContainerKey, pkg: &PackagePath) -> CauldronResult<()> {
        require_version(pkg)?;
        let message = if key.is_branch() {
            format!(
                "Add {} {} branch to {descriptor} Container",
                pkg.base_path(),
                pkg.version().unwrap_or_default()
            )
        } else {
            format!("Add {pkg} {} to {descriptor} Container", key.label())
        };
        self.mutate_version(descriptor, message, |version| {
            if version.container.add(key, pkg.clone()) {
                Ok(())
            } else {
                Err(CauldronError::already_exists(format!(
                    "{} in {descriptor} Container",
                    pkg.base_path()
                )))
            }
        })
    }

    /// Replaces the package under `key` that has the base path of `pkg`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidPackage`] for a package without a
    /// version, or [`CauldronError::NotFound`] if there is no such package.
    pub fn update_package_in_container(&self, descriptor: &AppVersionDescriptor, key: ContainerKey, pkg: &PackagePath) -> CauldronResult<()> {
        require_version(pkg)?;
        let version = pkg.version().unwrap_or_default();
        let message = match key {
            ContainerKey::MiniApps => format!(
                "Update {} MiniApp to version {version} in {descriptor} Container",
                pkg.base_path()
            ),
            ContainerKey::MiniAppsBranches | ContainerKey::JsApiImplsBranches => format!(
                "Update {} git branch to {version} in {descriptor} Container",
                pkg.base_path()
            ),
            ContainerKey::JsApiImpls => format!(
                "Update {} JS API implementation to version {version} in {descriptor} Container",
                pkg.base_path()
            ),
            ContainerKey::NativeDeps => format!(
                "Update {} dependency to version {version} in {descriptor} Container",
                pkg.base_path()
            ),
        };
        self.mutate_version(descriptor, message, |v| {
            if v.container.update(key, pkg.clone()) {
                Ok(())
            } else {
                Err(not_in_container(pkg.base_path(), descriptor))
            }
        })
    }

    /// Removes the package under `key` that has the base path of `pkg`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if there is no such package.
    pub fn remove_package_from_container(&self, descriptor: &AppVersionDescriptor, key: ContainerKey, pkg: &PackagePath) -> CauldronResult<()> {
        let base_path = pkg.base_path();
        let message = match key {
            ContainerKey::NativeDeps => {
                format!("Remove {base_path} dependency from {descriptor} Container")
            }
            _ => format!("Remove {base_path} {} from {descriptor} Container", key.label()),
        };
        self.mutate_version(descriptor, message, |v| {
            if v.container.remove(key, base_path) {
                Ok(())
            } else {
                Err(not_in_container(base_path, descriptor))
            }
        })
    }

    /// Applies several edits to the container of a version as one commit.
    ///
    /// Nothing is written if `f` fails, so a branch and the commit it
    /// resolved to change together or not at all.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or [`CauldronError::NotFound`] if the
    /// version does not exist.
    pub fn edit_container(
        &self,
        descriptor: &AppVersionDescriptor,
        message: impl Into<CommitMessage>,
        f: impl FnOnce(&mut Container) -> CauldronResult<()>,
    ) -> CauldronResult<()> {
        self.mutate_version(descriptor, message, |v| f(&mut v.container))
    }

    /// Replaces every package under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidPackage`] if two packages share a
    /// base path, or [`CauldronError::NotFound`] if the version does not
    /// exist.
    pub fn set_packages_in_container(
        &self,
        descriptor: &AppVersionDescriptor,
        key: ContainerKey,
        packages: Vec<PackagePath>,
    ) -> CauldronResult<()> {
        let duplicate = packages.iter().enumerate().find_map(|(i, p)| {
            packages[..i]
                .iter()
                .any(|q| q.base_path() == p.base_path())
                .then_some(p)
        });
        if let Some(pkg) = duplicate {
            return Err(CauldronError::invalid_package(pkg, "listed twice"));
        }
        self.mutate_version(
            descriptor,
            format!("Set {key} in {descriptor} Container"),
            |v| {
                v.container.set(key, packages);
                Ok(())
            },
        )
    }

    /// Removes every package from the container, and the container yarn
    /// lock id.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn empty_container(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<()> {
        self.mutate_version(
            descriptor,
            format!("Empty Container of {descriptor}"),
            |v| {
                v.container.clear();
                v.yarn_locks.remove(YARN_LOCK_CONTAINER_KEY);
                Ok(())
            },
        )
    }

    // ------------------------------------------------------------------
    // Container versions
    // ------------------------------------------------------------------

    /// Sets the top-level container version of a platform.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the platform does not exist.
    pub fn update_top_level_container_version(&self, descriptor: &AppPlatformDescriptor, version: &str) -> CauldronResult<()> {
        let message = format!("Update top level Container version of {descriptor} to {version}");
        self.mutate(message, |doc| {
            let platform = doc
                .platform_mut(descriptor)
                .ok_or_else(|| CauldronError::not_found(descriptor.to_string()))?;
            platform.container_version = Some(version.to_string());
            Ok(())
        })
    }

    /// Returns the top-level container version of a platform.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the platform does not exist.
    pub fn get_top_level_container_version(&self, descriptor: &AppPlatformDescriptor) -> CauldronResult<Option<String>> {
        Ok(self.get_platform(descriptor)?.container_version)
    }

    /// Sets the container version of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_container_version(&self, descriptor: &AppVersionDescriptor, version: &str) -> CauldronResult<()> {
        self.mutate_version(
            descriptor,
            format!("Update container version of {descriptor} to {version}"),
            |v| {
                v.container_version = Some(version.to_string());
                Ok(())
            },
        )
    }

    /// Returns the container version of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_version(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Option<String>> {
        Ok(self.get_version(descriptor)?.container_version)
    }

    /// Records the tooling version that generated the container.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn update_container_ern_version(&self, descriptor: &AppVersionDescriptor, ern_version: &str) -> CauldronResult<()> {
        self.mutate_version(
            descriptor,
            format!("Update version of ern used to generate Container of {descriptor}"),
            |v| {
                v.container.ern_version = Some(ern_version.to_string());
                Ok(())
            },
        )
    }

    /// Returns the tooling version that generated the container.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_ern_version(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Option<String>> {
        Ok(self.get_version(descriptor)?.container.ern_version)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, with_version};
    use super::*;

    #[test]
    fn add_then_duplicate_base_path() {
        let (_dir, git, store) = fixture();
        let d = with_version(&store, "myapp:android:1.0.0");
        store
            .add_package_to_container(&d, ContainerKey::MiniApps, &"foo@1.0.0".into())
            .unwrap();
        assert_eq!(
            git.commit_log().last().unwrap().summary(),
            "Add foo@1.0.0 MiniApp to myapp:android:1.0.0 Container"
        );
        let err = store
            .add_package_to_container(&d, ContainerKey::MiniApps, &"foo@2.0.0".into())
            .unwrap_err();
        assert!(matches!(err, CauldronError::AlreadyExists { .. }));
        assert_eq!(
            store.get_container_packages(&d, ContainerKey::MiniApps).unwrap(),
            vec![PackagePath::from("foo@1.0.0")]
        );
    }

    #[test]
    fn add_requires_version_except_for_files() {
        let (_dir, _git, store) = fixture();
        let d = with_version(&store, "myapp:ios:1.0.0");
        assert!(matches!(
            store.add_package_to_container(&d, ContainerKey::NativeDeps, &"react-native".into()),
            Err(CauldronError::InvalidPackage { .. })
        ));
        store
            .add_package_to_container(&d, ContainerKey::MiniApps, &"file:/tmp/miniapp".into())
            .unwrap();
    }

    #[test]
    fn update_and_remove_by_base_path() {
        let (_dir, git, store) = fixture();
        let d = with_version(&store, "myapp:android:1.0.0");
        store
            .add_package_to_container(&d, ContainerKey::NativeDeps, &"react-native@0.59.0".into())
            .unwrap();
        store
            .update_package_in_container(&d, ContainerKey::NativeDeps, &"react-native@0.60.0".into())
            .unwrap();
        assert_eq!(
            git.commit_log().last().unwrap().summary(),
            "Update react-native dependency to version 0.60.0 in myapp:android:1.0.0 Container"
        );
        assert!(store
            .is_package_in_container(&d, ContainerKey::NativeDeps, &"react-native".into())
            .unwrap());

        store
            .remove_package_from_container(&d, ContainerKey::NativeDeps, &"react-native".into())
            .unwrap();
        assert!(store
            .remove_package_from_container(&d, ContainerKey::NativeDeps, &"react-native".into())
            .unwrap_err()
            .is_not_found());
        assert!(store
            .update_package_in_container(&d, ContainerKey::NativeDeps, &"react-native@1.0.0".into())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn set_sorts_by_full_path() {
        let (_dir, _git, store) = fixture();
        let d = with_version(&store, "myapp:android:1.0.0");
        store
            .set_packages_in_container(
                &d,
                ContainerKey::JsApiImpls,
                vec!["zeta@1.0.0".into(), "alpha@2.0.0".into()],
            )
            .unwrap();
        assert_eq!(
            store.get_container_packages(&d, ContainerKey::JsApiImpls).unwrap(),
            vec![PackagePath::from("alpha@2.0.0"), PackagePath::from("zeta@1.0.0")]
        );
        assert!(store
            .set_packages_in_container(
                &d,
                ContainerKey::JsApiImpls,
                vec!["a@1.0.0".into(), "a@2.0.0".into()],
            )
            .is_err());
    }

    #[test]
    fn empty_container_drops_container_lock_id() {
        let (_dir, _git, store) = fixture();
        let d = with_version(&store, "myapp:android:1.0.0");
        store
            .add_package_to_container(&d, ContainerKey::MiniApps, &"foo@1.0.0".into())
            .unwrap();
        store.set_yarn_lock_id(&d, YARN_LOCK_CONTAINER_KEY, "abc").unwrap();
        store.empty_container(&d).unwrap();

        let version = store.get_version(&d).unwrap();
        assert!(version.container.mini_apps.is_empty());
        assert!(version.yarn_locks.is_empty());
    }

    #[test]
    fn container_versions() {
        let (_dir, _git, store) = fixture();
        let d = with_version(&store, "myapp:android:1.0.0");
        store.update_container_version(&d, "1.2.3").unwrap();
        store.update_top_level_container_version(&d.to_platform(), "1.2.3").unwrap();
        store.update_container_ern_version(&d, "0.40.0").unwrap();
        assert_eq!(store.get_container_version(&d).unwrap().as_deref(), Some("1.2.3"));
        assert_eq!(
            store
                .get_top_level_container_version(&d.to_platform())
                .unwrap()
                .as_deref(),
            Some("1.2.3")
        );
        assert_eq!(store.get_container_ern_version(&d).unwrap().as_deref(), Some("0.40.0"));
    }
}
