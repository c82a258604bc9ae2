//! Guarded container operations and git branch tracking.
//!
//! A MiniApp or JS API implementation given as `repo.git#ref` where `ref`
//! is a branch is stored twice: the branch itself, and the commit the
//! branch pointed at, as `repo.git#sha`. Containers are built from the
//! commit. Updating re-resolves the branch; updating to a literal version
//! drops the branch unless asked to keep it.

use super::{PackageDelta, ReleaseManager};
use crate::cauldron::require_version;
use crate::descriptor::AppVersionDescriptor;
use crate::error::{CauldronError, CauldronResult};
use crate::model::{ContainerKey, JsPackage};
use crate::package::PackagePath;
use tracing::debug;

fn not_in_container(base_path: &str, descriptor: &AppVersionDescriptor) -> CauldronError {
    CauldronError::not_found(format!("{base_path} in {descriptor} Container"))
}

impl ReleaseManager {
    /// Returns the commit a branch-tracked git package currently points at,
    /// or `None` if `pkg` does not name a git branch.
    fn resolve_branch(&self, pkg: &PackagePath) -> CauldronResult<Option<String>> {
        let Some(reference) = pkg.version().filter(|_| pkg.is_git_path()) else {
            return Ok(None);
        };
        let url = pkg.base_path();
        let url = url.strip_prefix("git+").unwrap_or(url);
        if !self.resolver.is_branch(url, reference)? {
            return Ok(None);
        }
        let sha = self.resolver.resolve_commit_sha(url, reference)?;
        debug!(package = %pkg, %sha, "Resolved git branch");
        Ok(Some(sha))
    }

    fn add_js_package(&self, descriptor: &AppVersionDescriptor, key: ContainerKey, pkg: &PackagePath) -> CauldronResult<()> {
        let Some(branch_key) = key.branch_key() else {
            return self.store.add_package_to_container(descriptor, key, pkg);
        };
        let Some(sha) = self.resolve_branch(pkg)? else {
            return self.store.add_package_to_container(descriptor, key, pkg);
        };
        let base_path = pkg.base_path();
        let pinned = pkg.with_version(&sha);
        let message = format!("Add {pkg} {} to {descriptor} Container", key.label());
        self.store.edit_container(descriptor, message, |container| {
            if container.find(key, base_path).is_some() || container.find(branch_key, base_path).is_some() {
                return Err(CauldronError::already_exists(format!(
                    "{base_path} in {descriptor} Container"
                )));
            }
            container.add(branch_key, pkg.clone());
            container.add(key, pinned);
            Ok(())
        })
    }

    fn update_js_package(
        &self,
        descriptor: &AppVersionDescriptor,
        key: ContainerKey,
        pkg: &PackagePath,
        keep_branch: bool,
    ) -> CauldronResult<()> {
        let Some(branch_key) = key.branch_key() else {
            return self
                .store
                .update_package_in_container(descriptor, key, pkg);
        };
        let resolved = self.resolve_branch(pkg)?;
        if resolved.is_none() && keep_branch {
            return self
                .store
                .update_package_in_container(descriptor, key, pkg);
        }
        require_version(pkg)?;
        let base_path = pkg.base_path();
        let message = format!(
            "Update {base_path} {} to version {} in {descriptor} Container",
            key.label(),
            pkg.version().unwrap_or_default()
        );
        self.store.edit_container(descriptor, message, |container| {
            match resolved {
                Some(sha) => {
                    let pinned = pkg.with_version(&sha);
                    if !container.update(branch_key, pkg.clone()) {
                        container.add(branch_key, pkg.clone());
                    }
                    if !container.update(key, pinned.clone()) {
                        container.add(key, pinned);
                    }
                }
                None => {
                    if !container.update(key, pkg.clone()) {
                        return Err(not_in_container(base_path, descriptor));
                    }
                    if container.remove(branch_key, base_path) {
                        debug!(package = %pkg, "Stopped tracking git branch");
                    }
                }
            }
            Ok(())
        })
    }

    fn remove_js_package(&self, descriptor: &AppVersionDescriptor, key: ContainerKey, pkg: &PackagePath) -> CauldronResult<()> {
        let Some(branch_key) = key.branch_key() else {
            return self
                .store
                .remove_package_from_container(descriptor, key, pkg);
        };
        let base_path = pkg.base_path();
        let message = format!("Remove {base_path} {} from {descriptor} Container", key.label());
        self.store.edit_container(descriptor, message, |container| {
            // An unresolved branch has no entry under `key`.
            let tracked = container.remove(branch_key, base_path);
            if !container.remove(key, base_path) && !tracked {
                return Err(not_in_container(base_path, descriptor));
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Native dependencies
    // ------------------------------------------------------------------

    /// Adds a native dependency to the container of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::AlreadyExists`] if the dependency is present.
    pub fn add_native_dependency(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot add a native dependency to a released native app version")?;
        self.store
            .add_package_to_container(descriptor, ContainerKey::NativeDeps, pkg)
    }

    /// Changes the version of a native dependency.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::NotFound`] if the dependency is absent.
    pub fn update_native_dependency(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot update a native dependency for a released native app version")?;
        self.store
            .update_package_in_container(descriptor, ContainerKey::NativeDeps, pkg)
    }

    /// Removes a native dependency.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::NotFound`] if the dependency is absent.
    pub fn remove_native_dependency(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot remove a native dependency from a released native app version")?;
        self.store
            .remove_package_from_container(descriptor, ContainerKey::NativeDeps, pkg)
    }

    /// Returns the native dependencies of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_native_dependencies(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Vec<PackagePath>> {
        self.store
            .get_container_packages(descriptor, ContainerKey::NativeDeps)
    }

    // ------------------------------------------------------------------
    // MiniApps
    // ------------------------------------------------------------------

    /// Adds a MiniApp to the container of a version.
    ///
    /// A git branch is tracked and the container gets the commit it
    /// currently points at.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// [`CauldronError::AlreadyExists`] if the MiniApp is present, or
    /// [`CauldronError::Sync`] if the branch cannot be resolved.
    pub fn add_mini_app(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot add a MiniApp to a released native application version Container")?;
        self.add_js_package(descriptor, ContainerKey::MiniApps, pkg)
    }

    /// Changes the version of a MiniApp.
    ///
    /// A git branch is re-resolved. Any other version stops branch
    /// tracking, unless `keep_branch` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::NotFound`] if the MiniApp is absent.
    pub fn update_mini_app_version(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath, keep_branch: bool) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot update a MiniApp of a released native application version Container")?;
        self.update_js_package(descriptor, ContainerKey::MiniApps, pkg, keep_branch)
    }

    /// Removes a MiniApp and the branch it tracks.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::NotFound`] if the MiniApp is absent.
    pub fn remove_mini_app(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot remove a js package from a released native application version Container")?;
        self.remove_js_package(descriptor, ContainerKey::MiniApps, pkg)
    }

    /// Returns the MiniApps of a version.
    ///
    /// With `favor_git_branches`, branch-tracked MiniApps are returned as
    /// their branch rather than their pinned commit, after the others.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_mini_apps(&self, descriptor: &AppVersionDescriptor, favor_git_branches: bool) -> CauldronResult<Vec<PackagePath>> {
        let entries = self.store.get_version(descriptor)?.container.mini_apps;
        if !favor_git_branches {
            return Ok(entries.iter().filter_map(JsPackage::resolved).cloned().collect());
        }
        let (tracking, pinned): (Vec<JsPackage>, Vec<JsPackage>) =
            entries.into_iter().partition(|e| e.branch().is_some());
        Ok(pinned
            .iter()
            .filter_map(JsPackage::resolved)
            .chain(tracking.iter().filter_map(JsPackage::branch))
            .cloned()
            .collect())
    }

    /// Returns the MiniApps of a version with the branch each one tracks.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_mini_apps_with_branches(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Vec<JsPackage>> {
        Ok(self.store.get_version(descriptor)?.container.mini_apps)
    }

    /// Returns `repo.git#sha` for every MiniApp branch that moved since it
    /// was last resolved.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Sync`] if a branch cannot be resolved.
    pub fn get_latest_shas_for_mini_apps_branches(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Vec<PackagePath>> {
        self.latest_shas(descriptor, ContainerKey::MiniApps)
    }

    // ------------------------------------------------------------------
    // JS API implementations
    // ------------------------------------------------------------------

    /// Adds a JS API implementation to the container of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::AlreadyExists`] if it is present.
    pub fn add_js_api_impl(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath) -> CauldronResult<()> {
        self.ensure_not_released(
            descriptor,
            "Cannot add a JS API implementation to a released native application version Container",
        )?;
        self.add_js_package(descriptor, ContainerKey::JsApiImpls, pkg)
    }

    /// Changes the version of a JS API implementation.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::NotFound`] if it is absent.
    pub fn update_js_api_impl_version(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath, keep_branch: bool) -> CauldronResult<()> {
        self.ensure_not_released(
            descriptor,
            "Cannot update a JS API implementation of a released native application version Container",
        )?;
        self.update_js_package(descriptor, ContainerKey::JsApiImpls, pkg, keep_branch)
    }

    /// Removes a JS API implementation and the branch it tracks.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::NotFound`] if it is absent.
    pub fn remove_js_api_impl(&self, descriptor: &AppVersionDescriptor, pkg: &PackagePath) -> CauldronResult<()> {
        self.ensure_not_released(descriptor, "Cannot remove a js package from a released native application version Container")?;
        self.remove_js_package(descriptor, ContainerKey::JsApiImpls, pkg)
    }

    /// Returns the JS API implementations of a version.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_container_js_api_impls(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Vec<PackagePath>> {
        self.store
            .get_container_packages(descriptor, ContainerKey::JsApiImpls)
    }

    /// Returns `repo.git#sha` for every JS API implementation branch that
    /// moved since it was last resolved.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Sync`] if a branch cannot be resolved.
    pub fn get_latest_shas_for_js_api_impls_branches(&self, descriptor: &AppVersionDescriptor) -> CauldronResult<Vec<PackagePath>> {
        self.latest_shas(descriptor, ContainerKey::JsApiImpls)
    }

    fn latest_shas(&self, descriptor: &AppVersionDescriptor, key: ContainerKey) -> CauldronResult<Vec<PackagePath>> {
        let version = self.store.get_version(descriptor)?;
        let entries = match key {
            ContainerKey::JsApiImpls => version.container.js_api_impls,
            _ => version.container.mini_apps,
        };
        let mut moved = Vec::new();
        for entry in &entries {
            let Some(branch) = entry.branch() else {
                continue;
            };
            let Some(sha) = self.resolve_branch(branch)? else {
                continue;
            };
            if entry.resolved().and_then(PackagePath::version) != Some(sha.as_str()) {
                moved.push(branch.with_version(&sha));
            }
        }
        Ok(moved)
    }

    // ------------------------------------------------------------------
    // Synchronization
    // ------------------------------------------------------------------

    /// Brings the packages stored under `key` in line with `packages`.
    ///
    /// Packages the container lacks are added, packages it holds at
    /// another version are updated in place. Packages the container holds
    /// that `packages` does not mention are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::ReleasedVersion`] for a released version,
    /// or [`CauldronError::InvalidOperation`] for a branch key.
    pub fn sync_container_packages(
        &self,
        descriptor: &AppVersionDescriptor,
        key: ContainerKey,
        packages: &[PackagePath],
    ) -> CauldronResult<PackageDelta> {
        if key.is_branch() {
            return Err(CauldronError::invalid_operation(format!(
                "cannot synchronize {key}, branches follow their packages"
            )));
        }
        self.ensure_not_released(descriptor, "Cannot update the Container of a released native application version")?;
        let current = self.store.get_container_packages(descriptor, key)?;
        let delta = PackageDelta::compute(&current, packages);
        for pkg in &delta.new {
            self.add_js_package(descriptor, key, pkg)?;
        }
        for pkg in &delta.upgraded {
            self.update_js_package(descriptor, key, pkg, false)?;
        }
        debug!(
            version = %descriptor,
            %key,
            new = delta.new.len(),
            upgraded = delta.upgraded.len(),
            "Synchronized container packages"
        );
        Ok(delta)
    }
}
