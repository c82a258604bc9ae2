//! Container contents of a native application version.

use crate::package::PackagePath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects one package list of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKey {
    /// Resolved MiniApp packages.
    MiniApps,
    /// Git branches tracked by MiniApps.
    MiniAppsBranches,
    /// Resolved JS API implementation packages.
    JsApiImpls,
    /// Git branches tracked by JS API implementations.
    JsApiImplsBranches,
    /// Native dependencies.
    NativeDeps,
}

impl ContainerKey {
    /// Returns the on-disk array name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MiniApps => "miniApps",
            Self::MiniAppsBranches => "miniAppsBranches",
            Self::JsApiImpls => "jsApiImpls",
            Self::JsApiImplsBranches => "jsApiImplsBranches",
            Self::NativeDeps => "nativeDeps",
        }
    }

    /// Returns true for the two branch keys.
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::MiniAppsBranches | Self::JsApiImplsBranches)
    }

    /// Returns the branch key paired with a primary key.
    #[must_use]
    pub const fn branch_key(self) -> Option<ContainerKey> {
        match self {
            Self::MiniApps => Some(Self::MiniAppsBranches),
            Self::JsApiImpls => Some(Self::JsApiImplsBranches),
            _ => None,
        }
    }

    /// Returns a human label used in commit messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MiniApps => "MiniApp",
            Self::JsApiImpls => "JS API implementation",
            Self::NativeDeps => "native dependency",
            Self::MiniAppsBranches | Self::JsApiImplsBranches => "branch",
        }
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A MiniApp or JS API implementation entry.
///
/// A tracking entry follows a git branch. Once resolved it also carries the
/// commit-pinned path the container is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsPackage {
    /// A package locked to a literal version.
    Pinned(PackagePath),
    /// A package following a git branch.
    Tracking {
        /// `repo.git#branch`.
        branch: PackagePath,
        /// `repo.git#sha`, once the branch has been resolved.
        resolved: Option<PackagePath>,
    },
}

impl JsPackage {
    /// Returns the package identity.
    #[must_use]
    pub fn base_path(&self) -> &str {
        match self {
            Self::Pinned(p) => p.base_path(),
            Self::Tracking { branch, .. } => branch.base_path(),
        }
    }

    /// Returns the path the container is built from.
    #[must_use]
    pub fn resolved(&self) -> Option<&PackagePath> {
        match self {
            Self::Pinned(p) => Some(p),
            Self::Tracking { resolved, .. } => resolved.as_ref(),
        }
    }

    /// Returns the tracked branch, if any.
    #[must_use]
    pub fn branch(&self) -> Option<&PackagePath> {
        match self {
            Self::Pinned(_) => None,
            Self::Tracking { branch, .. } => Some(branch),
        }
    }
}

/// Packages bundled into one native application version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawContainer", into = "RawContainer")]
pub struct Container {
    /// MiniApps, in container order.
    pub mini_apps: Vec<JsPackage>,
    /// JS API implementations, in container order.
    pub js_api_impls: Vec<JsPackage>,
    /// Native dependencies.
    pub native_deps: Vec<PackagePath>,
    /// Version of the platform tooling that generated the container.
    pub ern_version: Option<String>,
}

/// Container as stored on disk: branch tracking is a parallel array.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawContainer {
    #[serde(default)]
    mini_apps: Vec<PackagePath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    mini_apps_branches: Vec<PackagePath>,
    #[serde(default)]
    js_api_impls: Vec<PackagePath>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    js_api_impls_branches: Vec<PackagePath>,
    #[serde(default)]
    native_deps: Vec<PackagePath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ern_version: Option<String>,
}

fn pair(primary: Vec<PackagePath>, branches: Vec<PackagePath>) -> Vec<JsPackage> {
    let mut branches: Vec<Option<PackagePath>> = branches.into_iter().map(Some).collect();
    let mut entries: Vec<JsPackage> = primary
        .into_iter()
        .map(|p| {
            let branch = branches.iter_mut().find_map(|slot| {
                if slot.as_ref().is_some_and(|b| b.base_path() == p.base_path()) {
                    slot.take()
                } else {
                    None
                }
            });
            match branch {
                Some(branch) => JsPackage::Tracking {
                    branch,
                    resolved: Some(p),
                },
                None => JsPackage::Pinned(p),
            }
        })
        .collect();
    entries.extend(
        branches
            .into_iter()
            .flatten()
            .map(|branch| JsPackage::Tracking {
                branch,
                resolved: None,
            }),
    );
    entries
}

fn resolved_paths(list: &[JsPackage]) -> Vec<PackagePath> {
    list.iter().filter_map(JsPackage::resolved).cloned().collect()
}

fn branch_paths(list: &[JsPackage]) -> Vec<PackagePath> {
    list.iter().filter_map(JsPackage::branch).cloned().collect()
}

impl From<RawContainer> for Container {
    fn from(raw: RawContainer) -> Self {
        Self {
            mini_apps: pair(raw.mini_apps, raw.mini_apps_branches),
            js_api_impls: pair(raw.js_api_impls, raw.js_api_impls_branches),
            native_deps: raw.native_deps,
            ern_version: raw.ern_version,
        }
    }
}

impl From<Container> for RawContainer {
    fn from(c: Container) -> Self {
        Self {
            mini_apps: resolved_paths(&c.mini_apps),
            mini_apps_branches: branch_paths(&c.mini_apps),
            js_api_impls: resolved_paths(&c.js_api_impls),
            js_api_impls_branches: branch_paths(&c.js_api_impls),
            native_deps: c.native_deps,
            ern_version: c.ern_version,
        }
    }
}

impl Container {
    fn js_list(&self, key: ContainerKey) -> Option<&Vec<JsPackage>> {
        match key {
            ContainerKey::MiniApps | ContainerKey::MiniAppsBranches => Some(&self.mini_apps),
            ContainerKey::JsApiImpls | ContainerKey::JsApiImplsBranches => Some(&self.js_api_impls),
            ContainerKey::NativeDeps => None,
        }
    }

    fn js_list_mut(&mut self, key: ContainerKey) -> Option<&mut Vec<JsPackage>> {
        match key {
            ContainerKey::MiniApps | ContainerKey::MiniAppsBranches => Some(&mut self.mini_apps),
            ContainerKey::JsApiImpls | ContainerKey::JsApiImplsBranches => {
                Some(&mut self.js_api_impls)
            }
            ContainerKey::NativeDeps => None,
        }
    }

    /// Returns the packages stored under `key`, as they appear on disk.
    #[must_use]
    pub fn packages(&self, key: ContainerKey) -> Vec<PackagePath> {
        match self.js_list(key) {
            None => self.native_deps.clone(),
            Some(list) if key.is_branch() => branch_paths(list),
            Some(list) => resolved_paths(list),
        }
    }

    /// Returns the package stored under `key` with the given base path.
    #[must_use]
    pub fn find(&self, key: ContainerKey, base_path: &str) -> Option<PackagePath> {
        self.packages(key)
            .into_iter()
            .find(|p| p.base_path() == base_path)
    }

    /// Adds `pkg` under `key`.
    ///
    /// Returns false, leaving the container unchanged, if a package with the
    /// same base path is already stored under `key`.
    pub fn add(&mut self, key: ContainerKey, pkg: PackagePath) -> bool {
        if self.find(key, pkg.base_path()).is_some() {
            return false;
        }
        let is_branch = key.is_branch();
        let Some(list) = self.js_list_mut(key) else {
            self.native_deps.push(pkg);
            return true;
        };
        // With no duplicate under `key`, an entry with the same base path can
        // only be a pinned package (branch key) or an unresolved branch.
        match list.iter().position(|e| e.base_path() == pkg.base_path()) {
            Some(index) => {
                let entry = &mut list[index];
                if is_branch {
                    let resolved = entry.resolved().cloned();
                    *entry = JsPackage::Tracking {
                        branch: pkg,
                        resolved,
                    };
                } else if let JsPackage::Tracking { resolved, .. } = entry {
                    *resolved = Some(pkg);
                }
            }
            None if is_branch => list.push(JsPackage::Tracking {
                branch: pkg,
                resolved: None,
            }),
            None => list.push(JsPackage::Pinned(pkg)),
        }
        true
    }

    /// Replaces the package under `key` that has the base path of `pkg`.
    ///
    /// Returns false if there is no such package.
    pub fn update(&mut self, key: ContainerKey, pkg: PackagePath) -> bool {
        let is_branch = key.is_branch();
        let Some(list) = self.js_list_mut(key) else {
            return match self
                .native_deps
                .iter_mut()
                .find(|p| p.base_path() == pkg.base_path())
            {
                Some(slot) => {
                    *slot = pkg;
                    true
                }
                None => false,
            };
        };
        for entry in list.iter_mut() {
            match entry {
                JsPackage::Pinned(p) if !is_branch && p.base_path() == pkg.base_path() => {
                    *p = pkg;
                    return true;
                }
                JsPackage::Tracking {
                    resolved: Some(r), ..
                } if !is_branch && r.base_path() == pkg.base_path() => {
                    *r = pkg;
                    return true;
                }
                JsPackage::Tracking { branch, .. }
                    if is_branch && branch.base_path() == pkg.base_path() =>
                {
                    *branch = pkg;
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Removes the package under `key` with the given base path.
    ///
    /// Removing a resolved entry also drops the branch it tracks. Removing
    /// a branch turns a resolved entry back into a pinned one. Returns false
    /// if there is no such package.
    pub fn remove(&mut self, key: ContainerKey, base_path: &str) -> bool {
        let is_branch = key.is_branch();
        let Some(list) = self.js_list_mut(key) else {
            let before = self.native_deps.len();
            self.native_deps.retain(|p| p.base_path() != base_path);
            return self.native_deps.len() != before;
        };
        let position = list.iter().position(|e| {
            let candidate = if is_branch { e.branch() } else { e.resolved() };
            candidate.is_some_and(|p| p.base_path() == base_path)
        });
        let Some(index) = position else {
            return false;
        };
        if is_branch {
            match list[index].resolved().cloned() {
                Some(resolved) => list[index] = JsPackage::Pinned(resolved),
                None => {
                    list.remove(index);
                }
            }
        } else {
            list.remove(index);
        }
        true
    }

    /// Replaces every package under `key`, sorted by full path.
    ///
    /// Branch tracking survives for packages whose base path is kept.
    pub fn set(&mut self, key: ContainerKey, mut packages: Vec<PackagePath>) {
        packages.sort_by(|a, b| a.full_path().cmp(b.full_path()));
        let is_branch = key.is_branch();
        let Some(list) = self.js_list_mut(key) else {
            self.native_deps = packages;
            return;
        };
        let previous = std::mem::take(list);
        if is_branch {
            let mut next: Vec<JsPackage> = previous
                .into_iter()
                .filter_map(|e| e.resolved().cloned().map(JsPackage::Pinned))
                .collect();
            for pkg in packages {
                match next.iter_mut().find(|e| e.base_path() == pkg.base_path()) {
                    Some(entry) => {
                        let resolved = entry.resolved().cloned();
                        *entry = JsPackage::Tracking {
                            branch: pkg,
                            resolved,
                        };
                    }
                    None => next.push(JsPackage::Tracking {
                        branch: pkg,
                        resolved: None,
                    }),
                }
            }
            *list = next;
        } else {
            let mut next: Vec<JsPackage> = packages
                .into_iter()
                .map(|pkg| {
                    match previous
                        .iter()
                        .find_map(|e| e.branch().filter(|b| b.base_path() == pkg.base_path()))
                    {
                        Some(branch) => JsPackage::Tracking {
                            branch: branch.clone(),
                            resolved: Some(pkg),
                        },
                        None => JsPackage::Pinned(pkg),
                    }
                })
                .collect();
            let orphaned: Vec<JsPackage> = previous
                .iter()
                .filter_map(JsPackage::branch)
                .filter(|b| !next.iter().any(|e| e.base_path() == b.base_path()))
                .map(|b| JsPackage::Tracking {
                    branch: b.clone(),
                    resolved: None,
                })
                .collect();
            next.extend(orphaned);
            *list = next;
        }
    }

    /// Removes every MiniApp, JS API implementation and native dependency.
    pub fn clear(&mut self) {
        self.mini_apps.clear();
        self.js_api_impls.clear();
        self.native_deps.clear();
    }

    /// Returns the first base path stored twice under one key, if any.
    #[must_use]
    pub fn duplicate_base_path(&self) -> Option<(ContainerKey, String)> {
        [
            ContainerKey::MiniApps,
            ContainerKey::MiniAppsBranches,
            ContainerKey::JsApiImpls,
            ContainerKey::JsApiImplsBranches,
            ContainerKey::NativeDeps,
        ]
        .into_iter()
        .find_map(|key| {
            let packages = self.packages(key);
            packages.iter().enumerate().find_map(|(i, p)| {
                packages[..i]
                    .iter()
                    .any(|q| q.base_path() == p.base_path())
                    .then(|| (key, p.base_path().to_string()))
            })
        })
    }
}
