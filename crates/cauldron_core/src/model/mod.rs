//! The Cauldron document.
//!
//! The whole tree is one JSON file. These structs are its (de)serialization
//! boundary: [`Cauldron::check_invariants`] runs on every load so a
//! hand-edited or corrupted document is rejected before it is mutated.
//!
//! # Invariants
//!
//! - Native applications are sorted by name, names are unique.
//! - Platforms are sorted by name, names are unique within an application.
//! - Versions are sorted valid-semver first, in semver order, then the
//!   remaining names lexically. Names are unique within a platform.
//! - No container array holds two packages with the same base path.

mod code_push;
mod container;

pub use code_push::{CodePushEntry, CodePushMetadata, CodePushPatch};
pub use container::{Container, ContainerKey, JsPackage};

use crate::descriptor::{AppNameDescriptor, AppPlatformDescriptor, AppVersionDescriptor, NativePlatform};
use crate::error::{CauldronError, CauldronResult};
use crate::version::compare_version_names;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema version written by this library.
pub const SCHEMA_VERSION: &str = "3.0.0";

/// Schema version assumed when a document carries none.
pub const UNVERSIONED_SCHEMA: &str = "0.0.0";

/// Root of the Cauldron document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cauldron {
    /// Schema version of the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Native applications, sorted by name.
    #[serde(default)]
    pub native_apps: Vec<NativeApp>,
    /// Legacy inline top-level configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl Default for Cauldron {
    fn default() -> Self {
        Self {
            schema_version: Some(SCHEMA_VERSION.to_string()),
            native_apps: Vec::new(),
            config: None,
        }
    }
}

/// A native application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeApp {
    /// Application name.
    pub name: String,
    /// Platforms, sorted by name.
    #[serde(default)]
    pub platforms: Vec<Platform>,
    /// Legacy inline configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// One platform of a native application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Platform {
    /// Platform name.
    pub name: NativePlatform,
    /// Versions, in version order.
    #[serde(default)]
    pub versions: Vec<Version>,
    /// Highest container version among the platform's versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_version: Option<String>,
    /// Legacy inline configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// One version of a native application platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Version name. Not necessarily semver.
    pub name: String,
    /// Released versions are immutable.
    #[serde(default)]
    pub is_released: bool,
    /// Version of the generated container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_version: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Container contents.
    #[serde(default)]
    pub container: Container,
    /// Code push history per deployment name, oldest first.
    #[serde(default)]
    pub code_push: BTreeMap<String, Vec<CodePushEntry>>,
    /// Yarn lock blob ids per logical key.
    #[serde(default)]
    pub yarn_locks: BTreeMap<String, String>,
    /// Legacy inline configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl NativeApp {
    /// Creates an application without platforms.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platforms: Vec::new(),
            config: None,
        }
    }

    /// Returns the platform with the given name.
    #[must_use]
    pub fn platform(&self, platform: NativePlatform) -> Option<&Platform> {
        self.platforms.iter().find(|p| p.name == platform)
    }

    /// Inserts `platform`, keeping platforms sorted.
    pub fn insert_platform(&mut self, platform: Platform) {
        self.platforms.push(platform);
        self.platforms.sort_by_key(|p| p.name);
    }
}

impl Platform {
    /// Creates a platform without versions.
    #[must_use]
    pub fn new(name: NativePlatform) -> Self {
        Self {
            name,
            versions: Vec::new(),
            container_version: None,
            config: None,
        }
    }

    /// Returns the version with the given name.
    #[must_use]
    pub fn version(&self, name: &str) -> Option<&Version> {
        self.versions.iter().find(|v| v.name == name)
    }

    /// Inserts `version`, keeping versions in version order.
    pub fn insert_version(&mut self, version: Version) {
        self.versions.push(version);
        self.versions
            .sort_by(|a, b| compare_version_names(&a.name, &b.name));
    }
}

impl Version {
    /// Creates an unreleased version with an empty container.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_released: false,
            container_version: None,
            description: None,
            container: Container::default(),
            code_push: BTreeMap::new(),
            yarn_locks: BTreeMap::new(),
            config: None,
        }
    }
}

impl Cauldron {
    /// Returns the schema version, `0.0.0` when the document has none.
    #[must_use]
    pub fn schema_version(&self) -> &str {
        self.schema_version.as_deref().unwrap_or(UNVERSIONED_SCHEMA)
    }

    /// Returns the native application with the given name.
    #[must_use]
    pub fn app(&self, descriptor: &AppNameDescriptor) -> Option<&NativeApp> {
        self.native_apps.iter().find(|a| a.name == descriptor.name())
    }

    /// Mutable variant of [`Cauldron::app`].
    pub fn app_mut(&mut self, descriptor: &AppNameDescriptor) -> Option<&mut NativeApp> {
        self.native_apps
            .iter_mut()
            .find(|a| a.name == descriptor.name())
    }

    /// Returns the platform named by `descriptor`.
    #[must_use]
    pub fn platform(&self, descriptor: &AppPlatformDescriptor) -> Option<&Platform> {
        self.app(&descriptor.to_name())?
            .platform(descriptor.platform())
    }

    /// Mutable variant of [`Cauldron::platform`].
    pub fn platform_mut(&mut self, descriptor: &AppPlatformDescriptor) -> Option<&mut Platform> {
        self.app_mut(&descriptor.to_name())?
            .platforms
            .iter_mut()
            .find(|p| p.name == descriptor.platform())
    }

    /// Returns the version named by `descriptor`.
    #[must_use]
    pub fn version(&self, descriptor: &AppVersionDescriptor) -> Option<&Version> {
        self.platform(&descriptor.to_platform())?
            .version(descriptor.version())
    }

    /// Mutable variant of [`Cauldron::version`].
    pub fn version_mut(&mut self, descriptor: &AppVersionDescriptor) -> Option<&mut Version> {
        self.platform_mut(&descriptor.to_platform())?
            .versions
            .iter_mut()
            .find(|v| v.name == descriptor.version())
    }

    /// Inserts `app`, keeping applications sorted.
    pub fn insert_app(&mut self, app: NativeApp) {
        self.native_apps.push(app);
        self.native_apps.sort_by(|a, b| a.name.cmp(&b.name));
    }

    /// Restores the ordering invariants and checks uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidDocument`] on a duplicate name at any
    /// level, or a duplicate base path inside a container array.
    pub fn check_invariants(&mut self) -> CauldronResult<()> {
        self.native_apps.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(name) = first_duplicate(self.native_apps.iter().map(|a| a.name.as_str())) {
            return Err(CauldronError::invalid_document(format!(
                "native application {name} appears more than once"
            )));
        }
        for app in &mut self.native_apps {
            app.platforms.sort_by_key(|p| p.name);
            if let Some(name) = first_duplicate(app.platforms.iter().map(|p| p.name.as_str())) {
                return Err(CauldronError::invalid_document(format!(
                    "platform {name} appears more than once in {}",
                    app.name
                )));
            }
            for platform in &mut app.platforms {
                platform
                    .versions
                    .sort_by(|a, b| compare_version_names(&a.name, &b.name));
                if let Some(name) = first_duplicate(platform.versions.iter().map(|v| v.name.as_str())) {
                    return Err(CauldronError::invalid_document(format!(
                        "version {name} appears more than once in {}:{}",
                        app.name, platform.name
                    )));
                }
                for version in &platform.versions {
                    if let Some((key, base)) = version.container.duplicate_base_path() {
                        return Err(CauldronError::invalid_document(format!(
                            "{base} appears more than once in {key} of {}:{}:{}",
                            app.name, platform.name, version.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Returns the first repeated item of a sorted sequence.
fn first_duplicate<'a>(mut names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut previous = names.next()?;
    for name in names {
        if name == previous {
            return Some(name);
        }
        previous = name;
    }
    None
}
