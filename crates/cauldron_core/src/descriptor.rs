//! Descriptors: paths into the Cauldron tree.
//!
//! A descriptor names a native application, one of its platforms, or one
//! version of a platform. The string form is `name[:platform[:version]]`.
//!
//! Operations that only make sense on a full version take an
//! [`AppVersionDescriptor`], so a partial descriptor cannot reach them.

use crate::error::{CauldronError, CauldronResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Native platforms a Cauldron can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativePlatform {
    /// Android.
    Android,
    /// iOS.
    Ios,
}

impl NativePlatform {
    /// All supported platforms, in sort order.
    pub const ALL: [NativePlatform; 2] = [NativePlatform::Android, NativePlatform::Ios];

    /// Returns the lowercase platform name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
        }
    }
}

impl fmt::Display for NativePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NativePlatform {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            other => Err(CauldronError::invalid_descriptor(
                other,
                "platform must be one of android, ios",
            )),
        }
    }
}

/// Identifies a native application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppNameDescriptor {
    name: String,
}

/// Identifies one platform of a native application.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppPlatformDescriptor {
    name: String,
    platform: NativePlatform,
}

/// Identifies one version of a native application platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppVersionDescriptor {
    name: String,
    platform: NativePlatform,
    version: String,
}

impl AppNameDescriptor {
    /// Creates a descriptor for the application `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Widens to a platform of this application.
    #[must_use]
    pub fn with_platform(&self, platform: NativePlatform) -> AppPlatformDescriptor {
        AppPlatformDescriptor::new(self.name.clone(), platform)
    }
}

impl AppPlatformDescriptor {
    /// Creates a descriptor for `platform` of application `name`.
    pub fn new(name: impl Into<String>, platform: NativePlatform) -> Self {
        Self {
            name: name.into(),
            platform,
        }
    }

    /// Returns the application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the platform.
    #[must_use]
    pub const fn platform(&self) -> NativePlatform {
        self.platform
    }

    /// Narrows to the application.
    #[must_use]
    pub fn to_name(&self) -> AppNameDescriptor {
        AppNameDescriptor::new(self.name.clone())
    }

    /// Widens to a version of this platform.
    #[must_use]
    pub fn with_version(&self, version: impl Into<String>) -> AppVersionDescriptor {
        AppVersionDescriptor::new(self.name.clone(), self.platform, version)
    }
}

impl AppVersionDescriptor {
    /// Creates a descriptor for `version` of `platform` of application `name`.
    pub fn new(name: impl Into<String>, platform: NativePlatform, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform,
            version: version.into(),
        }
    }

    /// Returns the application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the platform.
    #[must_use]
    pub const fn platform(&self) -> NativePlatform {
        self.platform
    }

    /// Returns the version name.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Narrows to the platform.
    #[must_use]
    pub fn to_platform(&self) -> AppPlatformDescriptor {
        AppPlatformDescriptor::new(self.name.clone(), self.platform)
    }

    /// Narrows to the application.
    #[must_use]
    pub fn to_name(&self) -> AppNameDescriptor {
        AppNameDescriptor::new(self.name.clone())
    }
}

impl fmt::Display for AppNameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for AppPlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.platform)
    }
}

impl fmt::Display for AppVersionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.platform, self.version)
    }
}

/// A descriptor at any depth of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// A native application.
    App(AppNameDescriptor),
    /// A platform of a native application.
    Platform(AppPlatformDescriptor),
    /// A version of a platform.
    Version(AppVersionDescriptor),
}

impl Descriptor {
    /// Parses `name[:platform[:version]]`, picking the depth from the number
    /// of segments.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidDescriptor`] for empty segments, an
    /// unknown platform or more than three segments.
    pub fn parse(input: &str) -> CauldronResult<Self> {
        let segments: Vec<&str> = input.split(':').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(CauldronError::invalid_descriptor(input, "empty segment"));
        }
        match segments.as_slice() {
            [name] => Ok(Self::App(AppNameDescriptor::new(*name))),
            [name, platform] => Ok(Self::Platform(AppPlatformDescriptor::new(
                *name,
                platform.parse::<NativePlatform>().map_err(|_| {
                    CauldronError::invalid_descriptor(input, "platform must be one of android, ios")
                })?,
            ))),
            [name, platform, version] => Ok(Self::Version(AppVersionDescriptor::new(
                *name,
                platform.parse::<NativePlatform>().map_err(|_| {
                    CauldronError::invalid_descriptor(input, "platform must be one of android, ios")
                })?,
                *version,
            ))),
            _ => Err(CauldronError::invalid_descriptor(
                input,
                "expected name[:platform[:version]]",
            )),
        }
    }

    /// Returns the application name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::App(d) => d.name(),
            Self::Platform(d) => d.name(),
            Self::Version(d) => d.name(),
        }
    }

    /// Returns the platform, if the descriptor has one.
    #[must_use]
    pub fn platform(&self) -> Option<NativePlatform> {
        match self {
            Self::App(_) => None,
            Self::Platform(d) => Some(d.platform()),
            Self::Version(d) => Some(d.platform()),
        }
    }

    /// Returns the version, if the descriptor has one.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Version(d) => Some(d.version()),
            _ => None,
        }
    }

    /// Returns true unless this is a full version descriptor.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !matches!(self, Self::Version(_))
    }

    /// Returns the version descriptor, or an error for partial descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidDescriptor`] for a partial descriptor.
    pub fn into_version(self) -> CauldronResult<AppVersionDescriptor> {
        match self {
            Self::Version(d) => Ok(d),
            other => Err(CauldronError::invalid_descriptor(
                other.to_string(),
                "a complete name:platform:version descriptor is required",
            )),
        }
    }

    /// Returns the application-level projection.
    #[must_use]
    pub fn to_name(&self) -> AppNameDescriptor {
        AppNameDescriptor::new(self.name())
    }

    /// Returns the platform-level projection, if the descriptor has a platform.
    #[must_use]
    pub fn to_platform(&self) -> Option<AppPlatformDescriptor> {
        self.platform()
            .map(|platform| AppPlatformDescriptor::new(self.name(), platform))
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::App(d) => fmt::Display::fmt(d, f),
            Self::Platform(d) => fmt::Display::fmt(d, f),
            Self::Version(d) => fmt::Display::fmt(d, f),
        }
    }
}

impl FromStr for Descriptor {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromStr for AppNameDescriptor {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Descriptor::parse(s)? {
            Descriptor::App(d) => Ok(d),
            _ => Err(CauldronError::invalid_descriptor(s, "expected name")),
        }
    }
}

impl FromStr for AppPlatformDescriptor {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Descriptor::parse(s)? {
            Descriptor::Platform(d) => Ok(d),
            _ => Err(CauldronError::invalid_descriptor(s, "expected name:platform")),
        }
    }
}

impl FromStr for AppVersionDescriptor {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Descriptor::parse(s)?.into_version()
    }
}

impl From<AppNameDescriptor> for Descriptor {
    fn from(d: AppNameDescriptor) -> Self {
        Self::App(d)
    }
}

impl From<AppPlatformDescriptor> for Descriptor {
    fn from(d: AppPlatformDescriptor) -> Self {
        Self::Platform(d)
    }
}

impl From<AppVersionDescriptor> for Descriptor {
    fn from(d: AppVersionDescriptor) -> Self {
        Self::Version(d)
    }
}

impl From<&AppNameDescriptor> for Descriptor {
    fn from(d: &AppNameDescriptor) -> Self {
        Self::App(d.clone())
    }
}

impl From<&AppPlatformDescriptor> for Descriptor {
    fn from(d: &AppPlatformDescriptor) -> Self {
        Self::Platform(d.clone())
    }
}

impl From<&AppVersionDescriptor> for Descriptor {
    fn from(d: &AppVersionDescriptor) -> Self {
        Self::Version(d.clone())
    }
}
