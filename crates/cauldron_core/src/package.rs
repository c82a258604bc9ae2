//! Package paths stored in containers.
//!
//! A package token is one of:
//!
//! - a registry package, `name@version` (scoped names such as
//!   `@scope/name@1.0.0` are supported)
//! - a git repository, `https://host/repo.git[#ref]` or
//!   `git+ssh://host/repo.git[#ref]`
//! - a local directory, `file:/path`, `/path` or a Windows drive path
//!
//! Containers identify packages by [`PackagePath::base_path`], so one
//! package cannot appear twice at different versions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static GIT_SSH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git\+ssh://.+\.git$").expect("valid regex"));
static GIT_SSH_WITH_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(git\+ssh://.+\.git)#(.+)$").expect("valid regex"));
static GIT_HTTPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://.+\.git$").expect("valid regex"));
static GIT_HTTPS_WITH_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https://.+\.git)#(.+)$").expect("valid regex"));
static REGISTRY_WITH_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)@(.+)$").expect("valid regex"));
static FILE_WITH_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^file:(.+)").expect("valid regex"));
static FILE_ABSOLUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(/.+)").expect("valid regex"));
static FILE_WINDOWS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]:\\[\\\S|*\S]?.*$").expect("valid regex"));

/// Where a package is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    /// An npm-style registry package.
    Registry,
    /// A git repository, optionally at a branch, tag or commit.
    Git,
    /// A directory on the local file system.
    File,
}

/// A parsed package token.
///
/// Parsing never fails: anything that is neither a git nor a file path is
/// treated as a registry package name, with a version if it contains `@`
/// after its first character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackagePath {
    full: String,
    base_path: String,
    version: Option<String>,
    kind: PackageKind,
}

impl PackagePath {
    /// Parses a package token.
    pub fn new(path: impl Into<String>) -> Self {
        let full = path.into();
        let (base_path, version) = split(&full);
        let kind = if is_git(&full) {
            PackageKind::Git
        } else if is_file(&full) {
            PackageKind::File
        } else {
            PackageKind::Registry
        };
        Self {
            full,
            base_path,
            version,
            kind,
        }
    }

    /// Returns the token exactly as given.
    #[must_use]
    pub fn full_path(&self) -> &str {
        &self.full
    }

    /// Returns the package identity without its version.
    ///
    /// For registry packages this is the package name, for git packages the
    /// repository URL, for file packages the path without `file:`.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Returns the version, branch, tag or commit, if present.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns the package kind.
    #[must_use]
    pub const fn kind(&self) -> PackageKind {
        self.kind
    }

    /// Returns true for git packages.
    #[must_use]
    pub fn is_git_path(&self) -> bool {
        self.kind == PackageKind::Git
    }

    /// Returns true for local file packages.
    #[must_use]
    pub fn is_file_path(&self) -> bool {
        self.kind == PackageKind::File
    }

    /// Returns true for registry packages.
    #[must_use]
    pub fn is_registry_path(&self) -> bool {
        self.kind == PackageKind::Registry
    }

    /// Compares two paths by base path, and by version unless
    /// `ignore_version` is set.
    #[must_use]
    pub fn same(&self, other: &PackagePath, ignore_version: bool) -> bool {
        self.base_path == other.base_path && (ignore_version || self.version == other.version)
    }

    /// Returns the same package at another version.
    ///
    /// Git packages use `base#version`, everything else `base@version`.
    #[must_use]
    pub fn with_version(&self, version: &str) -> PackagePath {
        match self.kind {
            PackageKind::Git => PackagePath::new(format!("{}#{version}", self.base_path)),
            _ => PackagePath::new(format!("{}@{version}", self.base_path)),
        }
    }
}

fn split(path: &str) -> (String, Option<String>) {
    if GIT_SSH.is_match(path) || GIT_HTTPS.is_match(path) {
        return (path.to_string(), None);
    }
    for re in [&*GIT_SSH_WITH_REF, &*GIT_HTTPS_WITH_REF, &*REGISTRY_WITH_VERSION] {
        if let Some(caps) = re.captures(path) {
            return (caps[1].to_string(), Some(caps[2].to_string()));
        }
    }
    for re in [&*FILE_WITH_PREFIX, &*FILE_ABSOLUTE] {
        if let Some(caps) = re.captures(path) {
            return (caps[1].to_string(), None);
        }
    }
    (path.to_string(), None)
}

fn is_git(path: &str) -> bool {
    [&*GIT_SSH, &*GIT_SSH_WITH_REF, &*GIT_HTTPS, &*GIT_HTTPS_WITH_REF]
        .iter()
        .any(|re| re.is_match(path))
}

fn is_file(path: &str) -> bool {
    [&*FILE_WITH_PREFIX, &*FILE_ABSOLUTE, &*FILE_WINDOWS]
        .iter()
        .any(|re| re.is_match(path))
}

impl fmt::Display for PackagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl From<String> for PackagePath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&str> for PackagePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<PackagePath> for String {
    fn from(path: PackagePath) -> Self {
        path.full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_paths() {
        let p = PackagePath::new("react-native-maps@0.19.0");
        assert_eq!(p.base_path(), "react-native-maps");
        assert_eq!(p.version(), Some("0.19.0"));
        assert!(p.is_registry_path());

        let scoped = PackagePath::new("@walmart/react-native-electrode-bridge@1.5.0");
        assert_eq!(scoped.base_path(), "@walmart/react-native-electrode-bridge");
        assert_eq!(scoped.version(), Some("1.5.0"));

        let unversioned = PackagePath::new("@scope/thing");
        assert_eq!(unversioned.base_path(), "@scope/thing");
        assert_eq!(unversioned.version(), None);
    }

    #[test]
    fn git_paths() {
        let p = PackagePath::new("https://github.com/acme/movies.git#develop");
        assert!(p.is_git_path());
        assert_eq!(p.base_path(), "https://github.com/acme/movies.git");
        assert_eq!(p.version(), Some("develop"));

        let ssh = PackagePath::new("git+ssh://git@github.com/acme/movies.git");
        assert!(ssh.is_git_path());
        assert_eq!(ssh.base_path(), ssh.full_path());
        assert_eq!(ssh.version(), None);
    }

    #[test]
    fn file_paths() {
        let prefixed = PackagePath::new("file:/Users/dev/movies");
        assert!(prefixed.is_file_path());
        assert_eq!(prefixed.base_path(), "/Users/dev/movies");
        assert_eq!(prefixed.version(), None);

        assert!(PackagePath::new("/opt/movies").is_file_path());
        assert!(PackagePath::new(r"C:\dev\movies").is_file_path());
    }

    #[test]
    fn same_with_and_without_version() {
        let a = PackagePath::new("foo@1.0.0");
        let b = PackagePath::new("foo@2.0.0");
        assert!(a.same(&b, true));
        assert!(!a.same(&b, false));
        assert!(a.same(&PackagePath::new("foo@1.0.0"), false));
    }

    #[test]
    fn with_version_keeps_kind() {
        assert_eq!(
            PackagePath::new("foo@1.0.0").with_version("2.0.0").full_path(),
            "foo@2.0.0"
        );
        assert_eq!(
            PackagePath::new("https://github.com/a/b.git#master")
                .with_version("abc")
                .full_path(),
            "https://github.com/a/b.git#abc"
        );
    }

    #[test]
    fn serializes_as_string() {
        let p = PackagePath::new("foo@1.0.0");
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"foo@1.0.0\"");
        let back: PackagePath = serde_json::from_str("\"foo@1.0.0\"").unwrap();
        assert_eq!(back, p);
    }
}
