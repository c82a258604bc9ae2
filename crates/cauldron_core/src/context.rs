//! The cauldron a command invocation works on.
//!
//! A command opens one [`ActiveCauldron`] and passes it to whatever needs
//! the store or the release rules. Known repositories and the one in use
//! are recorded in a [`CauldronRepositories`] registry.

use crate::cauldron::CauldronStore;
use crate::config::{CauldronConfig, RepositoryUrl};
use crate::error::{CauldronError, CauldronResult};
use crate::model::SCHEMA_VERSION;
use crate::release::ReleaseManager;
use crate::version::parse_semver;
use cauldron_vcs::{GitBackend, RefResolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Checks that a document schema version is the one this library reads.
///
/// # Errors
///
/// Returns [`CauldronError::SchemaVersionMismatch`]. For a newer document
/// the hint asks for a newer platform version, for an older one it asks
/// for an upgrade.
pub fn check_schema_version(found: &str) -> CauldronResult<()> {
    if found == SCHEMA_VERSION {
        return Ok(());
    }
    let newer = match (parse_semver(found), parse_semver(SCHEMA_VERSION)) {
        (Some(found), Some(expected)) => found > expected,
        _ => false,
    };
    let hint = if newer {
        "You should switch to a newer platform version that supports this Cauldron schema."
    } else {
        "You should run 'ern cauldron upgrade' to upgrade your Cauldron to the latest schema version."
    };
    Err(CauldronError::SchemaVersionMismatch {
        found: found.to_string(),
        expected: SCHEMA_VERSION.to_string(),
        hint: hint.to_string(),
    })
}

/// A store and its release rules, opened for one command invocation.
///
/// # Example
///
/// ```rust
/// use cauldron_core::{ActiveCauldron, CauldronConfig};
/// use cauldron_vcs::{InMemoryGit, StaticRefResolver};
/// use std::sync::Arc;
///
/// let dir = tempfile::tempdir().unwrap();
/// let cauldron = ActiveCauldron::open(
///     &CauldronConfig::new(dir.path()),
///     Arc::new(InMemoryGit::new(dir.path())),
///     Arc::new(StaticRefResolver::new()),
/// )
/// .unwrap();
/// assert!(cauldron.store().get_native_applications().unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct ActiveCauldron {
    store: Arc<CauldronStore>,
    manager: ReleaseManager,
}

impl ActiveCauldron {
    /// Opens the cauldron described by `config`.
    ///
    /// The working copy is synchronized with its remote, then the schema
    /// version of the document is checked unless
    /// `config.ignore_schema_version_mismatch` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::SchemaVersionMismatch`] if the document
    /// uses another schema version, or [`CauldronError::Sync`] if the
    /// working copy cannot be synchronized.
    pub fn open(
        config: &CauldronConfig,
        backend: Arc<dyn GitBackend>,
        resolver: Arc<dyn RefResolver>,
    ) -> CauldronResult<Self> {
        let cauldron = Self::open_for_upgrade(config, backend, resolver)?;
        let found = cauldron.store.schema_version()?;
        if config.ignore_schema_version_mismatch {
            if found != SCHEMA_VERSION {
                warn!(%found, expected = SCHEMA_VERSION, "Ignoring Cauldron schema version mismatch");
            }
        } else {
            check_schema_version(&found)?;
        }
        Ok(cauldron)
    }

    /// Opens the cauldron without checking its schema version, so that it
    /// can be upgraded.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Sync`] if the working copy cannot be
    /// synchronized.
    pub fn open_for_upgrade(
        config: &CauldronConfig,
        backend: Arc<dyn GitBackend>,
        resolver: Arc<dyn RefResolver>,
    ) -> CauldronResult<Self> {
        let store = Arc::new(CauldronStore::open(backend, config));
        store.working_copy().sync()?;
        info!(
            path = %config.path.display(),
            repository = config.repository.as_deref().unwrap_or("<local>"),
            branch = %config.branch,
            "Opened Cauldron"
        );
        let manager = ReleaseManager::new(Arc::clone(&store), resolver);
        Ok(Self { store, manager })
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &CauldronStore {
        &self.store
    }

    /// Returns the release rules.
    #[must_use]
    pub fn manager(&self) -> &ReleaseManager {
        &self.manager
    }

    /// Returns the shared store handle and the release rules.
    #[must_use]
    pub fn into_parts(self) -> (Arc<CauldronStore>, ReleaseManager) {
        (self.store, self.manager)
    }
}

/// Registry of known cauldron repositories, by alias.
///
/// At most one alias is current. Stored as JSON:
///
/// ```json
/// { "repositories": { "prod": "git@github.com:acme/cauldron.git" }, "current": "prod" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CauldronRepositories {
    #[serde(default)]
    repositories: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current: Option<String>,
}

impl CauldronRepositories {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a registry, empty if `path` does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> CauldronResult<Self> {
        match fs::read(path.as_ref()) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the registry to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> CauldronResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Registers `url` under `alias`, making it current if `activate` is
    /// set.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::AlreadyExists`] if `alias` is taken, or
    /// [`CauldronError::InvalidOperation`] if `url` is not acceptable.
    pub fn add(&mut self, alias: &str, url: &str, activate: bool) -> CauldronResult<()> {
        if self.repositories.contains_key(alias) {
            return Err(CauldronError::already_exists(format!("{alias} alias")));
        }
        let url = RepositoryUrl::parse(url)?;
        self.repositories
            .insert(alias.to_string(), url.as_str().to_string());
        if activate {
            self.current = Some(alias.to_string());
        }
        Ok(())
    }

    /// Unregisters `alias`. Removing the current alias leaves no alias
    /// current.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if `alias` is unknown.
    pub fn remove(&mut self, alias: &str) -> CauldronResult<()> {
        if self.repositories.remove(alias).is_none() {
            return Err(CauldronError::not_found(format!("{alias} alias")));
        }
        if self.current.as_deref() == Some(alias) {
            self.current = None;
        }
        Ok(())
    }

    /// Makes `alias` current.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if `alias` is unknown.
    pub fn activate(&mut self, alias: &str) -> CauldronResult<()> {
        if !self.repositories.contains_key(alias) {
            return Err(CauldronError::not_found(format!("{alias} alias")));
        }
        self.current = Some(alias.to_string());
        Ok(())
    }

    /// Leaves no alias current.
    pub fn deactivate(&mut self) {
        self.current = None;
    }

    /// Returns the current alias and its URL.
    #[must_use]
    pub fn current(&self) -> Option<(&str, &str)> {
        let alias = self.current.as_deref()?;
        self.repositories
            .get(alias)
            .map(|url| (alias, url.as_str()))
    }

    /// Returns the URL registered under `alias`.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.repositories.get(alias).map(String::as_str)
    }

    /// Returns every alias and its URL, sorted by alias.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.repositories
            .iter()
            .map(|(alias, url)| (alias.as_str(), url.as_str()))
    }

    /// Returns the configuration of the current repository, with its
    /// working copy at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidOperation`] if no alias is current.
    pub fn current_config(&self, path: impl Into<PathBuf>) -> CauldronResult<CauldronConfig> {
        let (_, url) = self
            .current()
            .ok_or_else(|| CauldronError::invalid_operation("no Cauldron repository is in use"))?;
        Ok(CauldronConfig::from_repository(path, url))
    }
}
