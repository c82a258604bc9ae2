//! Cauldron schema upgrades.
//!
//! Every document records the schema version it was written with. An
//! upgrade step moves a document from one schema version to the next
//! through the public [`CauldronStore`] API, so steps never touch files
//! directly.
//!
//! ## Design Philosophy
//!
//! Upgrades are:
//! - **Ordered**: steps run in registration order, starting from the one
//!   whose source version matches the document, through the last one
//! - **Forward-only**: there is no downgrade
//! - **Explicit**: nothing upgrades a document implicitly on open
//!
//! ## Usage
//!
//! ```rust
//! use cauldron_core::{CauldronConfig, CauldronStore, UpgradeRegistry};
//! use cauldron_vcs::InMemoryGit;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = CauldronStore::open(
//!     Arc::new(InMemoryGit::new(dir.path())),
//!     &CauldronConfig::new(dir.path()),
//! );
//! // A fresh Cauldron already uses the latest schema.
//! assert!(store.upgrade_cauldron_schema(&UpgradeRegistry::default()).is_err());
//! ```

use crate::cauldron::CauldronStore;
use crate::descriptor::{AppNameDescriptor, AppPlatformDescriptor, AppVersionDescriptor, Descriptor};
use crate::error::{CauldronError, CauldronResult};
use crate::model::SCHEMA_VERSION;
use serde_json::Value;
use tracing::{error, info};

/// Information about an upgrade step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeInfo {
    /// Schema version the step upgrades from.
    pub from: String,
    /// Schema version the step upgrades to.
    pub to: String,
    /// Human-readable name.
    pub name: String,
}

/// Result of a schema upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Schema version before the upgrade.
    pub from: String,
    /// Schema version after the last applied step.
    pub to: String,
    /// Applied steps, in order.
    pub applied: Vec<UpgradeInfo>,
}

/// One step of the upgrade chain.
///
/// # Invariants
///
/// - `apply` leaves the document satisfying every model invariant
/// - `apply` sets the document schema version to `to_version`
pub trait SchemaUpgrade: Send + Sync {
    /// Returns the schema version this step applies to.
    fn from_version(&self) -> &str;

    /// Returns the schema version this step produces.
    fn to_version(&self) -> &str;

    /// Returns the name of this step.
    fn name(&self) -> String {
        format!("{} -> {}", self.from_version(), self.to_version())
    }

    /// Upgrades the document held by `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or written.
    fn apply(&self, store: &CauldronStore) -> CauldronResult<()>;
}

/// Ordered collection of upgrade steps.
pub struct UpgradeRegistry {
    target: String,
    upgrades: Vec<Box<dyn SchemaUpgrade>>,
}

impl UpgradeRegistry {
    /// Creates a registry without steps targeting `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            upgrades: Vec::new(),
        }
    }

    /// Appends a step.
    ///
    /// Returns an error if a step with the same source version is already
    /// registered.
    pub fn register(&mut self, upgrade: Box<dyn SchemaUpgrade>) -> CauldronResult<()> {
        if self
            .upgrades
            .iter()
            .any(|u| u.from_version() == upgrade.from_version())
        {
            return Err(CauldronError::upgrade(format!(
                "an upgrade from {} is already registered",
                upgrade.from_version()
            )));
        }
        self.upgrades.push(upgrade);
        Ok(())
    }

    /// Returns the schema version the registry upgrades to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the registered steps.
    #[must_use]
    pub fn list(&self) -> Vec<UpgradeInfo> {
        self.upgrades.iter().map(|u| info_of(u.as_ref())).collect()
    }

    /// Returns the steps that would run for a document at `version`.
    #[must_use]
    pub fn pending(&self, version: &str) -> Vec<UpgradeInfo> {
        self.upgrades
            .iter()
            .skip_while(|u| u.from_version() != version)
            .map(|u| info_of(u.as_ref()))
            .collect()
    }

    /// Upgrades the document held by `store`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Upgrade`] if the document already uses the
    /// target version or no step starts at its version, or the error of
    /// the first failing step.
    pub fn upgrade(&self, store: &CauldronStore) -> CauldronResult<UpgradeReport> {
        let from = store.schema_version()?;
        if from == self.target {
            return Err(CauldronError::upgrade(format!(
                "The Cauldron is already using the proper schema version {from}"
            )));
        }
        let start = self
            .upgrades
            .iter()
            .position(|u| u.from_version() == from)
            .ok_or_else(|| {
                CauldronError::upgrade(format!("no upgrade available from schema version {from}"))
            })?;

        let mut report = UpgradeReport {
            from: from.clone(),
            to: from,
            applied: Vec::new(),
        };
        for upgrade in &self.upgrades[start..] {
            info!(from = upgrade.from_version(), to = upgrade.to_version(), "upgrading Cauldron schema");
            if let Err(e) = upgrade.apply(store) {
                error!(step = %upgrade.name(), error = %e, "Cauldron schema upgrade failed");
                return Err(e);
            }
            report.to = upgrade.to_version().to_string();
            report.applied.push(info_of(upgrade.as_ref()));
        }
        Ok(report)
    }
}

impl Default for UpgradeRegistry {
    /// Returns the registry of every built-in step.
    fn default() -> Self {
        Self {
            target: SCHEMA_VERSION.to_string(),
            upgrades: vec![Box::new(V2ToV3)],
        }
    }
}

impl std::fmt::Debug for UpgradeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeRegistry")
            .field("target", &self.target)
            .field("upgrades", &self.list())
            .finish()
    }
}

fn info_of(upgrade: &dyn SchemaUpgrade) -> UpgradeInfo {
    UpgradeInfo {
        from: upgrade.from_version().to_string(),
        to: upgrade.to_version().to_string(),
        name: upgrade.name(),
    }
}

/// Moves inline configuration to config files.
///
/// Schema 2 kept configuration inline at every level of the tree, and the
/// top-level container version inside the platform's container generator
/// configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct V2ToV3;

fn take_container_version(config: &mut Value) -> Option<Value> {
    config
        .get_mut("containerGenerator")
        .and_then(Value::as_object_mut)
        .and_then(|generator| generator.remove("containerVersion"))
}

impl V2ToV3 {
    fn migrate(store: &CauldronStore) -> CauldronResult<()> {
        let cauldron = store.get_cauldron()?;
        let mut moved: Vec<(Option<Descriptor>, Value)> = Vec::new();
        let mut lifted: Vec<(AppPlatformDescriptor, String)> = Vec::new();

        for app in &cauldron.native_apps {
            for platform in &app.platforms {
                for version in &platform.versions {
                    if let Some(mut config) = version.config.clone() {
                        take_container_version(&mut config);
                        let d = AppVersionDescriptor::new(&app.name, platform.name, &version.name);
                        moved.push((Some(d.into()), config));
                    }
                }
                if let Some(mut config) = platform.config.clone() {
                    let d = AppPlatformDescriptor::new(&app.name, platform.name);
                    if let Some(Value::String(v)) = take_container_version(&mut config) {
                        lifted.push((d.clone(), v));
                    }
                    moved.push((Some(d.into()), config));
                }
            }
            if let Some(mut config) = app.config.clone() {
                take_container_version(&mut config);
                moved.push((Some(AppNameDescriptor::new(&app.name).into()), config));
            }
        }
        if let Some(config) = cauldron.config.clone() {
            moved.push((None, config));
        }

        for (descriptor, config) in &moved {
            store.set_config(descriptor.as_ref(), config)?;
        }
        store.update_cauldron("Upgrade Cauldron schema to 3.0.0", |doc| {
            for app in &mut doc.native_apps {
                app.config = None;
                for platform in &mut app.platforms {
                    platform.config = None;
                    for version in &mut platform.versions {
                        version.config = None;
                    }
                }
            }
            for (descriptor, container_version) in lifted {
                if let Some(platform) = doc.platform_mut(&descriptor) {
                    platform.container_version = Some(container_version);
                }
            }
            doc.config = None;
            doc.schema_version = Some("3.0.0".to_string());
            Ok(())
        })
    }
}

impl SchemaUpgrade for V2ToV3 {
    fn from_version(&self) -> &str {
        "2.0.0"
    }

    fn to_version(&self) -> &str {
        "3.0.0"
    }

    fn apply(&self, store: &CauldronStore) -> CauldronResult<()> {
        store.begin_transaction()?;
        match Self::migrate(store) {
            Ok(()) => store.commit_transaction("Upgrade Cauldron schema from 2.0.0 to 3.0.0"),
            Err(e) => {
                store.discard_transaction()?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CauldronConfig;
    use crate::descriptor::NativePlatform;
    use cauldron_vcs::InMemoryGit;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn store_with(document: &Value) -> (TempDir, Arc<InMemoryGit>, CauldronStore) {
        let dir = tempdir().unwrap();
        let git = Arc::new(InMemoryGit::new(dir.path()));
        let store = CauldronStore::open(git.clone(), &CauldronConfig::new(dir.path()));
        store.working_copy().sync().unwrap();
        std::fs::write(
            dir.path().join("cauldron.json"),
            serde_json::to_vec_pretty(document).unwrap(),
        )
        .unwrap();
        (dir, git, store)
    }

    fn v2_document() -> Value {
        json!({
            "schemaVersion": "2.0.0",
            "config": {"codePush": {"entriesLimit": 5}},
            "nativeApps": [{
                "name": "myapp",
                "config": {"containerGenerator": {"containerVersion": "9.9.9", "publishers": []}},
                "platforms": [{
                    "name": "android",
                    "config": {"containerGenerator": {"containerVersion": "1.2.3"}},
                    "versions": [{
                        "name": "1.0.0",
                        "isReleased": true,
                        "config": {"containerGenerator": {"containerVersion": "1.0.0"}, "x": 1},
                        "container": {"miniApps": [], "nativeDeps": [], "jsApiImpls": []},
                        "codePush": {},
                        "yarnLocks": {}
                    }]
                }]
            }]
        })
    }

    #[test]
    fn upgrades_v2_document() {
        let (_dir, git, store) = store_with(&v2_document());
        let commits = git.commit_count();
        let report = store
            .upgrade_cauldron_schema(&UpgradeRegistry::default())
            .unwrap();

        assert_eq!(report.from, "2.0.0");
        assert_eq!(report.to, "3.0.0");
        assert_eq!(git.commit_count(), commits + 1);
        assert_eq!(
            git.commit_log().last().unwrap().summary(),
            "Upgrade Cauldron schema from 2.0.0 to 3.0.0"
        );

        let cauldron = store.get_cauldron().unwrap();
        assert_eq!(cauldron.schema_version(), "3.0.0");
        assert!(cauldron.config.is_none());
        let platform = AppPlatformDescriptor::new("myapp", NativePlatform::Android);
        assert_eq!(
            store.get_top_level_container_version(&platform).unwrap().as_deref(),
            Some("1.2.3")
        );

        let version = Descriptor::from(platform.with_version("1.0.0"));
        assert_eq!(
            store.get_config_strict(Some(&version)).unwrap(),
            Some(json!({"containerGenerator": {}, "x": 1}))
        );
        assert_eq!(
            store
                .get_config_strict(Some(&Descriptor::parse("myapp").unwrap()))
                .unwrap(),
            Some(json!({"containerGenerator": {"publishers": []}}))
        );
        assert_eq!(
            store.get_config_strict(None).unwrap(),
            Some(json!({"codePush": {"entriesLimit": 5}}))
        );
        assert!(store
            .get_version(&platform.with_version("1.0.0"))
            .unwrap()
            .config
            .is_none());
    }

    #[test]
    fn current_schema_cannot_be_upgraded() {
        let (_dir, _git, store) = store_with(&json!({"schemaVersion": "3.0.0", "nativeApps": []}));
        let err = store
            .upgrade_cauldron_schema(&UpgradeRegistry::default())
            .unwrap_err();
        assert!(err.to_string().contains("already using the proper schema version 3.0.0"));
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let (_dir, _git, store) = store_with(&json!({"schemaVersion": "1.0.0", "nativeApps": []}));
        assert!(matches!(
            store.upgrade_cauldron_schema(&UpgradeRegistry::default()),
            Err(CauldronError::Upgrade { .. })
        ));
    }

    struct Recording {
        from: &'static str,
        to: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl SchemaUpgrade for Recording {
        fn from_version(&self) -> &str {
            self.from
        }

        fn to_version(&self) -> &str {
            self.to
        }

        fn apply(&self, store: &CauldronStore) -> CauldronResult<()> {
            self.calls.lock().push(self.from);
            let to = self.to.to_string();
            store.update_cauldron(format!("to {to}"), |doc| {
                doc.schema_version = Some(to);
                Ok(())
            })
        }
    }

    #[test]
    fn runs_from_matching_step_to_the_end() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = UpgradeRegistry::new("3.0.0");
        for (from, to) in [("0.0.0", "1.0.0"), ("1.0.0", "2.0.0"), ("2.0.0", "3.0.0")] {
            registry
                .register(Box::new(Recording {
                    from,
                    to,
                    calls: calls.clone(),
                }))
                .unwrap();
        }
        assert_eq!(registry.pending("1.0.0").len(), 2);

        let (_dir, _git, store) = store_with(&json!({"schemaVersion": "1.0.0", "nativeApps": []}));
        let report = registry.upgrade(&store).unwrap();
        assert_eq!(*calls.lock(), vec!["1.0.0", "2.0.0"]);
        assert_eq!(report.applied.len(), 2);
        assert_eq!(store.schema_version().unwrap(), "3.0.0");
    }

    #[test]
    fn duplicate_source_versions_are_rejected() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = UpgradeRegistry::new("2.0.0");
        let step = || {
            Box::new(Recording {
                from: "1.0.0",
                to: "2.0.0",
                calls: calls.clone(),
            })
        };
        registry.register(step()).unwrap();
        assert!(registry.register(step()).is_err());
    }
}
