//! Test fixtures and Cauldron helpers.
//!
//! Provides convenience functions for opening a Cauldron over an
//! in-memory git backend and for populating it with common scenarios.

use cauldron_core::{ActiveCauldron, AddVersionOptions, AppVersionDescriptor, CauldronConfig, CauldronStore, ReleaseManager};
use cauldron_vcs::{InMemoryGit, InMemoryRemote, StaticRefResolver};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// URL of the remote used by [`TestCauldron::with_remote`].
pub const TEST_REMOTE_URL: &str = "https://github.com/acme/cauldron.git";

/// Git repository of the `movies` MiniApp, registered with a `develop`
/// branch in every fixture's resolver.
pub const MOVIES_REPO: &str = "https://github.com/acme/movies.git";

/// SHA the `develop` branch of [`MOVIES_REPO`] initially points at.
pub const MOVIES_DEVELOP_SHA: &str = "0a1b2c3d";

/// A Cauldron in a temporary working directory with automatic cleanup.
pub struct TestCauldron {
    /// The opened Cauldron.
    pub cauldron: ActiveCauldron,
    /// The git backend, for inspecting commits.
    pub git: Arc<InMemoryGit>,
    /// The branch resolver, for moving branches.
    pub resolver: Arc<StaticRefResolver>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TestCauldron {
    /// Opens a fresh Cauldron without a remote.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let git = Arc::new(InMemoryGit::new(temp_dir.path()));
        let config = CauldronConfig::new(temp_dir.path());
        Self::open(temp_dir, git, &config)
    }

    /// Opens a Cauldron whose working copy tracks `remote`.
    ///
    /// Several fixtures sharing one remote model several processes working
    /// on the same Cauldron repository.
    pub fn with_remote(remote: &InMemoryRemote) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let git = Arc::new(InMemoryGit::connected(temp_dir.path(), remote.clone()));
        let config = CauldronConfig::new(temp_dir.path()).repository(TEST_REMOTE_URL);
        Self::open(temp_dir, git, &config)
    }

    fn open(temp_dir: TempDir, git: Arc<InMemoryGit>, config: &CauldronConfig) -> Self {
        let resolver = Arc::new(StaticRefResolver::new().with_branch(MOVIES_REPO, "develop", MOVIES_DEVELOP_SHA));
        let cauldron =
            ActiveCauldron::open(config, git.clone(), resolver.clone()).expect("Failed to open Cauldron");
        Self {
            cauldron,
            git,
            resolver,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the working directory.
    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Returns the store.
    pub fn store(&self) -> &CauldronStore {
        self.cauldron.store()
    }

    /// Returns the release manager.
    pub fn manager(&self) -> &ReleaseManager {
        self.cauldron.manager()
    }

    /// Returns the number of local commits, including the initial one.
    pub fn commit_count(&self) -> usize {
        self.git.commit_count()
    }

    /// Returns the summary line of the latest commit.
    pub fn last_commit_summary(&self) -> Option<String> {
        self.git
            .commit_log()
            .last()
            .map(|c| c.summary().to_string())
    }

    /// Adds a native application version, creating the application and
    /// platform as needed.
    pub fn add_version(&self, descriptor: &str) -> AppVersionDescriptor {
        let descriptor: AppVersionDescriptor = descriptor.parse().expect("Invalid version descriptor");
        self.manager()
            .add_native_application_version(&descriptor, AddVersionOptions::new())
            .expect("Failed to add version");
        descriptor
    }

    /// Marks a version as released.
    pub fn release(&self, descriptor: &AppVersionDescriptor) {
        self.manager()
            .update_native_app_is_released(descriptor, true)
            .expect("Failed to release version");
    }
}

impl Default for TestCauldron {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestCauldron {
    type Target = ReleaseManager;

    fn deref(&self) -> &Self::Target {
        self.cauldron.manager()
    }
}

/// Runs a test with a temporary Cauldron.
///
/// # Example
///
/// ```rust,ignore
/// use cauldron_testkit::with_temp_cauldron;
///
/// #[test]
/// fn my_test() {
///     with_temp_cauldron(|tc| {
///         let v = tc.add_version("myapp:android:1.0.0");
///         // ... test operations
///     });
/// }
/// ```
pub fn with_temp_cauldron<F, R>(f: F) -> R
where
    F: FnOnce(&TestCauldron) -> R,
{
    let tc = TestCauldron::new();
    f(&tc)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use cauldron_core::PackagePath;

    /// Native dependencies of every version created by [`fleet`].
    pub const FLEET_NATIVE_DEPS: [&str; 2] = ["react-native@0.72.4", "react-native-maps@1.7.1"];

    /// MiniApps of every version created by [`fleet`].
    pub const FLEET_MINI_APPS: [&str; 2] = ["movielist@1.0.0", "moviedetails@2.1.0"];

    /// Creates a Cauldron holding `myapp` with two Android versions and one
    /// iOS version, each with the same container content.
    pub fn fleet() -> (TestCauldron, Vec<AppVersionDescriptor>) {
        let tc = TestCauldron::new();
        let versions: Vec<_> = ["myapp:android:1.0.0", "myapp:android:1.1.0", "myapp:ios:1.0.0"]
            .into_iter()
            .map(|d| tc.add_version(d))
            .collect();
        for v in &versions {
            populate(&tc, v);
        }
        (tc, versions)
    }

    /// Creates a Cauldron with one released version of `myapp`.
    pub fn released_version() -> (TestCauldron, AppVersionDescriptor) {
        let tc = TestCauldron::new();
        let v = tc.add_version("myapp:android:1.0.0");
        populate(&tc, &v);
        tc.release(&v);
        (tc, v)
    }

    /// Adds the fleet's native dependencies and MiniApps to `version` in
    /// one transaction.
    pub fn populate(tc: &TestCauldron, version: &AppVersionDescriptor) {
        tc.begin_transaction().expect("Failed to begin transaction");
        for dep in FLEET_NATIVE_DEPS {
            tc.add_native_dependency(version, &PackagePath::new(dep))
                .expect("Failed to add native dependency");
        }
        for app in FLEET_MINI_APPS {
            tc.add_mini_app(version, &PackagePath::new(app))
                .expect("Failed to add MiniApp");
        }
        tc.commit_transaction(format!("Populate {version}"))
            .expect("Failed to commit transaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_fixture_has_only_the_initial_commit() {
        let tc = TestCauldron::new();
        assert_eq!(tc.commit_count(), 1);
        assert!(tc.store().get_native_applications().unwrap().is_empty());
    }

    #[test]
    fn fleet_scenario_populates_every_version() {
        let (tc, versions) = scenarios::fleet();
        for v in &versions {
            assert_eq!(tc.get_native_dependencies(v).unwrap().len(), 2);
        }
        assert_eq!(
            tc.last_commit_summary().as_deref(),
            Some("Populate myapp:ios:1.0.0")
        );
    }

    #[test]
    fn with_temp_cauldron_runs_closure() {
        let count = with_temp_cauldron(|tc| {
            tc.add_version("myapp:ios:2.0.0");
            tc.store().get_native_applications().unwrap().len()
        });
        assert_eq!(count, 1);
    }
}
