//! Cauldrons sharing one remote repository.
//!
//! Each `TestCauldron::with_remote` models a separate process with its own
//! working copy. The last test drives the real git executable against a
//! bare repository and is skipped when git is not installed.

use cauldron_core::{
    ActiveCauldron, AddVersionOptions, AppNameDescriptor, AppVersionDescriptor, CauldronConfig, PackagePath,
    DOCUMENT_FILE,
};
use cauldron_testkit::prelude::*;
use cauldron_vcs::{GitCli, InMemoryRemote, StaticRefResolver};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

const BRANCH: &str = cauldron_core::DEFAULT_BRANCH;

#[test]
fn first_open_pushes_initial_commit() {
    let remote = InMemoryRemote::new();
    let _tc = TestCauldron::with_remote(&remote);

    let commits = remote.commits(BRANCH);
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].summary(), "First Commit!");
}

#[test]
fn every_commit_is_pushed() {
    let remote = InMemoryRemote::new();
    let tc = TestCauldron::with_remote(&remote);
    let pushes = remote.push_count();

    tc.add_version("myapp:android:1.0.0");

    assert!(remote.push_count() > pushes);
    assert_eq!(remote.commits(BRANCH).len(), tc.commit_count());
    assert!(remote.file(BRANCH, DOCUMENT_FILE).is_some());
}

#[test]
fn transaction_is_pushed_once() {
    let remote = InMemoryRemote::new();
    let tc = TestCauldron::with_remote(&remote);
    let v = tc.add_version("myapp:android:1.0.0");
    let pushes = remote.push_count();

    tc.begin_transaction().unwrap();
    tc.add_native_dependency(&v, &PackagePath::new("react-native@0.72.4"))
        .unwrap();
    tc.add_mini_app(&v, &PackagePath::new("movielist@1.0.0"))
        .unwrap();
    assert_eq!(remote.push_count(), pushes);
    tc.commit_transaction("Add container content").unwrap();

    assert_eq!(remote.push_count(), pushes + 1);
}

#[test]
fn second_process_sees_pushed_changes() {
    let remote = InMemoryRemote::new();
    let first = TestCauldron::with_remote(&remote);
    let v = first.add_version("myapp:ios:2.0.0");
    first.add_yarn_lock(&v, "container", b"lock").unwrap();

    let second = TestCauldron::with_remote(&remote);
    assert!(second
        .store()
        .has_native_application(&AppNameDescriptor::new("myapp"))
        .unwrap());
    assert_eq!(
        second.get_yarn_lock(&v, "container").unwrap().as_deref(),
        Some(&b"lock"[..])
    );
}

#[test]
fn discarded_transaction_is_never_pushed() {
    let remote = InMemoryRemote::new();
    let tc = TestCauldron::with_remote(&remote);
    tc.add_version("myapp:android:1.0.0");
    let tip = remote.commits(BRANCH).len();

    tc.begin_transaction().unwrap();
    tc.add_version("myapp:android:2.0.0");
    tc.discard_transaction().unwrap();

    assert_eq!(remote.commits(BRANCH).len(), tip);
    let second = TestCauldron::with_remote(&remote);
    let versions = second
        .store()
        .get_versions(&AppNameDescriptor::new("myapp").with_platform(cauldron_core::NativePlatform::Android))
        .unwrap();
    assert_eq!(versions.len(), 1);
}

#[test]
fn last_writer_wins() {
    let remote = InMemoryRemote::new();
    let first = TestCauldron::with_remote(&remote);
    let second = TestCauldron::with_remote(&remote);

    first.add_version("myapp:android:1.0.0");
    second.add_version("otherapp:ios:1.0.0");

    let third = TestCauldron::with_remote(&remote);
    let names: Vec<_> = third
        .store()
        .get_native_applications()
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(names, vec!["otherapp"]);
}

fn open_with_git_cli(work: &Path, url: &str) -> ActiveCauldron {
    let git = Arc::new(GitCli::new(work).with_identity("Cauldron", "cauldron@example.com"));
    let config = CauldronConfig::new(work).repository(url);
    ActiveCauldron::open(&config, git, Arc::new(StaticRefResolver::new())).unwrap()
}

#[test]
fn git_cli_shares_changes_through_bare_remote() {
    let root = tempfile::tempdir().unwrap();
    if !GitCli::new(root.path()).is_available() {
        eprintln!("git not found, skipping");
        return;
    }
    let bare = root.path().join("cauldron.git");
    let status = Command::new("git")
        .arg("init")
        .arg("--bare")
        .arg(&bare)
        .status()
        .unwrap();
    assert!(status.success());
    let url = bare.to_string_lossy().into_owned();

    let first = open_with_git_cli(&root.path().join("first"), &url);
    let v: AppVersionDescriptor = "myapp:android:1.0.0".parse().unwrap();
    first
        .manager()
        .add_native_application_version(&v, AddVersionOptions::new())
        .unwrap();
    first
        .manager()
        .add_native_dependency(&v, &PackagePath::new("react-native@0.72.4"))
        .unwrap();
    first.manager().add_yarn_lock(&v, "container", b"lock").unwrap();

    let second = open_with_git_cli(&root.path().join("second"), &url);
    assert!(second.store().has_version(&v).unwrap());
    assert_eq!(
        second.manager().get_native_dependencies(&v).unwrap(),
        vec![PackagePath::new("react-native@0.72.4")]
    );
    assert_eq!(
        second.store().get_yarn_lock(&v, "container").unwrap().as_deref(),
        Some(&b"lock"[..])
    );

    let log = Command::new("git")
        .arg("--git-dir")
        .arg(&bare)
        .args(["log", "--format=%s", BRANCH])
        .output()
        .unwrap();
    let subjects = String::from_utf8(log.stdout).unwrap();
    assert_eq!(
        subjects.lines().next(),
        Some("Add yarn.lock for myapp:android:1.0.0 container")
    );
    assert_eq!(subjects.lines().last(), Some("First Commit!"));
}
