//! Property-based test generators using proptest.
//!
//! Provides strategies for generating descriptors, packages and code push
//! metadata that the Cauldron store accepts.

use cauldron_core::{CodePushMetadata, NativePlatform, PackagePath};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating native application names.
pub fn app_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{2,11}").expect("Invalid regex")
}

/// Strategy for generating native platforms.
pub fn platform_strategy() -> impl Strategy<Value = NativePlatform> {
    prop_oneof![Just(NativePlatform::Android), Just(NativePlatform::Ios)]
}

/// Strategy for generating valid semver version names.
pub fn semver_name_strategy() -> impl Strategy<Value = String> {
    (0u32..20, 0u32..20, 0u32..20).prop_map(|(major, minor, patch)| format!("{major}.{minor}.{patch}"))
}

/// Strategy for generating version names, semver or not.
///
/// Non-semver names include partial versions such as `1.2` and free-form
/// names such as `nightly`.
pub fn version_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => semver_name_strategy(),
        1 => (0u32..20, 0u32..20).prop_map(|(major, minor)| format!("{major}.{minor}")),
        1 => prop::string::string_regex("[a-z]{3,8}").expect("Invalid regex"),
    ]
}

/// Strategy for generating registry package names, some of them scoped.
pub fn package_name_strategy() -> impl Strategy<Value = String> {
    let name = prop::string::string_regex("[a-z][a-z0-9-]{1,14}").expect("Invalid regex");
    let scope = prop::option::weighted(
        0.25,
        prop::string::string_regex("[a-z]{2,8}").expect("Invalid regex"),
    );
    (scope, name).prop_map(|(scope, name)| match scope {
        Some(scope) => format!("@{scope}/{name}"),
        None => name,
    })
}

/// Strategy for generating versioned registry packages.
pub fn registry_package_strategy() -> impl Strategy<Value = PackagePath> {
    (package_name_strategy(), semver_name_strategy())
        .prop_map(|(name, version)| PackagePath::new(format!("{name}@{version}")))
}

/// Strategy for generating sets of registry packages with distinct base
/// paths, as a container holds them.
pub fn package_set_strategy(max: usize) -> impl Strategy<Value = Vec<PackagePath>> {
    prop::collection::btree_map(package_name_strategy(), semver_name_strategy(), 0..=max).prop_map(
        |packages: BTreeMap<String, String>| {
            packages
                .into_iter()
                .map(|(name, version)| PackagePath::new(format!("{name}@{version}")))
                .collect()
        },
    )
}

/// Strategy for generating a reference set and a local set that share
/// some base paths.
///
/// Shared packages keep or change their version at random, so every delta
/// partition gets exercised.
pub fn package_delta_strategy() -> impl Strategy<Value = (Vec<PackagePath>, Vec<PackagePath>)> {
    prop::collection::btree_map(
        package_name_strategy(),
        (0u8..4, semver_name_strategy(), semver_name_strategy()),
        0..12,
    )
    .prop_map(|packages| {
        let mut reference = Vec::new();
        let mut local = Vec::new();
        for (name, (presence, a, b)) in packages {
            match presence {
                0 => reference.push(PackagePath::new(format!("{name}@{a}"))),
                1 => local.push(PackagePath::new(format!("{name}@{a}"))),
                _ => {
                    reference.push(PackagePath::new(format!("{name}@{a}")));
                    local.push(PackagePath::new(format!("{name}@{b}")));
                }
            }
        }
        (reference, local)
    })
}

/// Strategy for generating code push metadata.
pub fn code_push_metadata_strategy() -> impl Strategy<Value = CodePushMetadata> {
    (
        prop_oneof![Just("Production"), Just("Staging")],
        1u32..1000,
        0u8..=100,
        any::<bool>(),
    )
        .prop_map(|(deployment, label, rollout, mandatory)| {
            CodePushMetadata::new(deployment)
                .label(format!("v{label}"))
                .rollout(rollout)
                .mandatory(mandatory)
        })
}

/// Strategy for generating yarn lock content.
pub fn yarn_lock_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cauldron_core::PackageKind;

    proptest! {
        #[test]
        fn registry_packages_are_versioned(pkg in registry_package_strategy()) {
            prop_assert_eq!(pkg.kind(), PackageKind::Registry);
            prop_assert!(pkg.version().is_some());
        }

        #[test]
        fn package_sets_have_distinct_base_paths(set in package_set_strategy(10)) {
            let mut bases: Vec<_> = set.iter().map(PackagePath::base_path).collect();
            bases.dedup();
            prop_assert_eq!(bases.len(), set.len());
        }

        #[test]
        fn semver_names_parse(name in semver_name_strategy()) {
            prop_assert!(cauldron_core::version::is_valid_semver(&name));
        }
    }
}
