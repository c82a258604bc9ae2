//! Three-way package delta.

use crate::package::PackagePath;

/// Packages of a local set, classified against a reference set.
///
/// Classification is by base path. `upgraded` only means the version
/// differs from the reference, not that it is higher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDelta {
    /// Packages absent from the reference.
    pub new: Vec<PackagePath>,
    /// Packages present in the reference at the same version.
    pub same: Vec<PackagePath>,
    /// Packages present in the reference at another version.
    pub upgraded: Vec<PackagePath>,
}

impl PackageDelta {
    /// Classifies every package of `local` against `reference`.
    ///
    /// Each partition keeps the order of `local`.
    #[must_use]
    pub fn compute(reference: &[PackagePath], local: &[PackagePath]) -> Self {
        let mut delta = Self::default();
        for pkg in local {
            match reference.iter().find(|r| r.base_path() == pkg.base_path()) {
                None => delta.new.push(pkg.clone()),
                Some(r) if r.version() == pkg.version() => delta.same.push(pkg.clone()),
                Some(_) => delta.upgraded.push(pkg.clone()),
            }
        }
        delta
    }

    /// Returns true if nothing is new or upgraded.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.new.is_empty() && self.upgraded.is_empty()
    }

    /// Returns the number of classified packages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.new.len() + self.same.len() + self.upgraded.len()
    }

    /// Returns true if no package was classified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
