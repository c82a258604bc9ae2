//! Version-name ordering, coercion and range matching.
//!
//! Native application version names are free-form. Names that are valid
//! semver sort first, in semver order; all other names follow, sorted
//! lexically.

use crate::error::{CauldronError, CauldronResult};
use regex::Regex;
use semver::{Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static COERCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid regex"));
static FULL_TRIPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+.\d+.*").expect("valid regex"));
static MAJOR_MINOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+)(.*)").expect("valid regex"));
static MAJOR_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(.*)").expect("valid regex"));

/// Parses `name` as strict semver.
#[must_use]
pub fn parse_semver(name: &str) -> Option<Version> {
    Version::parse(name).ok()
}

/// Returns true if `name` is strict semver.
#[must_use]
pub fn is_valid_semver(name: &str) -> bool {
    parse_semver(name).is_some()
}

/// Orders version names: valid semver ascending first, then the rest
/// lexically.
#[must_use]
pub fn compare_version_names(a: &str, b: &str) -> Ordering {
    match (parse_semver(a), parse_semver(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Extracts the first `major[.minor[.patch]]` run of `name`.
///
/// `"v1.2"` coerces to `1.2.0` and `"17.7.0-beta"` to `17.7.0`.
#[must_use]
pub fn coerce(name: &str) -> Option<Version> {
    let caps = COERCE.captures(name)?;
    let part = |i: usize| -> Option<u64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

/// Rewrites a version name into a semver-comparable string.
///
/// `X.Y.Z...` is kept, `X.Y...` becomes `X.Y.0...` and `X...` becomes
/// `X.0.0...`.
///
/// # Errors
///
/// Returns [`CauldronError::InvalidVersion`] if `name` does not start with
/// a digit.
pub fn normalize_to_semver(name: &str) -> CauldronResult<String> {
    if FULL_TRIPLE.is_match(name) {
        Ok(name.to_string())
    } else if let Some(caps) = MAJOR_MINOR.captures(name) {
        Ok(format!("{}.0{}", &caps[1], &caps[2]))
    } else if let Some(caps) = MAJOR_ONLY.captures(name) {
        Ok(format!("{}.0.0{}", &caps[1], &caps[2]))
    } else {
        Err(CauldronError::invalid_version(
            name,
            "it does not start with a numeric version",
        ))
    }
}

/// A version range in npm syntax.
///
/// Supports space or comma separated comparators (`>=1.0.0 <2.0.0`),
/// hyphen ranges (`1.0.0 - 2.0.0`) and alternatives (`^1.0.0 || ^2.0.0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    source: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parses an npm-style range.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::InvalidVersion`] if any alternative is not
    /// a valid range.
    pub fn parse(range: &str) -> CauldronResult<Self> {
        let alternatives = range
            .split("||")
            .map(|alt| {
                let req = to_requirement(alt.trim());
                VersionReq::parse(&req).map_err(|e| CauldronError::invalid_version(range, e.to_string()))
            })
            .collect::<CauldronResult<Vec<_>>>()?;
        Ok(Self {
            source: range.to_string(),
            alternatives,
        })
    }

    /// Returns true if `version` satisfies any alternative.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for VersionRange {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Converts one npm alternative into the `semver` crate's comma syntax.
fn to_requirement(alt: &str) -> String {
    if alt.is_empty() || alt == "x" || alt == "X" {
        return "*".to_string();
    }
    let tokens: Vec<&str> = alt
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={low}, <={high}");
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if token.chars().all(|c| "<>=~^".contains(c)) {
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => comparators.push(format!("{op}{token}")),
            None => comparators.push(token.to_string()),
        }
    }
    comparators.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn semver_names_sort_before_others() {
        let mut names = vec!["2.0.0", "zeta", "1.10.0", "1.2.0", "alpha", "1.0.0-beta"];
        names.sort_by(|a, b| compare_version_names(a, b));
        assert_eq!(
            names,
            vec!["1.0.0-beta", "1.2.0", "1.10.0", "2.0.0", "alpha", "zeta"]
        );
    }

    #[test]
    fn coerce_loose_versions() {
        assert_eq!(coerce("v1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(coerce("17.7.0-beta"), Some(Version::new(17, 7, 0)));
        assert_eq!(coerce("release-3"), Some(Version::new(3, 0, 0)));
        assert_eq!(coerce("latest"), None);
    }

    #[test]
    fn normalize_pads_missing_parts() {
        assert_eq!(normalize_to_semver("1.2.3").unwrap(), "1.2.3");
        assert_eq!(normalize_to_semver("1.2").unwrap(), "1.2.0");
        assert_eq!(normalize_to_semver("1.2-beta").unwrap(), "1.2.0-beta");
        assert_eq!(normalize_to_semver("7").unwrap(), "7.0.0");
        assert!(normalize_to_semver("beta").is_err());
    }

    #[test]
    fn npm_ranges() {
        let range = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(range.matches(&Version::new(1, 5, 0)));
        assert!(!range.matches(&Version::new(2, 0, 0)));

        let hyphen = VersionRange::parse("1.0.0 - 1.2.0").unwrap();
        assert!(hyphen.matches(&Version::new(1, 2, 0)));
        assert!(!hyphen.matches(&Version::new(1, 2, 1)));

        let either = VersionRange::parse("^1.0.0 || ^3.0.0").unwrap();
        assert!(either.matches(&Version::new(3, 1, 0)));
        assert!(!either.matches(&Version::new(2, 0, 0)));

        let spaced = VersionRange::parse(">= 1.0.0").unwrap();
        assert!(spaced.matches(&Version::new(1, 0, 0)));

        assert!(VersionRange::parse("not a range").is_err());
    }

    proptest! {
        #[test]
        fn ordering_is_total_and_antisymmetric(a in "[0-9a-z.]{1,8}", b in "[0-9a-z.]{1,8}") {
            let ab = compare_version_names(&a, &b);
            let ba = compare_version_names(&b, &a);
            prop_assert_eq!(ab, ba.reverse());
        }
    }
}
