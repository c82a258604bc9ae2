//! Over-the-air update history.

use crate::package::PackagePath;
use serde::{Deserialize, Serialize};

/// Metadata of one code push release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePushMetadata {
    /// Deployment the update was released to, e.g. `Production`.
    pub deployment_name: String,
    /// Release label assigned by the code push service, e.g. `v17`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Binary version range the update targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    /// Percentage of users receiving the update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollout: Option<u8>,
    /// Whether installing the update is mandatory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mandatory: Option<bool>,
    /// Whether the update is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_disabled: Option<bool>,
    /// Release notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// How the release was produced, e.g. `Upload` or `Promote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_method: Option<String>,
    /// Who released it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_by: Option<String>,
    /// Bundle size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Label of the release this one was promoted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_from_label: Option<String>,
}

impl CodePushMetadata {
    /// Creates metadata for `deployment_name` with every optional field unset.
    pub fn new(deployment_name: impl Into<String>) -> Self {
        Self {
            deployment_name: deployment_name.into(),
            ..Self::default()
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the targeted binary version range.
    #[must_use]
    pub fn app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = Some(app_version.into());
        self
    }

    /// Sets the rollout percentage.
    #[must_use]
    pub const fn rollout(mut self, rollout: u8) -> Self {
        self.rollout = Some(rollout);
        self
    }

    /// Sets whether the update is mandatory.
    #[must_use]
    pub const fn mandatory(mut self, value: bool) -> Self {
        self.is_mandatory = Some(value);
        self
    }

    /// Sets the release notes.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One recorded code push release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePushEntry {
    /// Release metadata.
    pub metadata: CodePushMetadata,
    /// MiniApps shipped in the update.
    #[serde(rename = "miniapps", default)]
    pub mini_apps: Vec<PackagePath>,
    /// JS API implementations shipped in the update.
    #[serde(default)]
    pub js_api_impls: Vec<PackagePath>,
}

/// Partial update of an existing code push entry.
///
/// Only fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodePushPatch {
    /// New release notes.
    pub description: Option<String>,
    /// New disabled flag.
    pub is_disabled: Option<bool>,
    /// New mandatory flag.
    pub is_mandatory: Option<bool>,
    /// New rollout percentage.
    pub rollout: Option<u8>,
}

impl CodePushPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the release notes.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the disabled flag.
    #[must_use]
    pub const fn disabled(mut self, value: bool) -> Self {
        self.is_disabled = Some(value);
        self
    }

    /// Sets the mandatory flag.
    #[must_use]
    pub const fn mandatory(mut self, value: bool) -> Self {
        self.is_mandatory = Some(value);
        self
    }

    /// Sets the rollout percentage.
    #[must_use]
    pub const fn rollout(mut self, rollout: u8) -> Self {
        self.rollout = Some(rollout);
        self
    }

    /// Applies the patch to `metadata`.
    pub fn apply(&self, metadata: &mut CodePushMetadata) {
        if let Some(description) = &self.description {
            metadata.description = Some(description.clone());
        }
        if let Some(is_disabled) = self.is_disabled {
            metadata.is_disabled = Some(is_disabled);
        }
        if let Some(is_mandatory) = self.is_mandatory {
            metadata.is_mandatory = Some(is_mandatory);
        }
        if let Some(rollout) = self.rollout {
            metadata.rollout = Some(rollout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_only_touches_given_fields() {
        let mut metadata = CodePushMetadata::new("Production")
            .label("v3")
            .rollout(50)
            .description("first");
        CodePushPatch::new().disabled(true).apply(&mut metadata);

        assert_eq!(metadata.is_disabled, Some(true));
        assert_eq!(metadata.rollout, Some(50));
        assert_eq!(metadata.description.as_deref(), Some("first"));
    }

    #[test]
    fn entry_uses_lowercase_miniapps_key() {
        let entry = CodePushEntry {
            metadata: CodePushMetadata::new("Staging"),
            mini_apps: vec![PackagePath::new("movies@1.0.0")],
            js_api_impls: vec![],
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({
                "metadata": {"deploymentName": "Staging"},
                "miniapps": ["movies@1.0.0"],
                "jsApiImpls": []
            })
        );
    }
}
