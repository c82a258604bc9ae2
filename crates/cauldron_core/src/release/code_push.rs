//! Bounded code push history.

use super::ReleaseManager;
use crate::descriptor::AppVersionDescriptor;
use crate::error::{CauldronError, CauldronResult};
use crate::model::{CodePushEntry, CodePushMetadata, CodePushPatch};
use crate::package::PackagePath;
use tracing::debug;

impl ReleaseManager {
    /// Returns the code push history of a deployment, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if the version does not exist.
    pub fn get_code_push_entries(&self, descriptor: &AppVersionDescriptor, deployment: &str) -> CauldronResult<Vec<CodePushEntry>> {
        Ok(self
            .store
            .get_code_push_entries(descriptor, deployment)?
            .unwrap_or_default())
    }

    /// Returns the entry labelled `label`, or the latest entry without a
    /// label. `None` if the deployment has no history.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if no entry has `label`.
    pub fn get_code_push_entry(
        &self,
        descriptor: &AppVersionDescriptor,
        deployment: &str,
        label: Option<&str>,
    ) -> CauldronResult<Option<CodePushEntry>> {
        let Some(entries) = self.store.get_code_push_entries(descriptor, deployment)? else {
            return Ok(None);
        };
        match label {
            None => Ok(entries.into_iter().last()),
            Some(label) => entries
                .into_iter()
                .find(|e| e.metadata.label.as_deref() == Some(label))
                .map(Some)
                .ok_or_else(|| {
                    CauldronError::not_found(format!("CodePush entry matching label {label} in {descriptor}"))
                }),
        }
    }

    /// Appends an entry to the history of its deployment.
    ///
    /// With `codePush.entriesLimit` set to `n > 0`, the oldest entries are
    /// dropped so that at most `n` remain.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Validation`] for malformed metadata, or
    /// [`CauldronError::NotFound`] if the version does not exist.
    pub fn add_code_push_entry(
        &self,
        descriptor: &AppVersionDescriptor,
        metadata: CodePushMetadata,
        mini_apps: Vec<PackagePath>,
        js_api_impls: Vec<PackagePath>,
    ) -> CauldronResult<()> {
        let limit = self
            .get_code_push_config(descriptor)?
            .entries_limit
            .unwrap_or(0);
        let deployment = metadata.deployment_name.clone();
        let mut entries = self.get_code_push_entries(descriptor, &deployment)?;
        if limit > 0 && entries.len() >= limit {
            let dropped = entries.len() - limit + 1;
            debug!(version = %descriptor, %deployment, dropped, "Dropping oldest code push entries");
            entries.drain(..dropped);
        }
        entries.push(CodePushEntry {
            metadata,
            mini_apps,
            js_api_impls,
        });
        self.store
            .set_code_push_entries(descriptor, &deployment, entries)
    }

    /// Patches the metadata of the entry labelled `label`. Fields the patch
    /// leaves unset keep their value.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`] if no entry has `label`.
    pub fn update_code_push_entry(
        &self,
        descriptor: &AppVersionDescriptor,
        deployment: &str,
        label: &str,
        patch: &CodePushPatch,
    ) -> CauldronResult<()> {
        let mut entries = self.get_code_push_entries(descriptor, deployment)?;
        let entry = entries
            .iter_mut()
            .find(|e| e.metadata.label.as_deref() == Some(label))
            .ok_or_else(|| {
                CauldronError::not_found(format!("CodePush entry matching label {label} in {descriptor}"))
            })?;
        patch.apply(&mut entry.metadata);
        self.store
            .set_code_push_entries(descriptor, deployment, entries)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, version};
    use super::*;
    use crate::descriptor::Descriptor;
    use serde_json::json;

    fn release(manager: &ReleaseManager, v: &AppVersionDescriptor, label: &str) {
        manager
            .add_code_push_entry(
                v,
                CodePushMetadata::new("Production").label(label).rollout(100),
                vec![PackagePath::new("movielist@1.0.0")],
                vec![],
            )
            .unwrap();
    }

    fn labels(manager: &ReleaseManager, v: &AppVersionDescriptor) -> Vec<String> {
        manager
            .get_code_push_entries(v, "Production")
            .unwrap()
            .into_iter()
            .filter_map(|e| e.metadata.label)
            .collect()
    }

    #[test]
    fn history_is_bounded_by_entries_limit() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        f.manager
            .set_config(None, &json!({"codePush": {"entriesLimit": 2}}))
            .unwrap();
        for label in ["v1", "v2", "v3"] {
            release(&f.manager, &v, label);
        }
        assert_eq!(labels(&f.manager, &v), vec!["v2", "v3"]);
    }

    #[test]
    fn lowered_limit_trims_to_fit() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        for label in ["v1", "v2", "v3", "v4"] {
            release(&f.manager, &v, label);
        }
        f.manager
            .set_config(Some(&Descriptor::from(&v)), &json!({"codePush": {"entriesLimit": 2}}))
            .unwrap();
        release(&f.manager, &v, "v5");
        assert_eq!(labels(&f.manager, &v), vec!["v4", "v5"]);
    }

    #[test]
    fn zero_limit_is_unlimited() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        f.manager
            .set_config(None, &json!({"codePush": {"entriesLimit": 0}}))
            .unwrap();
        for label in ["v1", "v2", "v3"] {
            release(&f.manager, &v, label);
        }
        assert_eq!(labels(&f.manager, &v).len(), 3);
    }

    #[test]
    fn entry_lookup_by_label() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        assert!(f
            .manager
            .get_code_push_entry(&v, "Production", None)
            .unwrap()
            .is_none());
        release(&f.manager, &v, "v1");
        release(&f.manager, &v, "v2");

        let latest = f
            .manager
            .get_code_push_entry(&v, "Production", None)
            .unwrap()
            .unwrap();
        assert_eq!(latest.metadata.label.as_deref(), Some("v2"));
        let first = f
            .manager
            .get_code_push_entry(&v, "Production", Some("v1"))
            .unwrap()
            .unwrap();
        assert_eq!(first.mini_apps, vec![PackagePath::new("movielist@1.0.0")]);
        assert!(f
            .manager
            .get_code_push_entry(&v, "Production", Some("v9"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn update_patches_only_given_fields() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        release(&f.manager, &v, "v1");
        f.manager
            .update_code_push_entry(
                &v,
                "Production",
                "v1",
                &CodePushPatch::new().rollout(25).disabled(true),
            )
            .unwrap();

        let entry = f
            .manager
            .get_code_push_entry(&v, "Production", Some("v1"))
            .unwrap()
            .unwrap();
        assert_eq!(entry.metadata.rollout, Some(25));
        assert_eq!(entry.metadata.is_disabled, Some(true));
        assert_eq!(entry.metadata.label.as_deref(), Some("v1"));
        assert_eq!(entry.metadata.is_mandatory, None);

        assert!(f
            .manager
            .update_code_push_entry(&v, "Production", "v2", &CodePushPatch::new())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn code_push_is_allowed_on_released_versions() {
        let f = fixture();
        let v = version(&f.manager, "myapp:android:1.0.0");
        f.manager.update_native_app_is_released(&v, true).unwrap();
        release(&f.manager, &v, "v1");
        assert_eq!(labels(&f.manager, &v), vec!["v1"]);
    }
}
