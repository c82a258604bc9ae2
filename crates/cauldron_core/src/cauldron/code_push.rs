//! Code push history of a version.

use super::CauldronStore;
use crate::descriptor::AppVersionDescriptor;
use crate::error::CauldronResult;
use crate::model::CodePushEntry;
use crate::schema::SchemaId;

impl CauldronStore {
    /// Returns the code push history of a deployment, oldest first, or
    /// `None` if the deployment has no history.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`](crate::CauldronError::NotFound)
    /// if the version does not exist.
    pub fn get_code_push_entries(&self, descriptor: &AppVersionDescriptor, deployment: &str) -> CauldronResult<Option<Vec<CodePushEntry>>> {
        Ok(self.get_version(descriptor)?.code_push.remove(deployment))
    }

    /// Returns true if the deployment has a history, even an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::NotFound`](crate::CauldronError::NotFound)
    /// if the version does not exist.
    pub fn has_code_push_entries(&self, descriptor: &AppVersionDescriptor, deployment: &str) -> CauldronResult<bool> {
        Ok(self
            .get_version(descriptor)?
            .code_push
            .contains_key(deployment))
    }

    /// Appends an entry to the history of its deployment.
    ///
    /// No retention limit applies here; see
    /// [`ReleaseManager::add_code_push_entry`](crate::ReleaseManager::add_code_push_entry).
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Validation`](crate::CauldronError::Validation)
    /// for a malformed entry, or
    /// [`CauldronError::NotFound`](crate::CauldronError::NotFound) if the
    /// version does not exist.
    pub fn add_code_push_entry(&self, descriptor: &AppVersionDescriptor, entry: &CodePushEntry) -> CauldronResult<()> {
        let entry: CodePushEntry = self.validated(entry, SchemaId::CodePushEntry)?;
        self.mutate_version(
            descriptor,
            format!("New CodePush OTA update for {descriptor}"),
            |version| {
                version
                    .code_push
                    .entry(entry.metadata.deployment_name.clone())
                    .or_default()
                    .push(entry);
                Ok(())
            },
        )
    }

    /// Replaces the whole history of a deployment.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Validation`](crate::CauldronError::Validation)
    /// for a malformed entry, or
    /// [`CauldronError::NotFound`](crate::CauldronError::NotFound) if the
    /// version does not exist.
    pub fn set_code_push_entries(
        &self,
        descriptor: &AppVersionDescriptor,
        deployment: &str,
        entries: Vec<CodePushEntry>,
    ) -> CauldronResult<()> {
        let entries = entries
            .iter()
            .map(|e| self.validated(e, SchemaId::CodePushEntry))
            .collect::<CauldronResult<Vec<CodePushEntry>>>()?;
        self.mutate_version(
            descriptor,
            format!("Set codePush entries in {descriptor}"),
            |version| {
                version.code_push.insert(deployment.to_string(), entries);
                Ok(())
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, with_version};
    use crate::model::CodePushMetadata;
    use crate::CauldronError;

    fn entry(label: &str) -> crate::model::CodePushEntry {
        crate::model::CodePushEntry {
            metadata: CodePushMetadata::new("Production").label(label),
            mini_apps: vec!["foo@1.0.0".into()],
            js_api_impls: vec![],
        }
    }

    #[test]
    fn append_and_replace() {
        let (_dir, git, store) = fixture();
        let v = with_version(&store, "myapp:android:1.0.0");
        assert!(!store.has_code_push_entries(&v, "Production").unwrap());
        assert!(store.get_code_push_entries(&v, "Production").unwrap().is_none());

        store.add_code_push_entry(&v, &entry("v1")).unwrap();
        store.add_code_push_entry(&v, &entry("v2")).unwrap();
        assert_eq!(
            git.commit_log().last().unwrap().summary(),
            "New CodePush OTA update for myapp:android:1.0.0"
        );
        let labels: Vec<_> = store
            .get_code_push_entries(&v, "Production")
            .unwrap()
            .unwrap()
            .into_iter()
            .map(|e| e.metadata.label.unwrap())
            .collect();
        assert_eq!(labels, vec!["v1", "v2"]);

        store
            .set_code_push_entries(&v, "Production", vec![entry("v3")])
            .unwrap();
        assert_eq!(store.get_code_push_entries(&v, "Production").unwrap().unwrap().len(), 1);
    }

    #[test]
    fn rejects_out_of_range_rollout() {
        let (_dir, _git, store) = fixture();
        let v = with_version(&store, "myapp:android:1.0.0");
        let mut bad = entry("v1");
        bad.metadata.rollout = Some(150);
        assert!(matches!(
            store.add_code_push_entry(&v, &bad),
            Err(CauldronError::Validation { .. })
        ));
    }
}
