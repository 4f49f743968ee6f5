// Device registration - Validate a manifest and upload it through a pre-signed target
use crate::application::telemetry_store::StoreConnector;
use crate::domain::error::{WorkbenchError, WorkbenchResult};
use crate::domain::manifest::{DeviceManifest, ManifestDraft, MANIFEST_CONTENT_TYPE};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Form state across submissions. A failed submit keeps the draft and the error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrationForm {
    pub open: bool,
    pub draft: ManifestDraft,
    pub error: Option<String>,
}

impl RegistrationForm {
    pub fn open_with(&mut self, draft: ManifestDraft) {
        self.open = true;
        self.draft = draft;
        self.error = None;
    }

    /// Validate the draft without touching the network.
    pub fn prepare(&mut self, now: DateTime<Utc>) -> WorkbenchResult<DeviceManifest> {
        match self.draft.to_manifest(now) {
            Some(manifest) => {
                self.error = None;
                Ok(manifest)
            }
            None => {
                let err = WorkbenchError::Validation("deviceId must not be empty".to_string());
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Reset after a successful upload of `submitted`. A draft edited while the
    /// upload was in flight is kept, and false is returned.
    pub fn complete(&mut self, submitted: &ManifestDraft) -> bool {
        if self.draft != *submitted {
            return false;
        }
        *self = Self::default();
        true
    }

    pub fn fail(&mut self, err: &WorkbenchError) {
        self.open = true;
        self.error = Some(err.to_string());
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    connector: Arc<dyn StoreConnector>,
}

impl RegistrationService {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }

    /// Upload `manifest` and return the storage key it was written to.
    pub async fn register(
        &self,
        base_url: &str,
        manifest: &DeviceManifest,
    ) -> WorkbenchResult<String> {
        if base_url.trim().is_empty() {
            return Err(WorkbenchError::Configuration(
                "baseUrl is required to register devices".to_string(),
            ));
        }

        let key = manifest.storage_key();
        let body = serde_json::to_vec_pretty(manifest).context("Failed to serialize manifest")?;
        let store = self.connector.connect(base_url);

        let authorization = store
            .authorize_upload(&key, MANIFEST_CONTENT_TYPE)
            .await
            .context("Upload authorization failed")?;
        store
            .upload(&authorization, &key, MANIFEST_CONTENT_TYPE, body)
            .await
            .context("Manifest upload failed")?;

        tracing::info!("Registered device {} at {}", manifest.device_id, key);
        Ok(key)
    }
}
