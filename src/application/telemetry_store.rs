// Store traits for remote telemetry objects and device uploads
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub next_continuation_token: Option<String>,
}

/// Pre-signed write target returned by the upload-authorization endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum UploadAuthorization {
    /// Write the body directly to `url`.
    Put { url: String },
    /// Send a multipart form made of `fields` followed by the file.
    Post {
        url: String,
        #[serde(default)]
        fields: HashMap<String, String>,
    },
}

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// List object keys under a prefix, one page at a time
    async fn list_objects(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> anyhow::Result<ListPage>;

    /// Fetch one telemetry record by key
    async fn get_object(&self, key: &str) -> anyhow::Result<Value>;

    /// Most recent records for one device; "recent" is server-defined
    async fn recent_for_device(&self, device_id: &str, limit: usize) -> anyhow::Result<Vec<Value>>;

    async fn authorize_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> anyhow::Result<UploadAuthorization>;

    async fn upload(
        &self,
        authorization: &UploadAuthorization,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> anyhow::Result<()>;
}

/// Opens a store for a given API root, so callers can switch `baseUrl` at runtime.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, base_url: &str) -> Arc<dyn TelemetryStore>;
}
