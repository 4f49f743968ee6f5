// HTTP telemetry store - Object listing, fetch, recent readings and pre-signed uploads
use crate::application::telemetry_store::{
    ListPage, StoreConnector, TelemetryStore, UploadAuthorization,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpTelemetryStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresignRequest<'a> {
    key: &'a str,
    content_type: &'a str,
}

impl HttpTelemetryStore {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    fn list_url(&self, prefix: &str, continuation_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/s3/list?prefix={}",
            self.base_url,
            urlencoding::encode(prefix)
        );
        if let Some(token) = continuation_token {
            url.push_str("&continuationToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/s3/object?key={}", self.base_url, urlencoding::encode(key))
    }

    fn recent_url(&self, device_id: &str, limit: usize) -> String {
        format!(
            "{}/devices/{}/recent?limit={}",
            self.base_url,
            urlencoding::encode(device_id),
            limit
        )
    }

    fn presign_url(&self) -> String {
        format!("{}/s3/presign", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Request to {} failed with status {}: {}", url, status, body);
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }
}

#[async_trait]
impl TelemetryStore for HttpTelemetryStore {
    async fn list_objects(&self, prefix: &str, continuation_token: Option<&str>) -> Result<ListPage> {
        self.get_json(&self.list_url(prefix, continuation_token)).await
    }

    async fn get_object(&self, key: &str) -> Result<Value> {
        self.get_json(&self.object_url(key)).await
    }

    async fn recent_for_device(&self, device_id: &str, limit: usize) -> Result<Vec<Value>> {
        self.get_json(&self.recent_url(device_id, limit)).await
    }

    async fn authorize_upload(&self, key: &str, content_type: &str) -> Result<UploadAuthorization> {
        let url = self.presign_url();
        let response = self
            .client
            .post(&url)
            .json(&PresignRequest { key, content_type })
            .send()
            .await
            .context("Failed to request upload authorization")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Upload authorization failed with status {}: {}", status, body);
        }

        response
            .json::<UploadAuthorization>()
            .await
            .context("Failed to parse upload authorization")
    }

    async fn upload(
        &self,
        authorization: &UploadAuthorization,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<()> {
        let request = match authorization {
            UploadAuthorization::Put { url } => self
                .client
                .put(url)
                .header("Content-Type", content_type)
                .body(body),
            UploadAuthorization::Post { url, fields } => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                let file_name = key.rsplit('/').next().unwrap_or(key).to_string();
                let part = Part::bytes(body)
                    .file_name(file_name)
                    .mime_str(content_type)
                    .context("Invalid upload content type")?;
                // The file must be the last field of a pre-signed POST.
                self.client.post(url).multipart(form.part("file", part))
            }
        };

        let response = request.send().await.context("Failed to send upload")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Upload failed with status {}: {}", status, body);
        }

        tracing::debug!("Uploaded {}", key);
        Ok(())
    }
}

/// Shares one connection pool across every store it opens.
#[derive(Debug, Clone)]
pub struct HttpStoreConnector {
    client: reqwest::Client,
}

impl HttpStoreConnector {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl StoreConnector for HttpStoreConnector {
    fn connect(&self, base_url: &str) -> Arc<dyn TelemetryStore> {
        Arc::new(HttpTelemetryStore::new(self.client.clone(), base_url))
    }
}
