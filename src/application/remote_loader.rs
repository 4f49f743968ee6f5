// Remote dataset loader - Paginated listing, fetch, flatten, concatenate
use crate::application::telemetry_store::{StoreConnector, TelemetryStore};
use crate::domain::dataset::Dataset;
use crate::domain::error::{WorkbenchError, WorkbenchResult};
use crate::domain::telemetry::flatten;
use anyhow::Context;
use futures::{pin_mut, Stream, StreamExt};
use std::sync::Arc;

#[derive(Clone)]
pub struct RemoteDatasetLoader {
    connector: Arc<dyn StoreConnector>,
    data_extension: String,
}

impl RemoteDatasetLoader {
    pub fn new(connector: Arc<dyn StoreConnector>, data_extension: String) -> Self {
        Self {
            connector,
            data_extension,
        }
    }

    /// Load every data object under `prefix` into one dataset.
    ///
    /// The first flattened row decides the columns; fields that only appear in later
    /// rows are dropped.
    pub async fn load_all(&self, base_url: &str, prefix: &str) -> WorkbenchResult<Dataset> {
        if base_url.trim().is_empty() {
            return Err(WorkbenchError::Configuration(
                "baseUrl is required to load remote telemetry".to_string(),
            ));
        }

        let store = self.connector.connect(base_url);
        let keys = list_keys(store.clone(), prefix.to_string());
        pin_mut!(keys);

        let mut rows = Vec::new();
        let mut objects = 0usize;
        while let Some(key) = keys.next().await {
            let key = key?;
            if !key.ends_with(&self.data_extension) {
                continue;
            }
            let record = store
                .get_object(&key)
                .await
                .with_context(|| format!("Failed to fetch {}", key))?;
            objects += 1;
            rows.extend(flatten(&record).into_iter().map(|r| r.into_fields()));
        }

        tracing::info!(
            "Loaded {} rows from {} objects under {}",
            rows.len(),
            objects,
            prefix
        );

        if rows.is_empty() {
            return Err(WorkbenchError::EmptyResult(format!(
                "no telemetry rows found under '{}'",
                prefix
            )));
        }

        Ok(Dataset::from_ordered_rows(rows))
    }
}

/// Page through the listing until the server stops returning a continuation token.
fn list_keys(
    store: Arc<dyn TelemetryStore>,
    prefix: String,
) -> impl Stream<Item = anyhow::Result<String>> {
    async_stream::try_stream! {
        let mut token: Option<String> = None;
        loop {
            let page = store
                .list_objects(&prefix, token.as_deref())
                .await
                .context("Failed to list telemetry objects")?;
            tracing::debug!("Listed {} keys under {}", page.keys.len(), prefix);

            for key in page.keys {
                yield key;
            }

            match page.next_continuation_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => break,
            }
        }
    }
}
