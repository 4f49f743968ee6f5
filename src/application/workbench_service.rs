// Workbench session - Dataset, curation and heater profile owned by one operator session
use crate::application::remote_loader::RemoteDatasetLoader;
use crate::domain::curation::{Curation, CurationView, REMOTE_IDENTITY_COLUMNS};
use crate::domain::dataset::Dataset;
use crate::domain::error::WorkbenchResult;
use crate::domain::heater::{HeaterProfile, StepField};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone)]
pub struct WorkbenchService {
    dataset: Arc<RwLock<Arc<Dataset>>>,
    curation: Arc<RwLock<Curation>>,
    heater: Arc<RwLock<HeaterProfile>>,
    loader: RemoteDatasetLoader,
}

impl WorkbenchService {
    pub fn new(loader: RemoteDatasetLoader) -> Self {
        Self {
            dataset: Arc::new(RwLock::new(Arc::new(Dataset::default()))),
            curation: Arc::new(RwLock::new(Curation::default())),
            heater: Arc::new(RwLock::new(HeaterProfile::default())),
            loader,
        }
    }

    /// Shared handle the training orchestrator reads at completion time.
    pub fn curation_handle(&self) -> Arc<RwLock<Curation>> {
        self.curation.clone()
    }

    pub fn dataset(&self) -> Arc<Dataset> {
        read(&self.dataset).clone()
    }

    /// Replace the dataset with parsed local text and re-derive the selection.
    pub fn load_local(&self, text: &str) -> Arc<Dataset> {
        let dataset = Dataset::parse(text);
        let curation = Curation::derive(&dataset.columns);
        tracing::info!(
            "Loaded local dataset: {} columns, {} rows",
            dataset.columns.len(),
            dataset.len()
        );
        self.replace(dataset, curation)
    }

    /// Replace the dataset with every telemetry object under `prefix`.
    pub async fn load_remote(&self, base_url: &str, prefix: &str) -> WorkbenchResult<Arc<Dataset>> {
        let dataset = self.loader.load_all(base_url, prefix).await?;
        let curation = Curation::derive_excluding(&dataset.columns, &REMOTE_IDENTITY_COLUMNS);
        Ok(self.replace(dataset, curation))
    }

    fn replace(&self, dataset: Dataset, curation: Curation) -> Arc<Dataset> {
        let dataset = Arc::new(dataset);
        // Swap both under their locks so readers never see a selection from another dataset.
        let mut ds = write(&self.dataset);
        let mut cur = write(&self.curation);
        *ds = dataset.clone();
        *cur = curation;
        dataset
    }

    pub fn curation(&self) -> CurationView {
        read(&self.curation).view()
    }

    pub fn set_label(&self, column: &str) -> bool {
        write(&self.curation).set_label(column)
    }

    pub fn toggle_feature(&self, column: &str) -> bool {
        write(&self.curation).toggle_feature(column)
    }

    pub fn heater_profile(&self) -> HeaterProfile {
        read(&self.heater).clone()
    }

    pub fn add_heater_step(&self) -> HeaterProfile {
        let mut profile = write(&self.heater);
        profile.add_step();
        profile.clone()
    }

    pub fn update_heater_step(&self, index: usize, field: StepField, value: f64) -> HeaterProfile {
        let mut profile = write(&self.heater);
        profile.update_step(index, field, value);
        profile.clone()
    }

    pub fn remove_heater_step(&self, index: usize) -> HeaterProfile {
        let mut profile = write(&self.heater);
        profile.remove_step(index);
        profile.clone()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry_store::fakes::{FakeConnector, FakeStore};
    use crate::application::telemetry_store::ListPage;
    use serde_json::json;

    fn service(store: Arc<FakeStore>) -> WorkbenchService {
        WorkbenchService::new(RemoteDatasetLoader::new(
            Arc::new(FakeConnector(store)),
            ".json".to_string(),
        ))
    }

    #[test]
    fn test_local_load_derives_curation() {
        let wb = service(Arc::new(FakeStore::default()));
        wb.load_local("timestamp,IAQ,CO2eq,VOC,label\n0,25,450,0.32,fresh\n1,60,700,0.90,spoiled");

        assert_eq!(wb.dataset().len(), 2);
        let view = wb.curation();
        assert_eq!(view.label.as_deref(), Some("label"));
        assert_eq!(view.features, vec!["CO2eq", "IAQ", "VOC"]);
    }

    #[test]
    fn test_reload_replaces_selection() {
        let wb = service(Arc::new(FakeStore::default()));
        wb.load_local("a,b,label\n1,2,x");
        wb.set_label("a");
        wb.load_local("x,y\n1,2");

        let view = wb.curation();
        assert_eq!(view.label.as_deref(), Some("y"));
        assert_eq!(view.features, vec!["x"]);
        assert_eq!(view.feature_options, vec!["x"]);
    }

    #[tokio::test]
    async fn test_remote_load_excludes_identity_columns() {
        let store = Arc::new(FakeStore::default());
        store.pages.lock().unwrap().insert(
            None,
            ListPage {
                keys: vec!["t/a.json".to_string()],
                next_continuation_token: None,
            },
        );
        store.objects.lock().unwrap().insert(
            "t/a.json".to_string(),
            json!({"timestamp": "t0", "deviceId": "d", "boardMode": "m", "sensors": [
                {"sensorId": 0, "airQuality": {"IAQ": 10.0, "VOC": 0.4}},
            ]}),
        );

        let wb = service(store);
        wb.load_remote("http://api", "t/").await.unwrap();
        let view = wb.curation();
        // no label-like column, so the last column is the label
        assert_eq!(view.label.as_deref(), Some("VOC"));
        assert_eq!(view.features, vec!["IAQ"]);
    }

    #[tokio::test]
    async fn test_failed_remote_load_keeps_previous_dataset() {
        let wb = service(Arc::new(FakeStore::default()));
        wb.load_local("a,label\n1,x");
        assert!(wb.load_remote("http://api", "t/").await.is_err());
        assert_eq!(wb.dataset().columns, vec!["a", "label"]);
    }

    #[test]
    fn test_heater_edits() {
        let wb = service(Arc::new(FakeStore::default()));
        wb.add_heater_step();
        wb.add_heater_step();
        let profile = wb.update_heater_step(1, StepField::DwellMs, 500.0);
        assert_eq!(profile.steps()[1].dwell_ms, 500);
        let profile = wb.remove_heater_step(9);
        assert_eq!(profile.steps().len(), 2);
    }
}
