// HTTP request handlers
use crate::application::export_service::{self, ExportFormat};
use crate::application::live_feed::LiveFeedConfig;
use crate::application::registration_service::RegistrationForm;
use crate::application::training_service::{StartOutcome, TrainingState, TrainingStatus};
use crate::domain::access::{Role, SessionContext};
use crate::domain::curation::CurationView;
use crate::domain::dataset::{Dataset, Row};
use crate::domain::error::WorkbenchError;
use crate::domain::heater::{HeaterProfile, HeaterStep, StepField};
use crate::domain::live::{AbsentPolicy, LiveBuffer};
use crate::domain::manifest::ManifestDraft;
use crate::domain::model::TrainingSettings;
use crate::infrastructure::chunked_json::stream_from_watch;
use crate::infrastructure::http_response::{accepts_brotli, artifact_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, MutexGuard};

pub const ROLE_HEADER: &str = "x-workbench-role";
const PREVIEW_ROWS: usize = 50;

type ApiResult<T> = Result<Json<T>, WorkbenchError>;

/// Session context from the role header; unknown or missing roles are viewers.
pub fn session(headers: &HeaderMap) -> SessionContext {
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(Role::parse)
        .unwrap_or_default();
    SessionContext::new(role)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub preview: Vec<Row>,
}

impl From<&Dataset> for DatasetSummary {
    fn from(dataset: &Dataset) -> Self {
        Self {
            columns: dataset.columns.clone(),
            row_count: dataset.len(),
            preview: dataset.rows.iter().take(PREVIEW_ROWS).cloned().collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteLoadRequest {
    pub prefix: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnRequest {
    pub column: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStepRequest {
    pub field: StepField,
    pub value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaterView {
    pub steps: Vec<HeaterStep>,
    pub total_duration_ms: u64,
}

impl From<HeaterProfile> for HeaterView {
    fn from(profile: HeaterProfile) -> Self {
        Self {
            total_duration_ms: profile.total_duration_ms(),
            steps: profile.steps().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub outcome: StartOutcome,
    pub status: TrainingStatus,
}

/// Fields left out fall back to the configured live feed settings.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveFeedRequest {
    pub base_url: Option<String>,
    pub device_id: Option<String>,
    pub poll_ms: Option<u64>,
    pub absent_policy: Option<AbsentPolicy>,
}

impl LiveFeedRequest {
    fn merge(self, base: LiveFeedConfig) -> LiveFeedConfig {
        LiveFeedConfig {
            base_url: self.base_url.unwrap_or(base.base_url),
            device_id: self.device_id.unwrap_or(base.device_id),
            poll_ms: self.poll_ms.unwrap_or(base.poll_ms),
            absent_policy: self.absent_policy.unwrap_or(base.absent_policy),
            limit: base.limit,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveView {
    pub running: bool,
    pub config: Option<LiveFeedConfig>,
    pub buffer: Arc<LiveBuffer>,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResult {
    pub key: String,
    pub form: RegistrationForm,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Replace the dataset with an uploaded delimited-text body
pub async fn load_local_dataset(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Json<DatasetSummary> {
    let dataset = state.workbench.load_local(&body);
    Json(DatasetSummary::from(dataset.as_ref()))
}

/// Replace the dataset with every telemetry object under a prefix
pub async fn load_remote_dataset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RemoteLoadRequest>,
) -> ApiResult<DatasetSummary> {
    let base_url = request
        .base_url
        .unwrap_or_else(|| state.config.remote.base_url.clone());
    let prefix = request
        .prefix
        .unwrap_or_else(|| state.config.remote.s3_prefix.clone());

    let dataset = state.workbench.load_remote(&base_url, &prefix).await?;
    Ok(Json(DatasetSummary::from(dataset.as_ref())))
}

pub async fn get_dataset(State(state): State<Arc<AppState>>) -> Json<DatasetSummary> {
    Json(DatasetSummary::from(state.workbench.dataset().as_ref()))
}

pub async fn get_curation(State(state): State<Arc<AppState>>) -> Json<CurationView> {
    Json(state.workbench.curation())
}

pub async fn set_label(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ColumnRequest>,
) -> ApiResult<CurationView> {
    if !state.workbench.set_label(&request.column) {
        return Err(WorkbenchError::Validation(format!(
            "unknown column '{}'",
            request.column
        )));
    }
    Ok(Json(state.workbench.curation()))
}

/// Toggling the label column leaves the selection unchanged
pub async fn toggle_feature(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ColumnRequest>,
) -> Json<CurationView> {
    state.workbench.toggle_feature(&request.column);
    Json(state.workbench.curation())
}

pub async fn get_heater(State(state): State<Arc<AppState>>) -> Json<HeaterView> {
    Json(state.workbench.heater_profile().into())
}

pub async fn add_heater_step(State(state): State<Arc<AppState>>) -> Json<HeaterView> {
    Json(state.workbench.add_heater_step().into())
}

pub async fn update_heater_step(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(request): Json<UpdateStepRequest>,
) -> Json<HeaterView> {
    Json(
        state
            .workbench
            .update_heater_step(index, request.field, request.value)
            .into(),
    )
}

pub async fn remove_heater_step(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Json<HeaterView> {
    Json(state.workbench.remove_heater_step(index).into())
}

pub async fn get_training_settings(State(state): State<Arc<AppState>>) -> Json<TrainingSettings> {
    Json(state.training.settings())
}

pub async fn put_training_settings(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<TrainingSettings>,
) -> Json<TrainingSettings> {
    state.training.set_settings(settings);
    Json(state.training.settings())
}

pub async fn start_training(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StartResponse> {
    let outcome = state.training.start(&session(&headers))?;
    Ok(Json(StartResponse {
        outcome,
        status: state.training.status(),
    }))
}

pub async fn cancel_training(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> ApiResult<TrainingStatus> {
    state.training.cancel(&session(&headers))?;
    Ok(Json(state.training.status()))
}

pub async fn training_status(State(state): State<Arc<AppState>>) -> Json<TrainingStatus> {
    Json(state.training.status())
}

/// Stream status updates until the run leaves the active states
pub async fn training_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_from_watch(state.training.subscribe(), |status: &TrainingStatus| {
        !matches!(status.state, TrainingState::Running | TrainingState::Cancelling)
    })
}

pub async fn start_live(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LiveFeedRequest>,
) -> ApiResult<LiveView> {
    let base = state
        .live_feed
        .config()
        .unwrap_or_else(|| state.config.live_feed());
    state.live_feed.start(request.merge(base))?;
    Ok(Json(live_view(&state)))
}

/// Restart a running feed with changed parameters
pub async fn update_live(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LiveFeedRequest>,
) -> ApiResult<LiveView> {
    if let Some(current) = state.live_feed.config() {
        state.live_feed.update_config(request.merge(current))?;
    }
    Ok(Json(live_view(&state)))
}

pub async fn stop_live(State(state): State<Arc<AppState>>) -> Json<LiveView> {
    state.live_feed.stop();
    Json(live_view(&state))
}

pub async fn get_live(State(state): State<Arc<AppState>>) -> Json<LiveView> {
    Json(live_view(&state))
}

/// Stream every buffer replacement for as long as the client stays connected
pub async fn live_events(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_from_watch(state.live_feed.subscribe(), |_: &Arc<LiveBuffer>| false)
}

fn live_view(state: &AppState) -> LiveView {
    LiveView {
        running: state.live_feed.is_running(),
        config: state.live_feed.config(),
        buffer: state.live_feed.buffer(),
    }
}

/// Download the latest model. 204 when no run has completed yet.
pub async fn export_model(
    headers: HeaderMap,
    Path(format): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(format) = ExportFormat::parse(&format) else {
        return WorkbenchError::Validation(format!("unsupported export format '{}'", format))
            .into_response();
    };

    let model = state.training.model();
    let profile = state.workbench.heater_profile();
    let artifact = match export_service::export(
        &session(&headers),
        format,
        model.as_ref(),
        &profile,
        chrono::Utc::now(),
    ) {
        Ok(Some(artifact)) => artifact,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(e) => return e.into_response(),
    };

    match artifact_response(artifact, accepts_brotli(&headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

pub async fn get_registration_form(State(state): State<Arc<AppState>>) -> Json<RegistrationForm> {
    Json(form(&state).clone())
}

/// Open the form with the operator's draft
pub async fn put_registration_form(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ManifestDraft>,
) -> Json<RegistrationForm> {
    let mut form = form(&state);
    form.open_with(draft);
    Json(form.clone())
}

/// Validate, authorize and upload the drafted manifest
pub async fn submit_registration(
    State(state): State<Arc<AppState>>,
) -> ApiResult<RegistrationResult> {
    let (manifest, submitted) = {
        let mut form = form(&state);
        (form.prepare(chrono::Utc::now())?, form.draft.clone())
    };

    let result = state
        .registration
        .register(&state.config.remote.base_url, &manifest)
        .await;

    let mut form = form(&state);
    match result {
        Ok(key) => {
            if !form.complete(&submitted) {
                tracing::debug!("Registration draft changed during upload, keeping it");
            }
            Ok(Json(RegistrationResult {
                key,
                form: form.clone(),
            }))
        }
        Err(e) => {
            tracing::error!("Device registration failed: {}", e);
            form.fail(&e);
            Err(e)
        }
    }
}

fn form(state: &AppState) -> MutexGuard<'_, RegistrationForm> {
    state
        .registration_form
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}
