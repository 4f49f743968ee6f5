// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::live_feed::LiveFeedPoller;
use crate::application::registration_service::{RegistrationForm, RegistrationService};
use crate::application::remote_loader::RemoteDatasetLoader;
use crate::application::training_backend::SimulatedBackend;
use crate::application::training_service::TrainingOrchestrator;
use crate::application::workbench_service::WorkbenchService;
use crate::infrastructure::config::load_workbench_config;
use crate::infrastructure::http_store::HttpStoreConnector;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_workbench_config()?;

    // Create store adapter (infrastructure layer)
    let connector = Arc::new(HttpStoreConnector::new(config.remote.request_timeout())?);

    // Create services (application layer)
    let workbench = WorkbenchService::new(RemoteDatasetLoader::new(
        connector.clone(),
        config.remote.data_extension.clone(),
    ));
    let backend = Arc::new(SimulatedBackend::new(
        config.training.tick(),
        config.training.max_increment,
    ));
    let training = TrainingOrchestrator::new(backend, workbench.curation_handle());
    let live_feed = LiveFeedPoller::new(connector.clone());
    let registration = RegistrationService::new(connector);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;

    // Create application state
    let state = Arc::new(AppState {
        config,
        workbench,
        training,
        live_feed,
        registration,
        registration_form: Mutex::new(RegistrationForm::default()),
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/dataset", get(get_dataset))
        .route("/dataset/local", post(load_local_dataset))
        .route("/dataset/remote", post(load_remote_dataset))
        .route("/curation", get(get_curation))
        .route("/curation/label", put(set_label))
        .route("/curation/features/toggle", post(toggle_feature))
        .route("/heater/steps", get(get_heater).post(add_heater_step))
        .route(
            "/heater/steps/:index",
            patch(update_heater_step).delete(remove_heater_step),
        )
        .route(
            "/training/settings",
            get(get_training_settings).put(put_training_settings),
        )
        .route("/training", get(training_status))
        .route("/training/start", post(start_training))
        .route("/training/cancel", post(cancel_training))
        .route("/training/events", get(training_events))
        .route("/live", get(get_live))
        .route("/live/start", post(start_live))
        .route("/live/stop", post(stop_live))
        .route("/live/config", put(update_live))
        .route("/live/events", get(live_events))
        .route("/export/:format", get(export_model))
        .route(
            "/devices/form",
            get(get_registration_form).put(put_registration_form),
        )
        .route("/devices/form/submit", post(submit_registration))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    tracing::info!("Starting sensor-workbench on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
