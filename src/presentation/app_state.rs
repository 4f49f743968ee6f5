// Application state for HTTP handlers
use crate::application::live_feed::LiveFeedPoller;
use crate::application::registration_service::{RegistrationForm, RegistrationService};
use crate::application::training_service::TrainingOrchestrator;
use crate::application::workbench_service::WorkbenchService;
use crate::infrastructure::config::WorkbenchConfig;
use std::sync::{Arc, Mutex};

/// One workbench session per process.
pub struct AppState {
    pub config: WorkbenchConfig,
    pub workbench: WorkbenchService,
    pub training: TrainingOrchestrator,
    pub live_feed: LiveFeedPoller,
    pub registration: RegistrationService,
    pub registration_form: Mutex<RegistrationForm>,
}
