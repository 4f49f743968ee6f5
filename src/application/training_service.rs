// Training orchestrator - Single-run state machine over a training backend
use crate::application::training_backend::TrainingBackend;
use crate::domain::access::{Capability, SessionContext};
use crate::domain::curation::Curation;
use crate::domain::error::{WorkbenchError, WorkbenchResult};
use crate::domain::model::{TrainedModel, TrainingSettings, TrainingSpec};
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::watch;

const COMPLETE: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TrainingState {
    Idle,
    Running,
    Cancelling,
    Completed { model_id: String },
    Failed { reason: String },
}

impl TrainingState {
    fn is_active(&self) -> bool {
        matches!(self, TrainingState::Running | TrainingState::Cancelling)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStatus {
    #[serde(flatten)]
    pub state: TrainingState,
    pub progress: f64,
}

impl TrainingStatus {
    fn idle() -> Self {
        Self {
            state: TrainingState::Idle,
            progress: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

struct Inner {
    backend: Arc<dyn TrainingBackend>,
    curation: Arc<RwLock<Curation>>,
    settings: RwLock<TrainingSettings>,
    status: watch::Sender<TrainingStatus>,
    model: RwLock<Option<TrainedModel>>,
    // Cancel signal of the active run; the lock also serialises state transitions.
    run: Mutex<Option<watch::Sender<bool>>>,
}

/// At most one run is active per session. The artifact is built from the curation
/// as it stands when the run completes.
#[derive(Clone)]
pub struct TrainingOrchestrator {
    inner: Arc<Inner>,
}

impl TrainingOrchestrator {
    pub fn new(backend: Arc<dyn TrainingBackend>, curation: Arc<RwLock<Curation>>) -> Self {
        let (status, _) = watch::channel(TrainingStatus::idle());
        Self {
            inner: Arc::new(Inner {
                backend,
                curation,
                settings: RwLock::new(TrainingSettings::default()),
                status,
                model: RwLock::new(None),
                run: Mutex::new(None),
            }),
        }
    }

    pub fn status(&self) -> TrainingStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrainingStatus> {
        self.inner.status.subscribe()
    }

    pub fn model(&self) -> Option<TrainedModel> {
        read(&self.inner.model).clone()
    }

    pub fn settings(&self) -> TrainingSettings {
        read(&self.inner.settings).clone()
    }

    pub fn set_settings(&self, settings: TrainingSettings) {
        *write(&self.inner.settings) = settings;
    }

    pub fn start(&self, ctx: &SessionContext) -> WorkbenchResult<StartOutcome> {
        if !ctx.has(Capability::CanTrain) {
            tracing::warn!("Training start denied for role {:?}", ctx.role);
            return Err(WorkbenchError::CapabilityDenied(Capability::CanTrain));
        }
        if read(&self.inner.curation).label().is_none() {
            return Err(WorkbenchError::Validation(
                "select a label column before training".to_string(),
            ));
        }

        let mut run = lock(&self.inner.run);
        if self.inner.status.borrow().state.is_active() {
            tracing::debug!("Training already running, ignoring start");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *run = Some(cancel_tx);
        self.inner.status.send_replace(TrainingStatus {
            state: TrainingState::Running,
            progress: 0.0,
        });
        drop(run);

        tracing::info!("Training run started");
        tokio::spawn(Self::drive(self.inner.clone(), cancel_rx));
        Ok(StartOutcome::Started)
    }

    /// Ask the active run to stop. Returns false when nothing was running.
    pub fn cancel(&self, ctx: &SessionContext) -> WorkbenchResult<bool> {
        if !ctx.has(Capability::CanTrain) {
            return Err(WorkbenchError::CapabilityDenied(Capability::CanTrain));
        }

        let run = lock(&self.inner.run);
        let current = self.inner.status.borrow().clone();
        if current.state != TrainingState::Running {
            return Ok(false);
        }
        if let Some(cancel_tx) = run.as_ref() {
            let _ = cancel_tx.send(true);
        }
        self.inner.status.send_replace(TrainingStatus {
            state: TrainingState::Cancelling,
            progress: current.progress,
        });
        tracing::info!("Training cancellation requested at {:.1}%", current.progress);
        Ok(true)
    }

    async fn drive(inner: Arc<Inner>, mut cancel_rx: watch::Receiver<bool>) {
        let mut progress = 0.0;

        while progress < COMPLETE {
            tokio::select! {
                biased;
                _ = cancel_rx.changed() => {
                    Self::finish(&inner, TrainingStatus::idle());
                    tracing::info!("Training run cancelled");
                    return;
                }
                next = inner.backend.advance(progress) => match next {
                    Ok(next) => {
                        progress = next.clamp(progress, COMPLETE);
                        tracing::debug!("Training progress {:.1}%", progress);
                        let _ = inner.status.send_if_modified(|s| {
                            if s.state == TrainingState::Running {
                                s.progress = progress;
                                true
                            } else {
                                false
                            }
                        });
                    }
                    Err(e) => {
                        Self::fail(&inner, progress, format!("{:#}", e));
                        return;
                    }
                }
            }
        }

        // Snapshot the selection at completion, not at start.
        let spec = {
            let curation = read(&inner.curation);
            curation.label().map(|label| TrainingSpec {
                settings: read(&inner.settings).clone(),
                features: curation.features().iter().cloned().collect(),
                label: label.to_string(),
            })
        };
        let Some(spec) = spec else {
            Self::fail(&inner, COMPLETE, "no label column selected".to_string());
            return;
        };

        let result = tokio::select! {
            biased;
            _ = cancel_rx.changed() => None,
            result = inner.backend.finalize(&spec) => Some(result),
        };

        match result {
            None => {
                Self::finish(&inner, TrainingStatus::idle());
                tracing::info!("Training run cancelled before finalizing");
            }
            Some(Ok(model)) => {
                let model_id = model.id.clone();
                *write(&inner.model) = Some(model);
                tracing::info!("Training run completed: {}", model_id);
                Self::finish(
                    &inner,
                    TrainingStatus {
                        state: TrainingState::Completed { model_id },
                        progress: COMPLETE,
                    },
                );
            }
            Some(Err(e)) => Self::fail(&inner, COMPLETE, format!("{:#}", e)),
        }
    }

    fn fail(inner: &Inner, progress: f64, reason: String) {
        tracing::error!("Training run failed: {}", reason);
        Self::finish(
            inner,
            TrainingStatus {
                state: TrainingState::Failed { reason },
                progress,
            },
        );
    }

    fn finish(inner: &Inner, status: TrainingStatus) {
        let mut run = lock(&inner.run);
        *run = None;
        inner.status.send_replace(status);
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
