// Training backend trait and the simulated implementation
use crate::domain::model::{TrainedModel, TrainingSpec};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

#[async_trait]
pub trait TrainingBackend: Send + Sync {
    /// Wait for the next progress report and return the new percentage.
    async fn advance(&self, progress: f64) -> anyhow::Result<f64>;

    /// Produce the artifact for a run that reached 100%.
    async fn finalize(&self, spec: &TrainingSpec) -> anyhow::Result<TrainedModel>;
}

/// Stand-in backend: fixed cadence, random increments, deterministic metrics.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    tick: Duration,
    max_increment: f64,
}

impl SimulatedBackend {
    pub fn new(tick: Duration, max_increment: f64) -> Self {
        Self {
            tick,
            max_increment: max_increment.max(f64::EPSILON),
        }
    }

    fn increment(&self) -> f64 {
        // (0, max]
        self.max_increment - rand::rng().random_range(0.0..self.max_increment)
    }
}

#[async_trait]
impl TrainingBackend for SimulatedBackend {
    async fn advance(&self, progress: f64) -> anyhow::Result<f64> {
        tokio::time::sleep(self.tick).await;
        Ok(progress + self.increment())
    }

    async fn finalize(&self, spec: &TrainingSpec) -> anyhow::Result<TrainedModel> {
        let id = format!("model-{}", uuid::Uuid::new_v4().simple());
        Ok(TrainedModel::synthesize(id, spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TrainingSettings;

    #[test]
    fn test_increment_range() {
        let backend = SimulatedBackend::new(Duration::from_millis(1), 12.0);
        for _ in 0..1000 {
            let inc = backend.increment();
            assert!(inc > 0.0 && inc <= 12.0);
        }
    }

    #[tokio::test]
    async fn test_advance_increases_progress() {
        let backend = SimulatedBackend::new(Duration::from_millis(1), 12.0);
        let next = backend.advance(40.0).await.unwrap();
        assert!(next > 40.0 && next <= 52.0);
    }

    #[tokio::test]
    async fn test_finalize_ids_are_unique() {
        let backend = SimulatedBackend::new(Duration::from_millis(1), 12.0);
        let spec = TrainingSpec {
            settings: TrainingSettings::default(),
            features: vec!["IAQ".to_string()],
            label: "label".to_string(),
        };
        let a = backend.finalize(&spec).await.unwrap();
        let b = backend.finalize(&spec).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.metrics, b.metrics);
    }
}
