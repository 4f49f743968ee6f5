// Trained model artifact and the settings that shape a training run
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Regression,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub task: TaskType,
    pub algorithm: String,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            task: TaskType::Classification,
            algorithm: "random_forest".to_string(),
        }
    }
}

/// Snapshot of everything a run needs at the moment it completes.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSpec {
    pub settings: TrainingSettings,
    pub features: Vec<String>,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    Classification { accuracy: f64, f1: f64, auc: f64 },
    Regression { rmse: f64, r2: f64 },
}

/// Immutable output of one completed run. The next run supersedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub id: String,
    #[serde(rename = "type")]
    pub task: TaskType,
    pub algorithm: String,
    pub features: Vec<String>,
    pub label: String,
    pub metrics: Metrics,
}

impl TrainedModel {
    /// Build an artifact whose metrics depend only on the spec.
    pub fn synthesize(id: String, spec: &TrainingSpec) -> Self {
        let mut hasher = DefaultHasher::new();
        spec.settings.hash(&mut hasher);
        spec.features.hash(&mut hasher);
        spec.label.hash(&mut hasher);
        let seed = hasher.finish();

        // Two independent fractions in [0, 1) drawn from the seed bits.
        let a = (seed & 0xffff) as f64 / 65536.0;
        let b = ((seed >> 16) & 0xffff) as f64 / 65536.0;

        let metrics = match spec.settings.task {
            TaskType::Classification => {
                let accuracy = round3(0.82 + 0.15 * a);
                Metrics::Classification {
                    accuracy,
                    f1: round3(accuracy - 0.01 - 0.03 * b),
                    auc: round3((accuracy + 0.02 + 0.02 * b).min(0.999)),
                }
            }
            TaskType::Regression => Metrics::Regression {
                rmse: round3(0.4 + 2.0 * a),
                r2: round3(0.70 + 0.27 * b),
            },
        };

        Self {
            id,
            task: spec.settings.task,
            algorithm: spec.settings.algorithm.clone(),
            features: spec.features.clone(),
            label: spec.label.clone(),
            metrics,
        }
    }
}

impl Hash for TrainingSettings {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.task.hash(state);
        self.algorithm.hash(state);
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
