use crate::application::live_feed::{LiveFeedConfig, DEFAULT_POLL_MS, DEFAULT_RECENT_LIMIT};
use crate::domain::live::AbsentPolicy;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WorkbenchConfig {
    pub server: ServerSettings,
    pub remote: RemoteSettings,
    pub live: LiveSettings,
    pub training: TrainingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RemoteSettings {
    pub base_url: String,
    pub s3_prefix: String,
    pub device_id: String,
    pub poll_ms: u64,
    pub recent_limit: usize,
    pub request_timeout_ms: u64,
    pub data_extension: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            s3_prefix: "telemetry/".to_string(),
            device_id: String::new(),
            poll_ms: DEFAULT_POLL_MS,
            recent_limit: DEFAULT_RECENT_LIMIT,
            request_timeout_ms: 10_000,
            data_extension: ".json".to_string(),
        }
    }
}

impl RemoteSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LiveSettings {
    pub absent_policy: AbsentPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrainingConfig {
    pub tick_ms: u64,
    pub max_increment: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            max_increment: 12.0,
        }
    }
}

impl TrainingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl WorkbenchConfig {
    /// Live feed parameters as configured; request bodies may override them.
    pub fn live_feed(&self) -> LiveFeedConfig {
        LiveFeedConfig {
            base_url: self.remote.base_url.clone(),
            device_id: self.remote.device_id.clone(),
            poll_ms: self.remote.poll_ms,
            limit: self.remote.recent_limit,
            absent_policy: self.live.absent_policy,
        }
    }
}

/// Layer `config/workbench.*` (optional) under `WORKBENCH__*` environment variables.
pub fn load_workbench_config() -> anyhow::Result<WorkbenchConfig> {
    load_from("config/workbench")
}

fn load_from(path: &str) -> anyhow::Result<WorkbenchConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("WORKBENCH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let cfg = load_from("config/does-not-exist").unwrap();
        assert_eq!(cfg.remote.poll_ms, 3000);
        assert_eq!(cfg.remote.s3_prefix, "telemetry/");
        assert_eq!(cfg.training.tick_ms, 500);
        assert_eq!(cfg.live.absent_policy, AbsentPolicy::TreatAsZero);
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_file_overrides() {
        let dir = std::env::temp_dir().join(format!("workbench-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("workbench.toml");
        std::fs::write(
            &file,
            "[remote]\nbase_url = \"http://api\"\ndevice_id = \"bme-01\"\npoll_ms = 1000\n\n[live]\nabsent_policy = \"ignore_absent\"\n",
        )
        .unwrap();

        let cfg = load_from(dir.join("workbench").to_str().unwrap()).unwrap();
        let live = cfg.live_feed();
        assert_eq!(live.base_url, "http://api");
        assert_eq!(live.device_id, "bme-01");
        assert_eq!(live.poll_ms, 1000);
        assert_eq!(live.limit, 30);
        assert_eq!(live.absent_policy, AbsentPolicy::IgnoreAbsent);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
