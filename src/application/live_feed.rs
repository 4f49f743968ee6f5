// Live feed poller - Cancellable periodic fetch of recent device telemetry
use crate::application::telemetry_store::{StoreConnector, TelemetryStore};
use crate::domain::error::{WorkbenchError, WorkbenchResult};
use crate::domain::live::{aggregate, AbsentPolicy, LiveBuffer};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_POLL_MS: u64 = 3000;
pub const DEFAULT_RECENT_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveFeedConfig {
    pub base_url: String,
    pub device_id: String,
    pub poll_ms: u64,
    pub limit: usize,
    pub absent_policy: AbsentPolicy,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            device_id: String::new(),
            poll_ms: DEFAULT_POLL_MS,
            limit: DEFAULT_RECENT_LIMIT,
            absent_policy: AbsentPolicy::default(),
        }
    }
}

impl LiveFeedConfig {
    fn validate(&self) -> WorkbenchResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(WorkbenchError::Configuration(
                "baseUrl is required for live polling".to_string(),
            ));
        }
        if self.device_id.trim().is_empty() {
            return Err(WorkbenchError::Configuration(
                "deviceId is required for live polling".to_string(),
            ));
        }
        Ok(())
    }

    fn period(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

struct ActivePoll {
    config: LiveFeedConfig,
    stop_tx: watch::Sender<bool>,
}

/// Polls one device on a fixed interval and republishes the visible window.
///
/// Ticks never overlap: each poll is awaited inside the schedule loop, and missed ticks
/// are skipped. Results that arrive after `stop` are discarded.
pub struct LiveFeedPoller {
    connector: Arc<dyn StoreConnector>,
    buffer: watch::Sender<Arc<LiveBuffer>>,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActivePoll>>,
}

impl LiveFeedPoller {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        let (buffer, _) = watch::channel(Arc::new(LiveBuffer::default()));
        Self {
            connector,
            buffer,
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// Current window. Replaced atomically, never observed half-written.
    pub fn buffer(&self) -> Arc<LiveBuffer> {
        self.buffer.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<LiveBuffer>> {
        self.buffer.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.active().is_some()
    }

    pub fn config(&self) -> Option<LiveFeedConfig> {
        self.active().as_ref().map(|a| a.config.clone())
    }

    /// Start polling, restarting with a cleared buffer if already running.
    pub fn start(&self, config: LiveFeedConfig) -> WorkbenchResult<()> {
        config.validate()?;

        let mut active = self.active();
        if let Some(previous) = active.take() {
            self.halt(previous);
        }

        // New generation and cleared window land together under the buffer lock.
        let mut generation = 0;
        self.buffer.send_modify(|buffer| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *buffer = Arc::new(LiveBuffer::default());
        });
        let (stop_tx, stop_rx) = watch::channel(false);

        let store = self.connector.connect(&config.base_url);
        tracing::info!(
            "Live feed started for {} every {}ms",
            config.device_id,
            config.poll_ms
        );
        tokio::spawn(poll_loop(
            store,
            config.clone(),
            self.buffer.clone(),
            self.generation.clone(),
            generation,
            stop_rx,
        ));

        *active = Some(ActivePoll { config, stop_tx });
        Ok(())
    }

    /// Apply new settings. A running schedule restarts with them; the in-flight
    /// cadence is never adjusted in place.
    pub fn update_config(&self, config: LiveFeedConfig) -> WorkbenchResult<bool> {
        let restart = match self.config() {
            Some(current) => current != config,
            None => false,
        };
        if restart {
            self.start(config)?;
        }
        Ok(restart)
    }

    pub fn stop(&self) -> bool {
        match self.active().take() {
            Some(previous) => {
                self.halt(previous);
                tracing::info!("Live feed stopped");
                true
            }
            None => false,
        }
    }

    fn halt(&self, previous: ActivePoll) {
        // Invalidate under the buffer lock, before signalling, so an in-flight tick
        // cannot publish once this returns.
        self.buffer.send_if_modified(|_| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            false
        });
        let _ = previous.stop_tx.send(true);
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<ActivePoll>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for LiveFeedPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    store: Arc<dyn TelemetryStore>,
    config: LiveFeedConfig,
    buffer: watch::Sender<Arc<LiveBuffer>>,
    current_generation: Arc<AtomicU64>,
    generation: u64,
    mut stop_rx: watch::Receiver<bool>,
) {
    let period = config.period();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = interval.tick() => {}
        }

        let fetched = tokio::time::timeout(
            period,
            store.recent_for_device(&config.device_id, config.limit),
        )
        .await;

        if current_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Discarding live poll result from a stopped feed");
            break;
        }

        match fetched {
            Ok(Ok(records)) => {
                let points = aggregate(&records, config.absent_policy);
                tracing::debug!(
                    "Live poll for {} returned {} records",
                    config.device_id,
                    records.len()
                );
                let next = Arc::new(LiveBuffer::from_batch(points));
                if !publish(&buffer, &current_generation, generation, next) {
                    tracing::debug!("Discarding live poll result from a stopped feed");
                    break;
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Live poll for {} failed: {:#}", config.device_id, e);
            }
            Err(_) => {
                tracing::warn!(
                    "Live poll for {} timed out after {}ms",
                    config.device_id,
                    config.poll_ms
                );
            }
        }
    }
}

/// Replace the window only while `generation` is still current. The check runs under
/// the buffer lock, the same lock `halt` and `start` take to move the generation on.
fn publish(
    buffer: &watch::Sender<Arc<LiveBuffer>>,
    current_generation: &AtomicU64,
    generation: u64,
    next: Arc<LiveBuffer>,
) -> bool {
    buffer.send_if_modified(|current| {
        if current_generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *current = next;
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry_store::fakes::{FakeConnector, FakeStore};
    use crate::domain::live::LIVE_BUFFER_CAPACITY;
    use serde_json::{json, Value};
    use tokio::sync::Semaphore;

    fn record(iaq: f64) -> Value {
        json!({"timestamp": "t", "deviceId": "bme-01", "boardMode": "m",
               "sensors": [{"sensorId": 0, "airQuality": {"IAQ": iaq}}]})
    }

    fn config(poll_ms: u64) -> LiveFeedConfig {
        LiveFeedConfig {
            base_url: "http://api".to_string(),
            device_id: "bme-01".to_string(),
            poll_ms,
            ..Default::default()
        }
    }

    fn poller(store: Arc<FakeStore>) -> LiveFeedPoller {
        LiveFeedPoller::new(Arc::new(FakeConnector(store)))
    }

    async fn wait_for_len(p: &LiveFeedPoller, len: usize) {
        let mut rx = p.subscribe();
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|b| b.len() == len))
            .await
            .expect("buffer never reached expected length")
            .expect("buffer channel closed");
    }

    #[tokio::test]
    async fn test_start_requires_base_url_and_device() {
        let store = Arc::new(FakeStore::default());
        let p = poller(store.clone());

        let mut missing_url = config(10);
        missing_url.base_url.clear();
        assert!(matches!(p.start(missing_url), Err(WorkbenchError::Configuration(_))));

        let mut missing_device = config(10);
        missing_device.device_id = "  ".to_string();
        assert!(matches!(p.start(missing_device), Err(WorkbenchError::Configuration(_))));

        assert!(!p.is_running());
        assert!(store.connected_to.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_poll_is_immediate() {
        let store = Arc::new(FakeStore::default());
        store.recent.lock().unwrap().extend([record(10.0), record(20.0)]);
        let p = poller(store);
        p.start(config(60_000)).unwrap();

        wait_for_len(&p, 2).await;
        let buffer = p.buffer();
        assert_eq!(buffer.points()[0].seq, 0);
        assert_eq!(buffer.points()[1].iaq, 20.0);
        p.stop();
    }

    #[tokio::test]
    async fn test_buffer_never_exceeds_capacity() {
        let store = Arc::new(FakeStore::default());
        store
            .recent
            .lock()
            .unwrap()
            .extend((0..50).map(|i| record(i as f64)));
        let p = poller(store.clone());
        let mut cfg = config(5);
        cfg.limit = 50;
        p.start(cfg).unwrap();

        let mut rx = p.subscribe();
        for _ in 0..5 {
            rx.changed().await.unwrap();
            assert!(rx.borrow().len() <= LIVE_BUFFER_CAPACITY);
        }
        assert_eq!(p.buffer().len(), LIVE_BUFFER_CAPACITY);
        assert!(*store.recent_calls.lock().unwrap() >= 2);
        p.stop();
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_schedule_alive() {
        let store = Arc::new(FakeStore::default());
        store.recent.lock().unwrap().push(record(7.0));
        *store.fail_recent.lock().unwrap() = true;
        let p = poller(store.clone());
        p.start(config(5)).unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(p.buffer().is_empty());
        assert!(p.is_running());

        *store.fail_recent.lock().unwrap() = false;
        wait_for_len(&p, 1).await;
        p.stop();
    }

    #[tokio::test]
    async fn test_stale_response_after_stop_is_discarded() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(FakeStore {
            recent_gate: Some(gate.clone()),
            ..Default::default()
        });
        store.recent.lock().unwrap().push(record(42.0));
        let p = poller(store.clone());
        p.start(config(60_000)).unwrap();

        // wait until the first request is in flight
        while *store.recent_calls.lock().unwrap() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(p.stop());
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(p.buffer().is_empty());
        assert!(!p.is_running());
    }

    #[tokio::test]
    async fn test_hung_poll_times_out_and_schedule_continues() {
        let gate = Arc::new(Semaphore::new(0));
        let store = Arc::new(FakeStore {
            recent_gate: Some(gate.clone()),
            ..Default::default()
        });
        store.recent.lock().unwrap().push(record(5.0));
        let p = poller(store.clone());
        p.start(config(20)).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(*store.recent_calls.lock().unwrap() > 1);
        assert!(p.buffer().is_empty());
        assert!(p.is_running());

        // requests answer again: the next tick fills the window
        gate.add_permits(1_000);
        wait_for_len(&p, 1).await;
        p.stop();
    }

    #[test]
    fn test_publish_refuses_stale_generation() {
        let (buffer, mut rx) = watch::channel(Arc::new(LiveBuffer::default()));
        let generation = AtomicU64::new(3);
        let batch = || {
            let points = aggregate(&[record(9.0)], AbsentPolicy::default());
            Arc::new(LiveBuffer::from_batch(points))
        };

        assert!(!publish(&buffer, &generation, 2, batch()));
        assert!(buffer.borrow().is_empty());
        assert!(!rx.has_changed().unwrap());

        assert!(publish(&buffer, &generation, 3, batch()));
        assert_eq!(buffer.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_invalidates_generation_without_notifying() {
        // first poll stays in flight, so nothing is published meanwhile
        let store = Arc::new(FakeStore {
            recent_gate: Some(Arc::new(Semaphore::new(0))),
            ..Default::default()
        });
        let p = poller(store);
        p.start(config(60_000)).unwrap();
        let running = p.generation.load(Ordering::SeqCst);
        let mut rx = p.subscribe();
        rx.borrow_and_update();

        assert!(p.stop());
        assert!(p.generation.load(Ordering::SeqCst) > running);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_update_config_restarts_schedule() {
        let store = Arc::new(FakeStore::default());
        let p = poller(store.clone());

        // not running: nothing to restart
        assert!(!p.update_config(config(50)).unwrap());

        p.start(config(60_000)).unwrap();
        assert!(!p.update_config(config(60_000)).unwrap());

        let mut moved = config(60_000);
        moved.base_url = "http://other".to_string();
        assert!(p.update_config(moved).unwrap());
        assert_eq!(p.config().unwrap().base_url, "http://other");
        assert_eq!(
            *store.connected_to.lock().unwrap(),
            vec!["http://api".to_string(), "http://other".to_string()]
        );
        p.stop();
    }

    #[tokio::test]
    async fn test_restart_clears_buffer() {
        let store = Arc::new(FakeStore::default());
        store.recent.lock().unwrap().push(record(1.0));
        let p = poller(store.clone());
        p.start(config(60_000)).unwrap();
        wait_for_len(&p, 1).await;

        store.recent.lock().unwrap().clear();
        p.start(config(60_000)).unwrap();
        assert!(p.buffer().is_empty());
        p.stop();
    }
}
