//! Periodic health monitor for registered controllers.

use crate::events::{EventBus, STATUS_CHANNEL};
use crate::metrics::MetricsRegistry;
use crate::store::ControllerStore;
use crate::types::{CheckOutcome, ControllerSummary, StatusChange, StatusUpdate, SweepReport};
use chrono::Utc;
use common::{Error, Result};
use controller::{ClientOptions, ControllerClient, HostResolver, SystemResolver};
use futures::{FutureExt, StreamExt, future, stream};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Monitor tuning
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOptions {
    /// Pause between the end of one sweep and the start of the next
    pub interval: Duration,

    /// Timeouts for each controller call
    pub client: ClientOptions,

    /// Controllers checked at once within a sweep
    pub max_concurrent_checks: usize,

    /// Channel status changes are published on
    pub channel: String,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            client: ClientOptions::default(),
            max_concurrent_checks: 1,
            channel: STATUS_CHANNEL.to_string(),
        }
    }
}

/// Keeps each controller's stored status in line with reality and
/// publishes transitions.
///
/// One background loop per monitor: sweep every controller, sleep,
/// repeat until stopped. Errors never end the loop.
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
    task: Mutex<Option<RunningTask>>,
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
struct MonitorInner {
    store: Arc<dyn ControllerStore>,
    bus: Arc<dyn EventBus>,
    resolver: Arc<dyn HostResolver>,
    options: MonitorOptions,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl HealthMonitor {
    /// Create a new monitor. Nothing runs until [`start`](Self::start).
    pub fn new(
        store: Arc<dyn ControllerStore>,
        bus: Arc<dyn EventBus>,
        options: MonitorOptions,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                store,
                bus,
                resolver: Arc::new(SystemResolver),
                options,
                metrics: None,
            }),
            task: Mutex::new(None),
        }
    }

    /// Record checks, transitions and sweeps in `metrics`.
    pub fn with_metrics(self, metrics: Arc<MetricsRegistry>) -> Self {
        self.rebuild(|inner| inner.metrics = Some(metrics))
    }

    /// Resolve controller hostnames with `resolver`.
    pub fn with_resolver(self, resolver: Arc<dyn HostResolver>) -> Self {
        self.rebuild(|inner| inner.resolver = resolver)
    }

    fn rebuild(self, f: impl FnOnce(&mut MonitorInner)) -> Self {
        let mut inner = MonitorInner::clone(&self.inner);
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
            task: self.task,
        }
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.inner.options
    }

    /// Start the background loop. Does nothing if already running.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("Health monitor already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.inner).run(cancel.clone()));
        *task = Some(RunningTask { cancel, handle });
    }

    /// Stop the loop and wait for it to unwind.
    ///
    /// An in-flight check is allowed to finish; a pending sleep is cut
    /// short. Safe to call when not running. The lifecycle lock is held
    /// until the loop has exited, so a concurrent `start` or `stop` waits.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        let Some(running) = task.take() else {
            return;
        };

        running.cancel.cancel();
        match running.handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "Health monitor task ended abnormally"),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Run one sweep now, outside the loop.
    pub async fn run_sweep(&self) -> Result<SweepReport> {
        self.inner.sweep(&CancellationToken::new()).await
    }

    /// Check, persist and announce a single controller.
    pub async fn check_controller(&self, summary: &ControllerSummary) -> CheckOutcome {
        self.inner.check(summary).await
    }
}

impl MonitorInner {
    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            interval_secs = self.options.interval.as_secs(),
            "Health monitor started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.sweep(&cancel).await {
                Ok(report) => debug!(
                    checked = report.checked,
                    online = report.online,
                    offline = report.offline,
                    error = report.error,
                    transitions = report.transitions,
                    "Sweep complete"
                ),
                Err(e) => {
                    warn!(error = %e, "Sweep failed");
                    if let Some(ref m) = self.metrics {
                        m.record_error("sweep");
                    }
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(self.options.interval) => {}
            }
        }

        info!("Health monitor stopped");
    }

    async fn sweep(&self, cancel: &CancellationToken) -> Result<SweepReport> {
        let start = Instant::now();
        let controllers = self.store.list_controllers().await?;
        let total = controllers.len();

        // Never check the same controller twice in one sweep
        let mut seen = HashSet::new();
        let controllers: Vec<_> = controllers
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect();

        let checks = stream::iter(controllers)
            .take_while(|_| future::ready(!cancel.is_cancelled()))
            .map(|summary| async move { self.check(&summary).await })
            .buffer_unordered(self.options.max_concurrent_checks.max(1));
        let mut checks = pin!(checks);

        let mut report = SweepReport::default();
        while let Some(outcome) = checks.next().await {
            report.record(&outcome);
        }

        if let Some(ref m) = self.metrics {
            m.record_sweep(total, start.elapsed());
        }
        Ok(report)
    }

    async fn check(&self, summary: &ControllerSummary) -> CheckOutcome {
        let start = Instant::now();

        let update = match AssertUnwindSafe(self.probe(summary)).catch_unwind().await {
            Ok(Ok(update)) => update,
            Ok(Err(e)) => {
                warn!(id = %summary.id, error = %e, "Controller check failed unexpectedly");
                StatusUpdate::error(e.to_string(), Utc::now())
            }
            Err(panic) => {
                let detail = format!("Unexpected error: {}", panic_message(panic.as_ref()));
                warn!(id = %summary.id, error = %detail, "Controller check panicked");
                StatusUpdate::error(detail, Utc::now())
            }
        };

        let status = update.status;
        let last_error = update.last_error.clone();
        if let Some(ref m) = self.metrics {
            m.record_check(status, start.elapsed());
        }

        let persisted = match self.store.update_status(&summary.id, update).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %summary.id, error = %e, "Failed to persist controller status");
                if let Some(ref m) = self.metrics {
                    m.record_error("persist");
                }
                false
            }
        };

        let mut published = false;
        if persisted && status != summary.status {
            info!(
                id = %summary.id,
                old_status = %summary.status,
                new_status = %status,
                "Controller status changed"
            );
            if let Some(ref m) = self.metrics {
                m.record_transition(summary.status, status);
            }

            let change = StatusChange {
                controller_id: summary.id.clone(),
                old: summary.status,
                new: status,
            };
            published = self.publish(&change).await;
        }

        CheckOutcome {
            controller_id: summary.id.clone(),
            previous: summary.status,
            status,
            last_error,
            persisted,
            published,
        }
    }

    /// Test one controller. `Err` means something unanticipated went wrong.
    async fn probe(&self, summary: &ControllerSummary) -> Result<StatusUpdate> {
        let credential = self.store.decrypt_credential(&summary.credential).await?;
        let client = ControllerClient::with_options(&summary.url, credential, self.options.client)
            .map_err(Error::client)?
            .with_resolver(Arc::clone(&self.resolver));

        match client.test_connection().await {
            Ok(()) => {
                // Best effort; a missing version never fails the check
                let version = client.get_config().await.and_then(|config| config.version);
                Ok(StatusUpdate::online(version, Utc::now()))
            }
            Err(e) => {
                debug!(id = %summary.id, url = client.display_url(), error = %e, "Controller unreachable");
                Ok(StatusUpdate::offline(e.to_string(), Utc::now()))
            }
        }
    }

    async fn publish(&self, change: &StatusChange) -> bool {
        match self
            .bus
            .publish(&self.options.channel, &change.to_message())
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %change.controller_id, error = %e, "Failed to publish status change");
                if let Some(ref m) = self.metrics {
                    m.record_error("publish");
                }
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MockEventBus;
    use crate::store::MockControllerStore;
    use crate::types::{ConnectionStatus, CredentialRef};

    fn summary(id: &str, url: &str, status: ConnectionStatus) -> ControllerSummary {
        ControllerSummary {
            id: id.to_string(),
            url: url.to_string(),
            credential: CredentialRef("token".into()),
            status,
        }
    }

    fn monitor(store: MockControllerStore, bus: MockEventBus) -> HealthMonitor {
        HealthMonitor::new(Arc::new(store), Arc::new(bus), MonitorOptions::default())
    }

    #[tokio::test]
    async fn test_credential_failure_is_error_status() {
        let mut store = MockControllerStore::new();
        store
            .expect_decrypt_credential()
            .returning(|_| Err(Error::credential("bad key")));
        store
            .expect_update_status()
            .withf(|id, update| {
                id == "a"
                    && update.status == ConnectionStatus::Error
                    && update.last_error.as_deref() == Some("Credential error: bad key")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut bus = MockEventBus::new();
        bus.expect_publish()
            .withf(|channel, message| channel == STATUS_CHANNEL && message == "a:online:error")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = monitor(store, bus)
            .check_controller(&summary("a", "http://10.0.0.5:8123", ConnectionStatus::Online))
            .await;

        assert_eq!(outcome.status, ConnectionStatus::Error);
        assert!(outcome.persisted);
        assert!(outcome.published);
    }

    #[tokio::test]
    async fn test_invalid_url_is_error_status() {
        let mut store = MockControllerStore::new();
        store
            .expect_decrypt_credential()
            .returning(|_| Ok("token".into()));
        store
            .expect_update_status()
            .withf(|_, update| update.status == ConnectionStatus::Error)
            .returning(|_, _| Ok(()));

        let mut bus = MockEventBus::new();
        bus.expect_publish().times(0);

        let outcome = monitor(store, bus)
            .check_controller(&summary("a", "not a url", ConnectionStatus::Error))
            .await;

        assert_eq!(outcome.status, ConnectionStatus::Error);
        assert!(!outcome.published);
    }

    #[tokio::test]
    async fn test_persist_failure_suppresses_event() {
        let mut store = MockControllerStore::new();
        store
            .expect_decrypt_credential()
            .returning(|_| Err(Error::credential("bad key")));
        store
            .expect_update_status()
            .returning(|_, _| Err(Error::store("database unavailable")));

        let mut bus = MockEventBus::new();
        bus.expect_publish().times(0);

        let outcome = monitor(store, bus)
            .check_controller(&summary("a", "http://10.0.0.5:8123", ConnectionStatus::Online))
            .await;

        assert!(!outcome.persisted);
        assert!(!outcome.published);
    }

    #[tokio::test]
    async fn test_publish_failure_is_swallowed() {
        let mut store = MockControllerStore::new();
        store.expect_list_controllers().returning(|| {
            Ok(vec![
                summary("a", "http://10.0.0.5:8123", ConnectionStatus::Online),
                summary("b", "http://10.0.0.6:8123", ConnectionStatus::Online),
            ])
        });
        store
            .expect_decrypt_credential()
            .returning(|_| Err(Error::credential("bad key")));
        store.expect_update_status().times(2).returning(|_, _| Ok(()));

        let mut bus = MockEventBus::new();
        bus.expect_publish()
            .times(2)
            .returning(|_, _| Err(Error::event_bus("bus down")));

        let report = monitor(store, bus).run_sweep().await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.error, 2);
        assert_eq!(report.transitions, 0);
    }

    #[tokio::test]
    async fn test_sweep_fails_when_store_unreachable() {
        let mut store = MockControllerStore::new();
        store
            .expect_list_controllers()
            .returning(|| Err(Error::store("connection reset")));

        let result = monitor(store, MockEventBus::new()).run_sweep().await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_duplicate_ids_checked_once() {
        let mut store = MockControllerStore::new();
        store.expect_list_controllers().returning(|| {
            Ok(vec![
                summary("a", "not a url", ConnectionStatus::Error),
                summary("a", "not a url", ConnectionStatus::Error),
            ])
        });
        store
            .expect_decrypt_credential()
            .returning(|_| Ok("token".into()));
        store.expect_update_status().times(1).returning(|_, _| Ok(()));

        let report = monitor(store, MockEventBus::new()).run_sweep().await.unwrap();
        assert_eq!(report.checked, 1);
    }

    #[tokio::test]
    async fn test_loop_survives_failing_sweeps() {
        let mut store = MockControllerStore::new();
        store
            .expect_list_controllers()
            .returning(|| Err(Error::store("connection reset")));

        let options = MonitorOptions {
            interval: Duration::from_millis(10),
            ..Default::default()
        };
        let monitor = HealthMonitor::new(Arc::new(store), Arc::new(MockEventBus::new()), options);

        monitor.start().await;
        sleep(Duration::from_millis(60)).await;
        assert!(monitor.is_running().await);

        monitor.stop().await;
        assert!(!monitor.is_running().await);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
