//! Process wiring for the hubwatch server.

use crate::config::Config;
use crate::events::BroadcastBus;
use crate::http_server::{ApiServer, ApiState};
use crate::metrics::MetricsRegistry;
use crate::monitor::HealthMonitor;
use crate::store::MemoryStore;
use discovery::DiscoveryService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything the process builds once at startup
pub struct AppContext {
    pub store: Arc<MemoryStore>,
    pub bus: Arc<BroadcastBus>,
    pub metrics: Arc<MetricsRegistry>,
    pub monitor: Arc<HealthMonitor>,
    pub discovery: Arc<DiscoveryService>,
}

impl AppContext {
    /// Build all components from configuration
    pub fn build(config: &Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let store = Arc::new(MemoryStore::with_records(config.records()));
        let bus = Arc::new(BroadcastBus::new(config.events.capacity));
        let metrics = Arc::new(MetricsRegistry::new());

        let monitor = HealthMonitor::new(store.clone(), bus.clone(), config.to_monitor_options())
            .with_metrics(metrics.clone());
        let discovery = DiscoveryService::new(config.to_discovery_options())?;

        info!(controllers = store.len(), "Controller store loaded");

        Ok(Self {
            store,
            bus,
            metrics,
            monitor: Arc::new(monitor),
            discovery: Arc::new(discovery),
        })
    }
}

/// Hubwatch server
pub struct HubwatchServer {
    config: Config,
    context: AppContext,
}

impl HubwatchServer {
    /// Create a new server from configuration
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let context = AppContext::build(&config)?;
        Ok(Self { config, context })
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Run until `shutdown` completes, then stop everything
    pub async fn run_until(
        self,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Starting hubwatch server");

        let cancel = CancellationToken::new();
        let http_handle = self.spawn_http(cancel.clone());

        self.context.monitor.start().await;
        info!("Hubwatch server running");

        shutdown.await;
        info!("Shutdown requested");

        self.context.monitor.stop().await;
        cancel.cancel();
        if let Some(handle) = http_handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "HTTP server task failed");
            }
        }

        info!("Hubwatch server stopped");
        Ok(())
    }

    fn spawn_http(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.config.http.enabled {
            info!("HTTP server disabled");
            return None;
        }

        let state = ApiState {
            metrics: self.context.metrics.clone(),
            discovery: self.context.discovery.clone(),
            monitor: self.context.monitor.clone(),
            default_window: self.config.discovery.listen_window,
        };
        let server = ApiServer::new(state, self.config.http.listen_addr.clone());

        Some(tokio::spawn(async move {
            if let Err(e) = server.run(cancel).await {
                warn!(error = %e, "HTTP server error");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerSeed;

    #[tokio::test]
    async fn test_context_seeds_store() {
        let mut config = Config::default();
        config.controllers.push(ControllerSeed {
            id: "hub".into(),
            url: "http://10.0.0.5:8123".into(),
            credential: "tok".into(),
            discovered_via: None,
        });

        let context = AppContext::build(&config).unwrap();
        assert_eq!(context.store.len(), 1);
        assert!(!context.monitor.is_running().await);
    }

    #[tokio::test]
    async fn test_run_until_stops_monitor() {
        let mut config = Config::default();
        config.http.enabled = false;

        let server = HubwatchServer::new(config).unwrap();
        let monitor = server.context().monitor.clone();

        server.run_until(async {}).await.unwrap();
        assert!(!monitor.is_running().await);
    }
}
