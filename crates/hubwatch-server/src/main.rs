//! Hubwatch server binary

use hubwatch_server::{Config, HubwatchServer, setup_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration first (needed for logging settings)
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Can't use tracing yet - not initialized
            eprintln!("Configuration error: {}", e);
            eprintln!("Using default configuration");
            Config::default()
        }
    };

    let _telemetry_guard = setup_tracing(&config.logging, &config.telemetry)
        .map_err(|e| e.to_string())?;

    tracing::info!(
        controllers = config.controllers.len(),
        interval_secs = config.monitor.interval.as_secs(),
        "Hubwatch server starting"
    );

    let server = HubwatchServer::new(config)?;
    server.run().await?;

    // Telemetry guard will flush spans on drop

    Ok(())
}
