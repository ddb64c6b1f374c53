use balancebook::config;
use balancebook::core::propagator::{PropagatorSettings, run_propagator};
use balancebook::errors::Result;
use dotenvy::dotenv;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Backlog of emitted facts awaiting propagation.
const EVENT_QUEUE_DEPTH: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()?;
    info!("Successfully processed application configuration.");

    // 4. Initialize the database
    let db = config::database::create_connection(&app_config.database_url).await?;
    config::database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    // 5. Start the propagation worker
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let settings = PropagatorSettings::from_config(&app_config.propagator);
    let worker = tokio::spawn(run_propagator(db.clone(), event_rx, shutdown_rx, settings));
    info!("Propagation worker started.");

    // The event sender would be handed to whatever surface drives commands
    // (an HTTP layer, a CLI); for now the process just runs the worker.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping worker.");

    drop(event_tx);
    let _ = shutdown_tx.send(true);
    let _ = worker.await;
    info!("Propagation worker stopped cleanly.");
    Ok(())
}
