//! Adaptive Intersection - Main Entry Point

use intersectiond::settings::IntersectionSettings;
use intersectiond::{event_sink, init_logging, run};
use signal_core::Shutdown;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = IntersectionSettings::load(config_path.as_deref())?;
    init_logging(&settings)?;

    info!("=== Adaptive Intersection v{} ===", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Settings loaded from {}", path.display()),
        None => info!("Using built-in settings"),
    }

    let shutdown = Arc::new(Shutdown::new());
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => on_ctrl_c.trigger(),
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let sink = event_sink(settings.event_stream);
    let stats = run(settings, sink, &shutdown).await?;

    info!(
        "Intersection stopped: {} cycles, {} signal changes, {} emergency preemptions",
        stats.total_cycles, stats.transitions, stats.preemptions
    );
    Ok(())
}
