//! Engine run command handler.

use barker::{Engine, EngineConfig, EngineEvent, JsonContentSource, NoOpAdapter};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Run the engine with dry-run adapters until Ctrl-C.
///
/// Every enabled channel gets a [`NoOpAdapter`]; content comes from the JSON
/// catalog at `content`.
///
/// # Errors
///
/// Returns error if the configuration is invalid, the engine cannot start,
/// or the final flush fails.
pub async fn run_engine(
    config: EngineConfig,
    content: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let channels = config.enabled_channels();
    let mut builder = Engine::builder()
        .config(config)
        .source(Arc::new(JsonContentSource::new(content)));
    for channel in &channels {
        builder = builder.adapter(Arc::new(NoOpAdapter::new(*channel)));
    }
    let engine = builder.build().await?;

    let report = engine.load_report();
    if report.recovered {
        warn!(
            reason = report.reason.as_deref().unwrap_or("unknown"),
            quarantined_to = report.quarantined_to.as_deref().unwrap_or("-"),
            "Started from fresh state"
        );
    }

    let mut events = engine.events().subscribe();
    let watcher = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::PatternSuspicious { channel, report }) => {
                    warn!(
                        %channel,
                        variance_hours = report.variance_hours,
                        "Consider widening this channel's windows"
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => warn!(missed, "Event watcher lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    engine.start().await?;
    info!(channels = ?channels, content = %content.display(), "Barker running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    engine.stop().await?;
    watcher.abort();
    Ok(())
}
