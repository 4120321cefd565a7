//! Binary entrypoint: one sentence per stdin line, one JSON result per stdout line.
use anyhow::Context;
use dispatch_controller::{ControllerConfig, ResilientController};
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays one JSON document per line
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = ControllerConfig::from_env().context("loading controller config")?;
    let controller = ResilientController::with_builtin_engines(config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let result = controller.process_sentence(&line, false);
        serde_json::to_writer(&mut out, &result)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }

    let stats = controller.get_processing_stats();
    tracing::info!(
        total = stats.total_requests,
        successful = stats.successful_processes,
        fallbacks = stats.fallback_activations,
        avg_ms = stats.average_processing_time,
        "input exhausted"
    );
    Ok(())
}
