// Media extraction runner
//
// Usage: kodegen-mediascrape <config.json> [previous-report.json]
//
// Runs every start URL in the config with the generic handler and prints the
// run report as JSON. Ctrl-C stops the run and still prints partial results.
// Passing the report of an interrupted run continues where it stopped.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kodegen_tools_mediascrape::{
    ChromiumSessionFactory, HandlerRegistry, RunController, RunReport, ScrapeConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .context("usage: kodegen-mediascrape <config.json> [previous-report.json]")?;
    let config = ScrapeConfig::from_json_file(&config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    let factory = Arc::new(
        ChromiumSessionFactory::launch(&config)
            .await
            .context("Failed to launch browser")?,
    );
    let mut controller = RunController::new(config, HandlerRegistry::new(), factory)?;
    if let Some(previous_path) = std::env::args().nth(2) {
        let previous = RunReport::load(&previous_path)?;
        tracing::info!(
            items = previous.items.len(),
            "Resuming from {previous_path}"
        );
        controller = controller.resume_from(previous);
    }

    let token = controller.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after current operations");
            token.cancel();
        }
    });

    let report = controller.run().await;
    println!("{}", report.to_json());

    if report.is_partial() {
        tracing::warn!(
            cancelled = report.cancelled,
            timed_out = report.timed_out,
            "Run ended early; results are partial"
        );
    }
    Ok(())
}
