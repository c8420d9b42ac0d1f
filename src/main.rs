//! perpscan entry point: run one scan and mail the report.

use anyhow::Result;

use perpscan::config::{MailConfig, ScanConfig};
use perpscan::data::BinanceFutures;
use perpscan::logging::init_logging;
use perpscan::report::EmailNotifier;
use perpscan::scanner::ScanEngine;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ScanConfig::from_env();
    init_logging(&config.log_level, &config.log_format);

    tracing::info!("perpscan v{}", env!("CARGO_PKG_VERSION"));

    let engine = ScanEngine::new(config, BinanceFutures::new());
    let outcome = engine.scan_once().await?;

    if outcome.candidates.is_empty() {
        tracing::info!("No candidates; nothing to send");
        return Ok(());
    }

    // Missing credentials only matter once there is something to send.
    let notifier = EmailNotifier::new(MailConfig::from_env()?);
    notifier.send_report(&outcome.candidates).await?;

    Ok(())
}
