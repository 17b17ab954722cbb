//! borgweb - backup status dashboard backend
//!
//! Aggregates the state of borg repositories into a single cached JSON report.

mod borg;
mod config;
mod report;
mod runlog;
mod web;

use borg::BorgClient;
use config::ServerConfig;
use report::ReportBuilder;
use runlog::LogDirectory;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("borgweb=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    let report_cfg = cfg.report_config()?;
    tracing::info!("Starting borgweb on port {}...", cfg.http_port);
    tracing::info!(
        "Watching {} repositories, status cache at {} (ttl {:?})",
        report_cfg.repositories.len(),
        report_cfg.cache_path.display(),
        report_cfg.cache_ttl
    );

    let query = Arc::new(BorgClient::new(cfg.borg_path.clone(), cfg.borg_timeout));
    let run_log = Arc::new(LogDirectory::new(cfg.log_dir.clone()));
    let builder = Arc::new(ReportBuilder::new(report_cfg, query, run_log));

    // Start web server
    let server = Server::new(cfg, builder);
    server.start().await?;

    Ok(())
}
