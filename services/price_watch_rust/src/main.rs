use anyhow::{Context, Result};
use dotenv::dotenv;
use log::info;
use price_watch_core::FeedClient;
use price_watch_rust::config::config_path;
use price_watch_rust::{CycleScheduler, SmtpConnector};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    info!("Starting price watch service...");

    let feeds = Arc::new(FeedClient::new().context("Failed to create HTTP client")?);
    let mailer = Arc::new(SmtpConnector::default());
    let scheduler = CycleScheduler::new(config_path(), feeds, mailer);

    tokio::select! {
        result = scheduler.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    }
}
