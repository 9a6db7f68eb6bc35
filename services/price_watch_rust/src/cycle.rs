//! One fetch -> search -> notify pass.

use futures_util::future::join_all;
use log::{error, info, warn};
use price_watch_core::{search, FeedSource, PlatformResults};

use crate::config::Config;
use crate::formatters::format_body;
use crate::mailer::{MailConnector, MailSession};

/// What happened during a cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Platforms whose feed was fetched and searched
    pub searched: Vec<String>,
    /// Platforms skipped for lack of a watchlist
    pub skipped: Vec<String>,
    /// Platforms whose feed could not be fetched or parsed
    pub failed_feeds: Vec<String>,
    pub results: PlatformResults,
    pub session_opened: bool,
    pub sent: usize,
    pub send_errors: usize,
}

impl CycleReport {
    pub fn matched_platforms(&self) -> usize {
        self.results.values().filter(|titles| !titles.is_empty()).count()
    }
}

/// Run a full cycle. Errors are contained per platform and per message.
pub async fn run_cycle(
    config: &Config,
    feeds: &dyn FeedSource,
    mailer: &dyn MailConnector,
) -> CycleReport {
    let mut report = CycleReport::default();
    search_platforms(config, feeds, &mut report).await;
    notify(config, mailer, &mut report).await;
    report
}

async fn search_platforms(config: &Config, feeds: &dyn FeedSource, report: &mut CycleReport) {
    let mut pending = Vec::new();
    for (platform, url) in &config.feeds {
        match config.watchlist(platform) {
            Some(games) => {
                info!("Generating {} feed", platform);
                pending.push((platform, url, games));
            }
            None => {
                info!("Empty game list for {}", platform);
                report.skipped.push(platform.clone());
            }
        }
    }

    // Fetches are independent; run them together and collect before sending.
    let fetched = join_all(pending.into_iter().map(|(platform, url, games)| async move {
        (platform, games, feeds.fetch(url).await)
    }))
    .await;

    for (platform, games, outcome) in fetched {
        match outcome {
            Ok(entries) => {
                info!("Searching for {} prices", platform);
                let titles = search(&entries, games);
                info!("{}: {} match(es) in {} entries", platform, titles.len(), entries.len());
                report.searched.push(platform.clone());
                report.results.insert(platform.clone(), titles);
            }
            Err(e) => {
                warn!("Skipping {}: feed fetch failed: {}", platform, e);
                report.failed_feeds.push(platform.clone());
            }
        }
    }
}

async fn notify(config: &Config, mailer: &dyn MailConnector, report: &mut CycleReport) {
    let pending: Vec<(&String, &Vec<String>)> = report
        .results
        .iter()
        .filter(|(_, titles)| !titles.is_empty())
        .collect();

    if pending.is_empty() {
        info!("No new prices found");
        return;
    }

    let mut session = match MailSession::open(mailer, &config.mail).await {
        Ok(session) => session,
        Err(e) => {
            error!("Could not open mail session, no mail sent this cycle: {}", e);
            return;
        }
    };

    let mut sent = 0;
    let mut send_errors = 0;
    for (platform, titles) in pending {
        let body = format_body(platform, titles);
        match session.send(platform, &body).await {
            Ok(()) => sent += 1,
            Err(e) => {
                error!("Failed to send mail for {}: {}", platform, e);
                send_errors += 1;
            }
        }
    }

    if let Err(e) = session.close().await {
        warn!("Error while closing mail session: {}", e);
    }

    report.session_opened = true;
    report.sent = sent;
    report.send_errors = send_errors;
}
