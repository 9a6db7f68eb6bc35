//! Fixed-period cycle scheduling
//!
//! Each cycle starts `timer` seconds after the previous one started,
//! regardless of how long the previous cycle ran:
//! - Configuration is re-read at every cycle start; a bad file is fatal
//! - The cycle itself runs in its own task, so slow cycles may overlap
//! - A failing or panicking cycle never stops the next one from starting

use anyhow::{anyhow, Result};
use log::{error, info};
use price_watch_core::FeedSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::Config;
use crate::cycle::run_cycle;
use crate::mailer::MailConnector;

pub struct CycleScheduler {
    config_path: PathBuf,
    feeds: Arc<dyn FeedSource>,
    mailer: Arc<dyn MailConnector>,
}

impl CycleScheduler {
    pub fn new(
        config_path: impl Into<PathBuf>,
        feeds: Arc<dyn FeedSource>,
        mailer: Arc<dyn MailConnector>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            feeds,
            mailer,
        }
    }

    /// Run cycles forever. Returns only when the configuration cannot be loaded.
    pub async fn run(&self) -> Result<()> {
        info!("Starting price check loop (config: {})", self.config_path.display());

        loop {
            let started = Instant::now();
            let config = Config::load(&self.config_path)?;
            let next_start = started.checked_add(config.interval()).ok_or_else(|| {
                anyhow!("timer {} seconds is too far in the future to schedule", config.timer)
            })?;

            info!(
                "Starting price check cycle: feeds={} watched_platforms={}",
                config.feeds.len(),
                config.games.values().filter(|g| !g.is_empty()).count()
            );
            self.spawn_cycle(config);

            tokio::time::sleep_until(next_start).await;
        }
    }

    fn spawn_cycle(&self, config: Config) {
        let feeds = self.feeds.clone();
        let mailer = self.mailer.clone();

        let cycle = tokio::spawn(async move {
            let report = run_cycle(&config, feeds.as_ref(), mailer.as_ref()).await;
            info!(
                "Cycle complete: searched={} skipped={} failed_feeds={} matched={} sent={} send_errors={}",
                report.searched.len(),
                report.skipped.len(),
                report.failed_feeds.len(),
                report.matched_platforms(),
                report.sent,
                report.send_errors,
            );
            info!("Next pass in {} seconds", config.timer);
        });

        tokio::spawn(async move {
            if let Err(e) = cycle.await {
                error!("Price check cycle aborted: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailConfig;
    use crate::mailer::{MailConnection, MailError};
    use async_trait::async_trait;
    use price_watch_core::{FeedEntry, FeedError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingFeeds {
        fetches: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FeedSource for CountingFeeds {
        async fn fetch(&self, _url: &str) -> Result<Vec<FeedEntry>, FeedError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                panic!("feed exploded");
            }
            Ok(vec![FeedEntry::new("Nothing watched here")])
        }
    }

    struct NoMail;

    #[async_trait]
    impl MailConnector for NoMail {
        async fn connect(
            &self,
            settings: &MailConfig,
        ) -> Result<Box<dyn MailConnection>, MailError> {
            Err(MailError::Connection {
                host: settings.host.clone(),
                port: settings.port,
                reason: "unused".to_string(),
            })
        }
    }

    fn write_config(name: &str, timer: u64) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "price-watch-{}-{}.json",
            name,
            std::process::id()
        ));
        let raw = format!(
            r#"{{
                "timer": {timer},
                "mail": {{
                    "host": "smtp.example.com",
                    "port": 587,
                    "sender": "watcher@example.com",
                    "credential": "secret",
                    "receiver": "me@example.com"
                }},
                "feeds": {{ "Steam": "https://example.com/steam.rss" }},
                "games": {{ "Steam": ["Hollow Knight"] }}
            }}"#
        );
        std::fs::write(&path, raw).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_config_is_fatal() {
        let feeds = Arc::new(CountingFeeds {
            fetches: AtomicUsize::new(0),
            fail: false,
        });
        let scheduler =
            CycleScheduler::new("/nonexistent/price-watch.json", feeds.clone(), Arc::new(NoMail));

        assert!(scheduler.run().await.is_err());
        assert_eq!(feeds.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unschedulable_timer_is_fatal() {
        let path = write_config("far-future", 0);
        let raw = std::fs::read_to_string(&path)
            .unwrap()
            .replace("\"timer\": 0", "\"timer\": 1e19");
        std::fs::write(&path, raw).unwrap();

        let feeds = Arc::new(CountingFeeds {
            fetches: AtomicUsize::new(0),
            fail: false,
        });
        let scheduler = CycleScheduler::new(path.clone(), feeds.clone(), Arc::new(NoMail));

        let err = scheduler.run().await.unwrap_err();
        assert!(err.to_string().contains("too far in the future"));
        assert_eq!(feeds.fetches.load(Ordering::SeqCst), 0);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_start_on_fixed_period() {
        let path = write_config("period", 60);
        let feeds = Arc::new(CountingFeeds {
            fetches: AtomicUsize::new(0),
            fail: false,
        });
        let scheduler = CycleScheduler::new(path.clone(), feeds.clone(), Arc::new(NoMail));

        // Cycles at t=0, 60 and 120
        let result = tokio::time::timeout(Duration::from_secs(150), scheduler.run()).await;
        assert!(result.is_err(), "scheduler should still be running");
        assert_eq!(feeds.fetches.load(Ordering::SeqCst), 3);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_does_not_stop_schedule() {
        let path = write_config("panic", 30);
        let feeds = Arc::new(CountingFeeds {
            fetches: AtomicUsize::new(0),
            fail: true,
        });
        let scheduler = CycleScheduler::new(path.clone(), feeds.clone(), Arc::new(NoMail));

        // Cycles at t=0, 30, 60 and 90
        let result = tokio::time::timeout(Duration::from_secs(100), scheduler.run()).await;
        assert!(result.is_err());
        assert_eq!(feeds.fetches.load(Ordering::SeqCst), 4);

        std::fs::remove_file(path).ok();
    }
}
