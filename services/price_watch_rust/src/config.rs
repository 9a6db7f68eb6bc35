use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var naming the JSON configuration file
pub const CONFIG_PATH_ENV: &str = "PRICE_WATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds between cycle starts
    pub timer: f64,

    #[serde(alias = "gmail")]
    pub mail: MailConfig,

    /// Platform name -> feed URL
    #[serde(default)]
    pub feeds: BTreeMap<String, String>,

    /// Platform name -> watched title substrings
    #[serde(default)]
    pub games: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub sender: String,
    #[serde(alias = "password")]
    pub credential: String,
    pub receiver: String,
}

// Keep the credential out of logs.
impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .field("credential", &"<redacted>")
            .field("receiver", &self.receiver)
            .finish()
    }
}

impl Config {
    /// Load from the file named by `PRICE_WATCH_CONFIG` (default `config.json`).
    pub fn from_env() -> Result<Self> {
        Self::load(config_path())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Invalid configuration file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Config =
            serde_json::from_str(raw).context("Failed to decode JSON configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !self.timer.is_finite() || self.timer <= 0.0 {
            return Err(anyhow!("timer must be a positive number of seconds, got {}", self.timer));
        }
        Duration::try_from_secs_f64(self.timer)
            .map_err(|e| anyhow!("timer {} is out of range: {}", self.timer, e))?;
        if self.mail.host.trim().is_empty() {
            return Err(anyhow!("mail.host must be set"));
        }
        if self.mail.port == 0 {
            return Err(anyhow!("mail.port must be > 0"));
        }
        if self.mail.sender.trim().is_empty() {
            return Err(anyhow!("mail.sender must be set"));
        }
        if self.mail.receiver.trim().is_empty() {
            return Err(anyhow!("mail.receiver must be set"));
        }
        Ok(())
    }

    /// Delay between the start of one cycle and the start of the next
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.timer).unwrap_or(Duration::MAX)
    }

    /// Watchlist for a platform, if one is configured and non-empty
    pub fn watchlist(&self, platform: &str) -> Option<&[String]> {
        self.games
            .get(platform)
            .map(Vec::as_slice)
            .filter(|games| !games.is_empty())
    }
}

pub fn config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "timer": 3600,
        "mail": {
            "host": "smtp.gmail.com",
            "port": 587,
            "sender": "watcher@example.com",
            "credential": "hunter2",
            "receiver": "me@example.com"
        },
        "feeds": {
            "Steam": "https://example.com/steam.rss",
            "Epic": "https://example.com/epic.rss"
        },
        "games": {
            "Steam": ["Hollow Knight", "Celeste"],
            "Epic": []
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let cfg = Config::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.interval(), Duration::from_secs(3600));
        assert_eq!(cfg.mail.port, 587);
        assert_eq!(cfg.feeds.len(), 2);
        assert_eq!(
            cfg.watchlist("Steam"),
            Some(&["Hollow Knight".to_string(), "Celeste".to_string()][..])
        );
    }

    #[test]
    fn test_empty_or_absent_watchlist() {
        let cfg = Config::from_json(SAMPLE).unwrap();
        assert!(cfg.watchlist("Epic").is_none());
        assert!(cfg.watchlist("GOG").is_none());
    }

    #[test]
    fn test_legacy_gmail_keys() {
        let raw = r#"{
            "timer": 0.5,
            "gmail": {
                "host": "smtp.gmail.com",
                "port": 587,
                "sender": "watcher@example.com",
                "password": "hunter2",
                "receiver": "me@example.com"
            }
        }"#;
        let cfg = Config::from_json(raw).unwrap();
        assert_eq!(cfg.mail.credential, "hunter2");
        assert_eq!(cfg.interval(), Duration::from_millis(500));
        assert!(cfg.feeds.is_empty());
        assert!(cfg.games.is_empty());
    }

    #[test]
    fn test_rejects_non_positive_timer() {
        let raw = SAMPLE.replace("\"timer\": 3600", "\"timer\": 0");
        assert!(Config::from_json(&raw).is_err());
    }

    #[test]
    fn test_rejects_unrepresentable_timer() {
        let raw = SAMPLE.replace("\"timer\": 3600", "\"timer\": 1e30");
        let err = Config::from_json(&raw).unwrap_err();
        assert!(format!("{:#}", err).contains("out of range"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(Config::from_json("{ \"timer\": ").is_err());
    }

    #[test]
    fn test_rejects_missing_mail() {
        assert!(Config::from_json(r#"{ "timer": 60 }"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/price-watch/config.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read configuration file"));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let cfg = Config::from_json(SAMPLE).unwrap();
        let dbg = format!("{:?}", cfg.mail);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
