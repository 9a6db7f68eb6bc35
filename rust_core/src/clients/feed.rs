//! Syndication feed client
//!
//! Fetches storefront price feeds over HTTP and parses them into entries.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::FeedError;
use crate::models::FeedEntry;
use crate::parsers::parse_feed;

/// Anything that can turn a feed URL into its entries.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError>;
}

/// HTTP feed client
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
}

impl FeedClient {
    /// Create a new feed client with default timeout and user agent
    pub fn new() -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("PriceWatch/1.0")
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Create a feed client around an existing reqwest Client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
        debug!("Fetching feed from: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FeedError::Status {
                status,
                url: url.to_string(),
            });
        }

        let bytes = response.bytes().await?;
        let entries = parse_feed(&bytes)?;

        debug!("Parsed {} entries from {}", entries.len(), url);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_url_is_request_error() {
        let client = FeedClient::new().unwrap();
        let result = client.fetch("http://127.0.0.1:9/feed.xml").await;
        assert!(matches!(result, Err(FeedError::Request(_))));
    }

    #[tokio::test]
    async fn test_malformed_url_is_request_error() {
        let client = FeedClient::new().unwrap();
        let result = client.fetch("not a url").await;
        assert!(matches!(result, Err(FeedError::Request(_))));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_fetch_live_feed() {
        let client = FeedClient::new().unwrap();
        match client.fetch("https://psprices.com/region-us/rss/deals").await {
            Ok(entries) => {
                println!("Fetched {} entries", entries.len());
                for entry in entries.iter().take(5) {
                    println!("  - {}", entry.title);
                }
            }
            Err(e) => println!("Warning: Could not fetch feed: {}", e),
        }
    }
}
