// Shared models for price watch services
use std::collections::BTreeMap;

// ============================================================================
// Feed Entries
// ============================================================================

/// One item of a syndication feed. Only `title` takes part in matching.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    /// Raw `pubDate` / `published` / `updated` text, if the feed carries one
    pub published: Option<String>,
}

impl FeedEntry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Per-cycle results
// ============================================================================

/// Platform name -> matched titles, in feed order.
pub type PlatformResults = BTreeMap<String, Vec<String>>;
