//! Price Watch Core - shared feed logic for the price watch services.
//!
//! This module provides:
//! - Feed entry models shared between fetching, matching and notifying
//! - An HTTP feed client with RSS/Atom parsing
//! - Watchlist matching against feed entry titles

mod error;

pub mod clients;
pub mod models;
pub mod parsers;
pub mod utils;

pub use clients::{FeedClient, FeedError, FeedSource};
pub use models::{FeedEntry, PlatformResults};
pub use utils::matching::search;
