pub mod feed;

// Re-export commonly used types
pub use crate::error::FeedError;
pub use feed::{FeedClient, FeedSource};
