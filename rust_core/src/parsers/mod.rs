mod syndication;

pub use syndication::parse_feed;
