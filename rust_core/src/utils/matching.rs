//! Watchlist matching against feed entry titles.

use crate::models::FeedEntry;

/// Return the titles of `entries` that contain any watched name, compared
/// case-insensitively.
///
/// The outer loop walks the watchlist and the inner loop walks the entries,
/// so an entry matching several watched names is reported once per name.
pub fn search<S: AsRef<str>>(entries: &[FeedEntry], watchlist: &[S]) -> Vec<String> {
    if entries.is_empty() || watchlist.is_empty() {
        return Vec::new();
    }

    let lowered: Vec<String> = entries.iter().map(|e| e.title.to_lowercase()).collect();

    let mut result = Vec::new();
    for game in watchlist {
        let needle = game.as_ref().to_lowercase();
        for (entry, title) in entries.iter().zip(&lowered) {
            if title.contains(&needle) {
                result.push(entry.title.clone());
            }
        }
    }
    result
}
