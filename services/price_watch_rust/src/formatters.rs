/// Subject line for a platform's price mail
pub fn format_subject(platform: &str) -> String {
    format!("New prices for {platform}")
}

/// Plain-text body: a heading followed by one `- title` line per match
pub fn format_body(platform: &str, titles: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("New prices for {platform}:\n\n"));
    for title in titles {
        out.push_str(&format!("- {title}\n"));
    }
    out
}
