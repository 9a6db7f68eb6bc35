use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;

use crate::error::FeedError;
use crate::models::FeedEntry;

/// Parse an RSS 2.0 or Atom document from raw XML bytes.
///
/// Entries are returned in document order. Items without a title are skipped.
pub fn parse_feed(xml: &[u8]) -> Result<Vec<FeedEntry>, FeedError> {
    // Text is not trimmed per event so mixed text/CDATA keeps its spacing;
    // fields are trimmed once in `EntryBuilder::build`.
    let mut reader = Reader::from_reader(xml);

    let mut entries = Vec::new();
    let mut buf = Vec::new();

    // Local names of the currently open elements
    let mut stack: Vec<String> = Vec::new();
    // Stack depth at which the current <item>/<entry> was opened
    let mut entry_depth: Option<usize> = None;
    let mut current: Option<EntryBuilder> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if entry_depth.is_none() && is_entry_element(&name) {
                    entry_depth = Some(stack.len());
                    current = Some(EntryBuilder::default());
                } else if let Some(item) = current.as_mut() {
                    if is_direct_child(&stack, entry_depth) && name == "link" {
                        item.take_link_href(&e);
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                if let Some(item) = current.as_mut() {
                    if is_direct_child(&stack, entry_depth) && local_name(&e) == "link" {
                        item.take_link_href(&e);
                    }
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                if entry_depth == Some(stack.len()) {
                    entry_depth = None;
                    if let Some(entry) = current.take().and_then(EntryBuilder::build) {
                        entries.push(entry);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(item) = current.as_mut() {
                    if is_field(&stack, entry_depth) {
                        item.push_text(stack.last().map(String::as_str), &text_of(&e));
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(item) = current.as_mut() {
                    if is_field(&stack, entry_depth) {
                        let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                        item.push_text(stack.last().map(String::as_str), &text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// Unescape a text node, resolving HTML entities such as `&eacute;`.
/// Unknown entities leave the node's raw text in place.
fn text_of(e: &BytesText<'_>) -> String {
    e.unescape_with(resolve_html5_entity)
        .map(|text| text.to_string())
        .unwrap_or_else(|_| String::from_utf8_lossy(e).to_string())
}

fn is_entry_element(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// True when the next element to open would be a direct child of the entry.
fn is_direct_child(stack: &[String], entry_depth: Option<usize>) -> bool {
    entry_depth.map_or(false, |d| stack.len() == d + 1)
}

/// True when text belongs to a direct child element of the entry.
fn is_field(stack: &[String], entry_depth: Option<usize>) -> bool {
    entry_depth.map_or(false, |d| stack.len() == d + 2)
}

#[derive(Default)]
struct EntryBuilder {
    title: Option<String>,
    link: Option<String>,
    published: Option<String>,
}

impl EntryBuilder {
    fn push_text(&mut self, element: Option<&str>, text: &str) {
        let slot = match element {
            Some("title") => &mut self.title,
            Some("link") => &mut self.link,
            Some("pubDate") | Some("published") | Some("updated") | Some("date") => {
                &mut self.published
            }
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    /// Atom links carry the URL in `href`; prefer the alternate link.
    fn take_link_href(&mut self, e: &BytesStart<'_>) {
        if self.link.is_some() {
            return;
        }
        let rel = e
            .try_get_attribute("rel")
            .ok()
            .flatten()
            .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()));
        if matches!(rel.as_deref(), Some(r) if r != "alternate") {
            return;
        }
        if let Ok(Some(href)) = e.try_get_attribute("href") {
            if let Ok(value) = href.unescape_value() {
                self.link = Some(value.to_string());
            }
        }
    }

    fn build(self) -> Option<FeedEntry> {
        let title = self.title?.trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(FeedEntry {
            title,
            link: self.link.map(|l| l.trim().to_string()),
            published: self.published.map(|p| p.trim().to_string()),
        })
    }
}
