//! Internal-link extraction from item bodies (regex-based).

use regex::Regex;
use std::sync::OnceLock;

use crate::content::{ContentRepository, ItemId};
use crate::error::Result;

/// Matches the href value of an anchor tag, single or double quoted.
fn anchor_regex() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        Regex::new(r#"(?i)<a[^>]+href=['"]([^'"]+)['"][^>]*>"#).expect("Invalid regex pattern")
    })
}

/// Raw href values in document order, duplicates kept.
pub fn extract_hrefs(body: &str) -> Vec<&str> {
    anchor_regex()
        .captures_iter(body)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Resolves the anchors of a body to item ids through the content store.
pub struct LinkExtractor<'a> {
    repo: &'a dyn ContentRepository,
}

impl<'a> LinkExtractor<'a> {
    pub fn new(repo: &'a dyn ContentRepository) -> Self {
        Self { repo }
    }

    /// Ordered link targets of `body`. External, unresolvable and
    /// self-referencing links are dropped; repeated links are kept.
    pub async fn resolve_targets(&self, source: ItemId, body: &str) -> Result<Vec<ItemId>> {
        let mut targets = Vec::new();
        for href in extract_hrefs(body) {
            match self.repo.resolve_url(href).await? {
                Some(target) if target != source => targets.push(target),
                Some(_) => {}
                None => log::trace!("Unresolved link from item {}: {}", source, href),
            }
        }
        Ok(targets)
    }
}
