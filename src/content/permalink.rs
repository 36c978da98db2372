//! Canonical item URLs and href → item resolution.

use url::Url;

use super::ItemId;
use crate::error::{GraphviewError, Result};

/// What an internal href points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlTarget {
    /// `?p=<id>` / `?page_id=<id>` style links.
    Id(ItemId),
    /// Pretty permalink; the last path segment is the slug.
    Slug(String),
}

/// Permalink scheme rooted at the configured site URL.
#[derive(Debug, Clone)]
pub struct Permalinks {
    base: Url,
}

impl Permalinks {
    pub fn new(site_url: &str) -> Result<Self> {
        let base = Url::parse(site_url)
            .map_err(|e| GraphviewError::Config(format!("invalid site_url {}: {}", site_url, e)))?;
        if base.host_str().is_none() {
            return Err(GraphviewError::Config(format!("site_url has no host: {}", site_url)));
        }
        Ok(Self { base })
    }

    /// `{site_url}/{slug}/`
    pub fn canonical(&self, slug: &str) -> String {
        format!("{}/{}/", self.base.as_str().trim_end_matches('/'), slug)
    }

    /// Classify an href found in body text. Returns `None` for external hosts,
    /// non-http schemes, bare fragments and the site root.
    pub fn parse(&self, href: &str) -> Option<UrlTarget> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let url = self.base.join(href).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }
        if !same_host(url.host_str()?, self.base.host_str()?) {
            return None;
        }

        for (key, value) in url.query_pairs() {
            if key == "p" || key == "page_id" {
                if let Ok(id) = value.parse::<ItemId>() {
                    return Some(UrlTarget::Id(id));
                }
            }
        }

        let base_path = self.base.path().trim_end_matches('/');
        let rest = url.path().strip_prefix(base_path)?;
        // `/blogger/` must not match a `/blog` base
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        rest.split('/')
            .filter(|segment| !segment.is_empty())
            .last()
            .map(|slug| UrlTarget::Slug(slug.to_string()))
    }
}

fn same_host(a: &str, b: &str) -> bool {
    a.trim_start_matches("www.").eq_ignore_ascii_case(b.trim_start_matches("www."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> Permalinks {
        Permalinks::new("https://example.com").unwrap()
    }

    #[test]
    fn test_canonical() {
        assert_eq!(links().canonical("hello-world"), "https://example.com/hello-world/");
        let nested = Permalinks::new("https://example.com/blog/").unwrap();
        assert_eq!(nested.canonical("x"), "https://example.com/blog/x/");
    }

    #[test]
    fn test_parse_relative_and_absolute() {
        let l = links();
        assert_eq!(l.parse("/hello/"), Some(UrlTarget::Slug("hello".to_string())));
        assert_eq!(l.parse("https://example.com/a/b"), Some(UrlTarget::Slug("b".to_string())));
        assert_eq!(l.parse("http://www.example.com/c/#top"), Some(UrlTarget::Slug("c".to_string())));
    }

    #[test]
    fn test_parse_query_ids() {
        let l = links();
        assert_eq!(l.parse("/?p=12"), Some(UrlTarget::Id(12)));
        assert_eq!(l.parse("https://example.com/?page_id=7"), Some(UrlTarget::Id(7)));
    }

    #[test]
    fn test_parse_rejects_external() {
        let l = links();
        assert_eq!(l.parse("https://other.org/hello/"), None);
        assert_eq!(l.parse("mailto:me@example.com"), None);
        assert_eq!(l.parse("#section"), None);
        assert_eq!(l.parse(""), None);
        assert_eq!(l.parse("https://example.com/"), None);
    }

    #[test]
    fn test_parse_respects_base_path() {
        let l = Permalinks::new("https://example.com/blog").unwrap();
        assert_eq!(l.parse("/blog/post-1/"), Some(UrlTarget::Slug("post-1".to_string())));
        assert_eq!(l.parse("/shop/post-1/"), None);
        assert_eq!(l.parse("/blogger/post-1/"), None);
        assert_eq!(l.parse("https://example.com/blog-archive/post-1/"), None);
    }

    #[test]
    fn test_invalid_site_url() {
        assert!(Permalinks::new("not a url").is_err());
    }
}
