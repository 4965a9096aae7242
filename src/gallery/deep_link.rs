use reqwest::Url;

use crate::gallery::crawler::CrawlFilter;

/// Placeholder origin for parsing bare query strings.
const BARE_QUERY_BASE: &str = "http://localhost/";

/// Filters carried in a portfolio link, e.g. `portfolio.html?tag=live`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepLink {
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl DeepLink {
    /// Accepts a full URL or a bare query string (`?tag=live`, `search=heron`).
    /// Empty parameters are ignored; when a parameter repeats, the first wins.
    pub fn parse(link: &str) -> Self {
        let link = link.trim();
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(_) => {
                let Ok(mut url) = Url::parse(BARE_QUERY_BASE) else {
                    return Self::default();
                };
                url.set_query(Some(link.trim_start_matches('?')));
                url
            }
        };

        let mut deep_link = Self::default();
        for (key, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "tag" if deep_link.tag.is_none() => deep_link.tag = Some(value.to_string()),
                "search" if deep_link.search.is_none() => deep_link.search = Some(value.to_string()),
                _ => {}
            }
        }
        deep_link
    }

    /// Filter to apply while the crawl is still running.
    pub fn filter(&self) -> Option<CrawlFilter> {
        self.tag.clone().map(CrawlFilter::Tag)
    }

    /// Query to pre-populate once the crawl is ready.
    pub fn query(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.search.is_none()
    }
}
