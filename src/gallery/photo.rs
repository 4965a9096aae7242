use std::collections::HashSet;
use std::sync::Arc;

use crate::gallery::catalog::CollectionKind;

/// The album a photo was fetched from.
///
/// This is a copy of the identifying fields, not a handle on the catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumRef {
    pub identifier: String,
    pub title: String,
    pub collection: CollectionKind,
}

/// One photo as returned by the remote service, with defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub identifier: String,
    pub title: String,
    pub description: String,
    /// Tags exactly as the author wrote them; case and punctuation are kept.
    pub tags: Vec<String>,
    pub thumbnail_url: String,
    pub full_size_url: String,
    pub owning_album: Arc<AlbumRef>,
}

impl Photo {
    /// Tags in declaration order with repeats removed.
    pub fn distinct_tags(&self) -> impl Iterator<Item = &str> {
        let mut seen = HashSet::new();
        self.tags
            .iter()
            .map(String::as_str)
            .filter(move |tag| seen.insert(*tag))
    }
}
