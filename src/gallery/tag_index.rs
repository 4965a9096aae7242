use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::gallery::photo::Photo;

#[derive(Debug, Default, Clone)]
struct TagEntry {
    photos: Vec<Arc<Photo>>,
    ids: HashSet<String>,
}

/// Tag → photos, built during one crawl.
///
/// Tags are keys exactly as supplied (no case folding). Within a tag photos
/// keep the order they were inserted in, and a photo is listed at most once
/// per tag. There is no removal; a new crawl builds a new index.
#[derive(Debug, Default, Clone)]
pub struct TagIndex {
    entries: HashMap<String, TagEntry>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `photo` under each of its tags.
    pub fn insert(&mut self, photo: &Arc<Photo>) {
        for tag in photo.distinct_tags() {
            let entry = self.entries.entry(tag.to_string()).or_default();
            if entry.ids.insert(photo.identifier.clone()) {
                entry.photos.push(photo.clone());
            }
        }
    }

    /// Exact lookup. Unknown tags give an empty slice.
    pub fn lookup(&self, tag: &str) -> &[Arc<Photo>] {
        self.entries
            .get(tag)
            .map(|entry| entry.photos.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// All tags in lexicographic order.
    pub fn all_tags(&self) -> Vec<&str> {
        self.all_tags_by(|a, b| a.cmp(b))
    }

    /// All tags ordered by `compare`.
    pub fn all_tags_by<F>(&self, mut compare: F) -> Vec<&str>
    where
        F: FnMut(&str, &str) -> Ordering,
    {
        let mut tags: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tags.sort_by(|a, b| compare(a, b));
        tags
    }

    /// Tags with the number of photos carrying them, most used first.
    pub fn tag_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .entries
            .iter()
            .map(|(tag, entry)| (tag.as_str(), entry.photos.len()))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        counts
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
