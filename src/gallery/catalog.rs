//! Album catalog
//!
//! The catalog is the read-only list of albums shown on the site, grouped into
//! collections. It is loaded from `catalog.toml` once and shared behind an
//! `Arc`; nothing mutates it after load.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gallery::photo::AlbumRef;

lazy_static! {
    /// Album id inside a Flickr album URL, e.g. `.../albums/72177720329859726/`
    static ref ALBUM_ID_PATTERN: Regex = Regex::new(r"albums/(\d+)").unwrap();
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// The fixed set of collections an album can belong to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    #[default]
    Music,
    Events,
    Travel,
    Birds,
    Landscapes,
    Pets,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 6] = [
        CollectionKind::Music,
        CollectionKind::Events,
        CollectionKind::Travel,
        CollectionKind::Birds,
        CollectionKind::Landscapes,
        CollectionKind::Pets,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CollectionKind::Music => "music",
            CollectionKind::Events => "events",
            CollectionKind::Travel => "travel",
            CollectionKind::Birds => "birds",
            CollectionKind::Landscapes => "landscapes",
            CollectionKind::Pets => "pets",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollectionKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> CatalogResult<Self> {
        let wanted = s.trim().to_lowercase();
        CollectionKind::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| CatalogError::UnknownCollection(s.to_string()))
    }
}

/// One remotely hosted album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// Display title, conventionally `YYYY-MM-DD Subject @ Venue`.
    pub title: String,
    /// Albums without a source URL (single photo posts) are never fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    /// Filled from the enclosing collection when the catalog is loaded.
    #[serde(skip)]
    pub collection: CollectionKind,
}

impl Album {
    /// The remote album id, if the source URL carries one.
    pub fn identifier(&self) -> Option<String> {
        self.source_url.as_deref().and_then(extract_album_id)
    }

    /// A detached reference to this album for photos to carry around.
    pub fn album_ref(&self) -> Option<AlbumRef> {
        self.identifier().map(|identifier| AlbumRef {
            identifier,
            title: self.title.clone(),
            collection: self.collection,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "name")]
    pub kind: CollectionKind,
    #[serde(default)]
    pub albums: Vec<Album>,
}

/// Ordered collections of albums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    collections: Vec<Collection>,
}

impl Catalog {
    pub fn new(collections: Vec<Collection>) -> Self {
        Self { collections }.with_collection_tags()
    }

    /// Stamps every album with the collection it is listed under.
    pub fn with_collection_tags(mut self) -> Self {
        for collection in &mut self.collections {
            for album in &mut collection.albums {
                album.collection = collection.kind;
            }
        }
        self
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn collection(&self, kind: CollectionKind) -> Option<&Collection> {
        self.collections.iter().find(|c| c.kind == kind)
    }

    /// Every album across all collections, in catalog order.
    pub fn albums(&self) -> impl Iterator<Item = &Album> {
        self.collections.iter().flat_map(|c| c.albums.iter())
    }

    pub fn album_count(&self) -> usize {
        self.collections.iter().map(|c| c.albums.len()).sum()
    }

    /// First album whose title contains `fragment`.
    pub fn find_by_title(&self, fragment: &str) -> Option<&Album> {
        self.albums().find(|album| album.title.contains(fragment))
    }
}

/// Pulls the numeric album id out of an album URL.
pub fn extract_album_id(source_url: &str) -> Option<String> {
    ALBUM_ID_PATTERN
        .captures(source_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album(title: &str, url: Option<&str>) -> Album {
        Album {
            title: title.to_string(),
            source_url: url.map(str::to_string),
            photo_count: None,
            cover_url: None,
            collection: CollectionKind::default(),
        }
    }

    #[test]
    fn test_extract_album_id() {
        assert_eq!(
            extract_album_id("https://www.flickr.com/photos/jayneclamp/albums/72177720329859726/"),
            Some("72177720329859726".to_string())
        );
        assert_eq!(
            extract_album_id("https://www.flickr.com/photos/jayneclamp/albums/72177720324235638"),
            Some("72177720324235638".to_string())
        );
        assert_eq!(extract_album_id("https://www.flickr.com/photos/jayneclamp/"), None);
        assert_eq!(extract_album_id("albums/not-a-number"), None);
    }

    #[test]
    fn test_collection_tags_and_lookup() {
        let catalog = Catalog::new(vec![
            Collection {
                kind: CollectionKind::Music,
                albums: vec![album("2025-02-15 Drive By Truckers @ 40 Watt", Some("https://x/albums/1/"))],
            },
            Collection {
                kind: CollectionKind::Pets,
                albums: vec![album("Dogs", None), album("Cats", Some("https://x/albums/2/"))],
            },
        ]);

        assert_eq!(catalog.album_count(), 3);
        let kinds: Vec<CollectionKind> = catalog.albums().map(|a| a.collection).collect();
        assert_eq!(kinds, vec![CollectionKind::Music, CollectionKind::Pets, CollectionKind::Pets]);

        let found = catalog.find_by_title("Truckers").unwrap();
        assert_eq!(found.identifier().as_deref(), Some("1"));
        assert!(catalog.find_by_title("Nowhere Bar").is_none());

        assert!(catalog.albums().nth(1).unwrap().album_ref().is_none());
        let cats = catalog.albums().nth(2).unwrap().album_ref().unwrap();
        assert_eq!(cats.identifier, "2");
        assert_eq!(cats.collection, CollectionKind::Pets);
        assert!(catalog.collection(CollectionKind::Birds).is_none());
    }

    #[test]
    fn test_collection_kind_from_str() {
        assert_eq!("Landscapes".parse::<CollectionKind>().unwrap(), CollectionKind::Landscapes);
        assert_eq!(" birds ".parse::<CollectionKind>().unwrap(), CollectionKind::Birds);
        assert!(matches!("weddings".parse::<CollectionKind>(), Err(CatalogError::UnknownCollection(_))));
    }
}
