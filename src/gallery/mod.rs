//! Tag index and search over a photo portfolio
//!
//! The catalog of albums is loaded once, every album is crawled through the
//! remote photo API in small batches, and the resulting tag index and photo
//! list answer exact tag lookups and fuzzy free-text searches.

pub mod catalog;
pub mod config_loader;
pub mod crawler;
pub mod deep_link;
pub mod fetcher;
pub mod flickr;
pub mod logger;
pub mod photo;
pub mod search;
pub mod tag_index;
pub mod tui;
pub mod validator;

pub use catalog::{Album, CollectionKind};
pub use config_loader::ConfigManager;
pub use crawler::{apply_filter, BatchCrawler, CrawlFilter, CrawlOutput};
pub use deep_link::DeepLink;
pub use fetcher::AlbumPhotoFetcher;
pub use flickr::FlickrClient;
pub use logger::Logger;
pub use photo::Photo;
pub use search::{SearchEngine, SearchOutcome};
pub use validator::{AlbumValidator, ValidationOutcome, ValidationReport};
