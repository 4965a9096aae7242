//! Album photo fetcher
//!
//! Pages through one album's listing and turns it into [`Photo`] values.
//! A failed listing is retried exactly once with the fallback request shape;
//! if that fails too the album yields no result. Nothing here returns an error
//! to the caller and nothing is cached between calls.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::gallery::config_loader::Limits;
use crate::gallery::flickr::{ApiResult, PhotoApi, RequestShape};
use crate::gallery::photo::{AlbumRef, Photo};

/// Anything that can produce the photos of one album.
#[async_trait]
pub trait AlbumSource: Send + Sync {
    /// `None` means the album could not be fetched at all.
    async fn album_photos(&self, album: &AlbumRef) -> Option<Vec<Photo>>;
}

#[async_trait]
impl<T: AlbumSource + ?Sized> AlbumSource for Arc<T> {
    async fn album_photos(&self, album: &AlbumRef) -> Option<Vec<Photo>> {
        (**self).album_photos(album).await
    }
}

/// Remote album ids are numeric.
pub fn is_valid_album_id(album_id: &str) -> bool {
    !album_id.is_empty() && album_id.chars().all(|c| c.is_ascii_digit())
}

pub struct AlbumPhotoFetcher<A: PhotoApi> {
    api: A,
    per_page: u32,
    max_photos: usize,
}

impl<A: PhotoApi> AlbumPhotoFetcher<A> {
    pub fn new(api: A, per_page: u32, max_photos: usize) -> Self {
        Self {
            api,
            per_page: per_page.max(1),
            max_photos,
        }
    }

    pub fn from_limits(api: A, limits: &Limits) -> Self {
        Self::new(api, limits.per_page, limits.max_photos_per_album)
    }

    /// Fetch every photo of `album`, up to the configured maximum.
    pub async fn fetch(&self, album: &AlbumRef) -> Option<Vec<Photo>> {
        if !is_valid_album_id(&album.identifier) {
            warn!("Skipping album \"{}\": malformed id {:?}", album.title, album.identifier);
            return None;
        }

        let album = Arc::new(album.clone());

        match self.fetch_with_shape(&album, RequestShape::Primary).await {
            Ok(photos) => Some(photos),
            Err(primary_err) => {
                warn!(
                    "Primary listing of album {} failed ({}), trying fallback request",
                    album.identifier, primary_err
                );
                match self.fetch_with_shape(&album, RequestShape::Fallback).await {
                    Ok(photos) => {
                        debug!("Fallback listing of album {} returned {} photos", album.identifier, photos.len());
                        Some(photos)
                    }
                    Err(fallback_err) => {
                        warn!("Fallback listing of album {} failed: {}", album.identifier, fallback_err);
                        None
                    }
                }
            }
        }
    }

    /// Walk all pages with one request shape. Any failing page fails the walk.
    async fn fetch_with_shape(&self, album: &Arc<AlbumRef>, shape: RequestShape) -> ApiResult<Vec<Photo>> {
        let mut photos = Vec::new();
        let mut page = 1;

        let reported_total = loop {
            let listing = self
                .api
                .photoset_page(&album.identifier, page, self.per_page, shape)
                .await?;
            let received = listing.photo.len();

            photos.extend(listing.photo.into_iter().map(|raw| raw.into_photo(album.clone())));

            if photos.len() >= self.max_photos {
                photos.truncate(self.max_photos);
                break listing.total;
            }
            // An empty page ends the walk even if `pages` claims otherwise
            if page >= listing.pages || received == 0 {
                break listing.total;
            }
            page += 1;
        };

        debug!(
            "Fetched {} of {} photos from album {} with {} request",
            photos.len(),
            reported_total,
            album.identifier,
            shape.name()
        );
        Ok(photos)
    }

    #[cfg(test)]
    fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: PhotoApi> AlbumSource for AlbumPhotoFetcher<A> {
    async fn album_photos(&self, album: &AlbumRef) -> Option<Vec<Photo>> {
        self.fetch(album).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::catalog::CollectionKind;
    use crate::gallery::flickr::{ApiError, PhotosetInfo, PhotosetPage, RawPhoto};
    use std::sync::Mutex;

    /// In-memory listing: `total` photos split into pages, with scripted failures.
    struct FakeApi {
        total: u32,
        fail_primary: bool,
        fail_fallback: bool,
        fail_primary_page: Option<u32>,
        /// Primary failures look like a garbled response instead of `stat: fail`
        garbled_primary: bool,
        calls: Mutex<Vec<(u32, RequestShape)>>,
    }

    impl FakeApi {
        fn new(total: u32) -> Self {
            Self {
                total,
                fail_primary: false,
                fail_fallback: false,
                fail_primary_page: None,
                garbled_primary: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(u32, RequestShape)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PhotoApi for FakeApi {
        async fn photoset_page(
            &self,
            _album_id: &str,
            page: u32,
            per_page: u32,
            shape: RequestShape,
        ) -> ApiResult<PhotosetPage> {
            self.calls.lock().unwrap().push((page, shape));

            let failing = match shape {
                RequestShape::Primary => self.fail_primary || self.fail_primary_page == Some(page),
                RequestShape::Fallback => self.fail_fallback,
            };
            if failing {
                if self.garbled_primary && shape == RequestShape::Primary {
                    return Err(ApiError::InvalidResponse("unexpected end of body".to_string()));
                }
                return Err(ApiError::Service { code: 1, message: "Photoset not found".to_string() });
            }

            let pages = self.total.div_ceil(per_page).max(1);
            let start = (page - 1) * per_page;
            let end = (start + per_page).min(self.total);
            let photo = (start..end)
                .map(|i| RawPhoto {
                    id: format!("p{}", i),
                    title: format!("Photo {}", i),
                    tags: "live indoor".to_string(),
                    ..RawPhoto::default()
                })
                .collect();

            Ok(PhotosetPage { photo, page, pages, total: self.total })
        }

        async fn photoset_info(&self, album_id: &str) -> ApiResult<PhotosetInfo> {
            Err(ApiError::InvalidResponse(format!("no info for {}", album_id)))
        }
    }

    fn album(id: &str) -> AlbumRef {
        AlbumRef {
            identifier: id.to_string(),
            title: "2024-04-26 Five Eight @ Nowhere Bar".to_string(),
            collection: CollectionKind::Music,
        }
    }

    #[tokio::test]
    async fn test_fetches_all_pages() {
        let fetcher = AlbumPhotoFetcher::new(FakeApi::new(25), 10, 500);
        let photos = fetcher.fetch(&album("123")).await.unwrap();

        assert_eq!(photos.len(), 25);
        assert_eq!(photos[0].identifier, "p0");
        assert_eq!(photos[24].identifier, "p24");
        assert_eq!(photos[3].owning_album.title, "2024-04-26 Five Eight @ Nowhere Bar");
        let pages: Vec<u32> = fetcher.api().calls().iter().map(|(p, _)| *p).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stops_at_max_photos() {
        let fetcher = AlbumPhotoFetcher::new(FakeApi::new(100), 10, 15);
        let photos = fetcher.fetch(&album("123")).await.unwrap();

        assert_eq!(photos.len(), 15);
        assert_eq!(fetcher.api().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_album() {
        let fetcher = AlbumPhotoFetcher::new(FakeApi::new(0), 10, 500);
        assert_eq!(fetcher.fetch(&album("123")).await, Some(Vec::new()));
        assert_eq!(fetcher.api().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_once_on_failure() {
        let mut api = FakeApi::new(5);
        api.fail_primary = true;
        let fetcher = AlbumPhotoFetcher::new(api, 10, 500);

        let photos = fetcher.fetch(&album("123")).await.unwrap();
        assert_eq!(photos.len(), 5);
        assert_eq!(
            fetcher.api().calls(),
            vec![(1, RequestShape::Primary), (1, RequestShape::Fallback)]
        );
    }

    #[tokio::test]
    async fn test_falls_back_once_on_transport_failure() {
        let mut api = FakeApi::new(5);
        api.fail_primary = true;
        api.garbled_primary = true;
        let fetcher = AlbumPhotoFetcher::new(api, 10, 500);

        let photos = fetcher.fetch(&album("123")).await;
        assert_eq!(photos.map(|p| p.len()), Some(5));
        assert_eq!(
            fetcher.api().calls(),
            vec![(1, RequestShape::Primary), (1, RequestShape::Fallback)]
        );
    }

    #[tokio::test]
    async fn test_later_page_failure_restarts_with_fallback() {
        let mut api = FakeApi::new(25);
        api.fail_primary_page = Some(2);
        let fetcher = AlbumPhotoFetcher::new(api, 10, 500);

        let photos = fetcher.fetch(&album("123")).await.unwrap();
        // No duplicates from the abandoned primary walk
        assert_eq!(photos.len(), 25);
        assert_eq!(fetcher.api().calls().len(), 5);
    }

    #[tokio::test]
    async fn test_both_shapes_fail() {
        let mut api = FakeApi::new(5);
        api.fail_primary = true;
        api.fail_fallback = true;
        let fetcher = AlbumPhotoFetcher::new(api, 10, 500);

        assert_eq!(fetcher.fetch(&album("123")).await, None);
        assert_eq!(fetcher.api().calls().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_id_makes_no_request() {
        let fetcher = AlbumPhotoFetcher::new(FakeApi::new(5), 10, 500);

        assert_eq!(fetcher.fetch(&album("")).await, None);
        assert_eq!(fetcher.fetch(&album("abc/123")).await, None);
        assert!(fetcher.api().calls().is_empty());
    }
}
