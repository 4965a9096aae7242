//! Flickr REST client
//!
//! This module provides:
//! 1. The [`PhotoApi`] seam the fetcher and validator talk to
//! 2. Wire types for `flickr.photosets.getPhotos` and `flickr.photosets.getInfo`
//! 3. A reqwest implementation that maps transport and `stat: fail` errors
//!
//! Conversion of raw records into [`Photo`] values happens here, so nothing
//! past this module sees the loosely typed JSON.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use crate::gallery::config_loader::Api;
use crate::gallery::logger::{log_api_fetch, OperationStatus};
use crate::gallery::photo::{AlbumRef, Photo};

/// Error types for remote API calls
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Service error {code}: {message}")]
    Service { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for remote API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Which set of `extras` a listing request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    Primary,
    /// Smaller size URLs; older photosets answer this when the primary fails.
    Fallback,
}

impl RequestShape {
    pub fn extras(&self) -> &'static str {
        match self {
            RequestShape::Primary => "description,tags,url_m,url_l,url_o",
            RequestShape::Fallback => "description,tags,url_z,url_c",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestShape::Primary => "primary",
            RequestShape::Fallback => "fallback",
        }
    }
}

/// `{"_content": "..."}` wrapper used for free text fields
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Content {
    #[serde(rename = "_content", default)]
    pub content: String,
}

/// Envelope for `flickr.photosets.getPhotos`
#[derive(Debug, Deserialize)]
pub struct PhotosetPhotosResponse {
    pub stat: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub photoset: Option<PhotosetPage>,
}

/// One page of a photoset listing
#[derive(Debug, Deserialize, Clone)]
pub struct PhotosetPage {
    #[serde(default)]
    pub photo: Vec<RawPhoto>,
    #[serde(deserialize_with = "number_or_string")]
    pub page: u32,
    #[serde(deserialize_with = "number_or_string")]
    pub pages: u32,
    #[serde(default, deserialize_with = "number_or_string")]
    pub total: u32,
}

/// Photo record as the listing returns it; every field past `id` is optional
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawPhoto {
    pub id: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<Content>,
    /// Space separated
    #[serde(default)]
    pub tags: String,
    pub url_m: Option<String>,
    pub url_z: Option<String>,
    pub url_c: Option<String>,
    pub url_l: Option<String>,
    pub url_o: Option<String>,
}

impl RawPhoto {
    fn static_url(&self, size: char) -> String {
        format!(
            "https://live.staticflickr.com/{}/{}_{}_{}.jpg",
            self.server, self.id, self.secret, size
        )
    }

    /// Apply defaults and attach the owning album.
    pub fn into_photo(self, album: Arc<AlbumRef>) -> Photo {
        let thumbnail_url = self
            .url_m
            .clone()
            .or_else(|| self.url_z.clone())
            .unwrap_or_else(|| self.static_url('m'));
        let full_size_url = self
            .url_o
            .clone()
            .or_else(|| self.url_l.clone())
            .or_else(|| self.url_c.clone())
            .unwrap_or_else(|| self.static_url('b'));

        Photo {
            tags: self.tags.split_whitespace().map(str::to_string).collect(),
            description: self.description.map(|d| d.content).unwrap_or_default(),
            title: self.title,
            identifier: self.id,
            thumbnail_url,
            full_size_url,
            owning_album: album,
        }
    }
}

/// Envelope for `flickr.photosets.getInfo`
#[derive(Debug, Deserialize)]
pub struct PhotosetInfoResponse {
    pub stat: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub photoset: Option<PhotosetInfo>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PhotosetInfo {
    pub id: String,
    #[serde(deserialize_with = "number_or_string")]
    pub photos: u32,
    #[serde(default)]
    pub title: Content,
}

/// Flickr is inconsistent about quoting counters.
fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn check_stat(stat: &str, code: Option<i64>, message: Option<String>) -> ApiResult<()> {
    if stat == "ok" {
        Ok(())
    } else {
        Err(ApiError::Service {
            code: code.unwrap_or(0),
            message: message.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

impl PhotosetPhotosResponse {
    pub fn into_page(self) -> ApiResult<PhotosetPage> {
        check_stat(&self.stat, self.code, self.message)?;
        self.photoset
            .ok_or_else(|| ApiError::InvalidResponse("missing photoset".to_string()))
    }
}

impl PhotosetInfoResponse {
    pub fn into_info(self) -> ApiResult<PhotosetInfo> {
        check_stat(&self.stat, self.code, self.message)?;
        self.photoset
            .ok_or_else(|| ApiError::InvalidResponse("missing photoset".to_string()))
    }
}

/// The two remote calls the indexer needs.
#[async_trait]
pub trait PhotoApi: Send + Sync {
    /// One page of an album's photo listing.
    async fn photoset_page(
        &self,
        album_id: &str,
        page: u32,
        per_page: u32,
        shape: RequestShape,
    ) -> ApiResult<PhotosetPage>;

    /// Album metadata, used to check that an album id still resolves.
    async fn photoset_info(&self, album_id: &str) -> ApiResult<PhotosetInfo>;
}

/// reqwest backed [`PhotoApi`]
#[derive(Clone)]
pub struct FlickrClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl FlickrClient {
    pub fn new(api: &Api) -> ApiResult<Self> {
        let mut builder = Client::builder().user_agent(&api.user_agent).gzip(true);
        if let Some(secs) = api.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: api.endpoint.clone(),
            api_key: api.api_key.clone(),
        })
    }

    async fn call<T>(&self, method: &str, params: &[(&str, String)]) -> ApiResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("method", method),
                ("api_key", self.api_key.as_str()),
                ("format", "json"),
                ("nojsoncallback", "1"),
            ])
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl PhotoApi for FlickrClient {
    async fn photoset_page(
        &self,
        album_id: &str,
        page: u32,
        per_page: u32,
        shape: RequestShape,
    ) -> ApiResult<PhotosetPage> {
        let params = [
            ("photoset_id", album_id.to_string()),
            ("extras", shape.extras().to_string()),
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];

        let result = self
            .call::<PhotosetPhotosResponse>("flickr.photosets.getPhotos", &params)
            .await
            .and_then(PhotosetPhotosResponse::into_page);

        match &result {
            Ok(_) => log_api_fetch(album_id, page, shape.name(), OperationStatus::Completed, None),
            Err(e) => log_api_fetch(album_id, page, shape.name(), OperationStatus::Failed, Some(&e.to_string())),
        }
        result
    }

    async fn photoset_info(&self, album_id: &str) -> ApiResult<PhotosetInfo> {
        let params = [("photoset_id", album_id.to_string())];
        self.call::<PhotosetInfoResponse>("flickr.photosets.getInfo", &params)
            .await?
            .into_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::catalog::CollectionKind;

    fn album() -> Arc<AlbumRef> {
        Arc::new(AlbumRef {
            identifier: "72177720329859726".to_string(),
            title: "2025-10-19 Porchfest @ Athens, GA".to_string(),
            collection: CollectionKind::Music,
        })
    }

    #[test]
    fn test_parse_photo_page() {
        let json = r#"{
            "photoset": {
                "id": "72177720329859726",
                "photo": [
                    {
                        "id": "54876264980", "secret": "887cfb1a8e", "server": "65535",
                        "title": "Porch stage", "isprimary": "1",
                        "description": {"_content": "Afternoon set"},
                        "tags": "live porchfest Athens",
                        "url_m": "https://live.staticflickr.com/65535/54876264980_887cfb1a8e_m.jpg",
                        "url_o": "https://live.staticflickr.com/65535/54876264980_original.jpg"
                    },
                    { "id": "54876264981", "secret": "aaa", "server": "65535", "title": "" }
                ],
                "page": 1, "pages": "3", "perpage": 2, "total": "6"
            },
            "stat": "ok"
        }"#;

        let response: PhotosetPhotosResponse = serde_json::from_str(json).unwrap();
        let page = response.into_page().unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.pages, 3);
        assert_eq!(page.total, 6);

        let photos: Vec<Photo> = page.photo.into_iter().map(|raw| raw.into_photo(album())).collect();
        assert_eq!(photos[0].tags, vec!["live", "porchfest", "Athens"]);
        assert_eq!(photos[0].description, "Afternoon set");
        assert!(photos[0].full_size_url.ends_with("_original.jpg"));

        // Missing extras fall back to the static URL scheme
        assert!(photos[1].tags.is_empty());
        assert_eq!(photos[1].description, "");
        assert_eq!(
            photos[1].thumbnail_url,
            "https://live.staticflickr.com/65535/54876264981_aaa_m.jpg"
        );
        assert_eq!(
            photos[1].full_size_url,
            "https://live.staticflickr.com/65535/54876264981_aaa_b.jpg"
        );
        assert_eq!(photos[1].owning_album.identifier, "72177720329859726");
    }

    #[test]
    fn test_service_failure_envelope() {
        let json = r#"{"stat":"fail","code":1,"message":"Photoset not found"}"#;
        let response: PhotosetPhotosResponse = serde_json::from_str(json).unwrap();

        match response.into_page() {
            Err(ApiError::Service { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "Photoset not found");
            }
            other => panic!("expected service error, got {:?}", other.map(|p| p.page)),
        }
    }

    #[test]
    fn test_parse_info() {
        let json = r#"{"photoset":{"id":"72177720323325987","photos":11,"title":{"_content":"Winter 2025"}},"stat":"ok"}"#;
        let info = serde_json::from_str::<PhotosetInfoResponse>(json).unwrap().into_info().unwrap();
        assert_eq!(info.photos, 11);
        assert_eq!(info.title.content, "Winter 2025");

        let failed = r#"{"stat":"fail"}"#;
        let err = serde_json::from_str::<PhotosetInfoResponse>(failed).unwrap().into_info().unwrap_err();
        assert!(matches!(err, ApiError::Service { code: 0, .. }));
        assert_eq!(err.to_string(), "Service error 0: Unknown error");
    }

    #[test]
    fn test_request_shapes_differ() {
        assert_ne!(RequestShape::Primary.extras(), RequestShape::Fallback.extras());
        assert!(RequestShape::Fallback.extras().contains("tags"));
    }
}
