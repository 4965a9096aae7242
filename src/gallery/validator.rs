//! Album id validation
//!
//! Checks every catalog album against the remote info endpoint so broken
//! source links are found before a crawl silently drops them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::gallery::catalog::{Album, Catalog};
use crate::gallery::config_loader::Validation;
use crate::gallery::flickr::{ApiError, PhotoApi};
use crate::gallery::logger::{log_validation, OperationStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid { photo_count: u32 },
    /// The service answered and rejected the album
    Invalid { message: String },
    /// The album could not be checked
    Error { message: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct AlbumValidation {
    pub title: String,
    pub album_id: Option<String>,
    pub source_url: Option<String>,
    pub outcome: ValidationOutcome,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: Vec<AlbumValidation>,
    pub invalid: Vec<AlbumValidation>,
    pub errors: Vec<AlbumValidation>,
    pub skipped: Vec<AlbumValidation>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ValidationReport {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            valid: Vec::new(),
            invalid: Vec::new(),
            errors: Vec::new(),
            skipped: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, validation: AlbumValidation) {
        match validation.outcome {
            ValidationOutcome::Valid { .. } => self.valid.push(validation),
            ValidationOutcome::Invalid { .. } => self.invalid.push(validation),
            ValidationOutcome::Error { .. } => self.errors.push(validation),
            ValidationOutcome::Skipped { .. } => self.skipped.push(validation),
        }
    }

    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len() + self.errors.len() + self.skipped.len()
    }

    /// Albums that need fixing.
    pub fn issue_count(&self) -> usize {
        self.invalid.len() + self.errors.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    pub fn log_summary(&self) {
        info!(
            valid = self.valid.len(),
            invalid = self.invalid.len(),
            errors = self.errors.len(),
            skipped = self.skipped.len(),
            total = self.total(),
            duration_ms = (self.finished_at - self.started_at).num_milliseconds(),
            "Album validation finished"
        );
        for album in self.invalid.iter().chain(self.errors.iter()) {
            warn!(
                album_title = %album.title,
                album_id = album.album_id.as_deref(),
                source_url = album.source_url.as_deref(),
                "Album needs fixing: {:?}",
                album.outcome
            );
        }
    }
}

pub struct AlbumValidator<A: PhotoApi> {
    api: A,
    request_delay: Duration,
}

impl<A: PhotoApi> AlbumValidator<A> {
    pub fn new(api: A, config: &Validation) -> Self {
        Self {
            api,
            request_delay: Duration::from_millis(config.request_delay_ms),
        }
    }

    /// Validate `albums` one at a time, pausing between remote requests.
    pub async fn validate_albums<'a, I>(&self, albums: I) -> ValidationReport
    where
        I: IntoIterator<Item = &'a Album>,
    {
        let mut report = ValidationReport::new();
        let mut requested = false;

        for album in albums {
            let needs_request = album.identifier().is_some();
            if needs_request && requested && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
            requested |= needs_request;

            report.record(self.validate_album(album).await);
        }

        report.finished_at = Utc::now();
        report.log_summary();
        report
    }

    /// Validate a single album.
    pub async fn validate_album(&self, album: &Album) -> AlbumValidation {
        let mut validation = AlbumValidation {
            title: album.title.clone(),
            album_id: album.identifier(),
            source_url: album.source_url.clone(),
            outcome: ValidationOutcome::Skipped {
                reason: "No source URL (likely a single photo album)".to_string(),
            },
        };

        let Some(source_url) = album.source_url.as_deref() else {
            log_validation(&album.title, None, OperationStatus::Skipped, "no source URL");
            return validation;
        };

        let Some(album_id) = validation.album_id.clone() else {
            let message = format!("Could not extract album id from {}", source_url);
            log_validation(&album.title, None, OperationStatus::Failed, &message);
            validation.outcome = ValidationOutcome::Error { message };
            return validation;
        };

        validation.outcome = match self.api.photoset_info(&album_id).await {
            Ok(info) => {
                log_validation(&album.title, Some(&album_id), OperationStatus::Completed, "valid");
                ValidationOutcome::Valid { photo_count: info.photos }
            }
            Err(ApiError::Service { message, .. }) => {
                log_validation(&album.title, Some(&album_id), OperationStatus::Failed, &message);
                ValidationOutcome::Invalid { message }
            }
            Err(e) => {
                let message = e.to_string();
                log_validation(&album.title, Some(&album_id), OperationStatus::Failed, &message);
                ValidationOutcome::Error { message }
            }
        };
        validation
    }

    /// Validate the first album whose title contains `title_fragment`.
    /// `None` when no album matches.
    pub async fn check_single_album(&self, catalog: &Catalog, title_fragment: &str) -> Option<AlbumValidation> {
        let Some(album) = catalog.find_by_title(title_fragment) else {
            warn!("Album not found: {}", title_fragment);
            return None;
        };
        Some(self.validate_album(album).await)
    }
}
