//! Structured logging for the tag indexer
//!
//! This module provides functionality for:
//! 1. Installing the tracing subscriber (rolling file + terminal warnings)
//! 2. Logging every API fetch, crawled album and search with a common shape
//! 3. Writing the file log as JSON or plain lines

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing::Subscriber;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan, MakeWriter},
    prelude::*,
    EnvFilter,
};
use uuid::Uuid;

use crate::gallery::config_loader::Logging;
use crate::gallery::photo::AlbumRef;

const LOG_FILE_NAME: &str = "photo_tag_index.log";

/// Error types for logging
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for logging operations
pub type LoggerResult<T> = Result<T, LoggerError>;

/// Log entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEntryType {
    ApiFetch,
    Crawl,
    Search,
    Validation,
}

impl std::fmt::Display for LogEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogEntryType::ApiFetch => write!(f, "api_fetch"),
            LogEntryType::Crawl => write!(f, "crawl"),
            LogEntryType::Search => write!(f, "search"),
            LogEntryType::Validation => write!(f, "validation"),
        }
    }
}

/// Status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Completed => write!(f, "completed"),
            OperationStatus::Failed => write!(f, "failed"),
            OperationStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Owns the background writer of the file log. Keep it alive until exit so
/// buffered lines are flushed.
pub struct Logger {
    log_dir: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Install the global subscriber from the `[logging]` config section.
    pub fn init(logging: &Logging) -> LoggerResult<Self> {
        // RUST_LOG wins over the configured level
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&logging.log_level))
            .map_err(|e| LoggerError::Logging(e.to_string()))?;

        let mut guard = None;
        let mut log_dir = None;

        let file_layer = if logging.log_to_file {
            let dir = PathBuf::from(&logging.log_directory);
            std::fs::create_dir_all(&dir)?;

            let (non_blocking, worker_guard) = tracing_appender::non_blocking(Self::appender(&dir));
            guard = Some(worker_guard);
            log_dir = Some(dir);

            let layer = match logging.log_format.as_str() {
                "json" => fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_span_events(FmtSpan::CLOSE)
                    .boxed(),
                _ => fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .with_span_events(FmtSpan::CLOSE)
                    .boxed(),
            };
            Some(layer)
        } else {
            None
        };

        // Warnings and errors always reach the terminal
        let terminal_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .with_filter(LevelFilter::WARN);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(terminal_layer)
            .try_init()
            .map_err(|e| LoggerError::Logging(e.to_string()))?;

        info!(
            log_format = %logging.log_format,
            log_level = %logging.log_level,
            log_to_file = logging.log_to_file,
            message = "Logger initialized",
        );

        Ok(Self { log_dir, _guard: guard })
    }

    /// Terminal-only subscriber for events emitted before [`Logger::init`],
    /// such as config loading. Scope it with [`tracing::subscriber::with_default`].
    pub fn bootstrap_subscriber() -> impl Subscriber + Send + Sync {
        Self::bootstrap_subscriber_with(std::io::stderr, true)
    }

    fn bootstrap_subscriber_with<W>(writer: W, ansi: bool) -> impl Subscriber + Send + Sync
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        fmt::Subscriber::builder()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_max_level(LevelFilter::WARN)
            .compact()
            .finish()
    }

    fn appender(dir: &Path) -> RollingFileAppender {
        RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME)
    }

    /// Directory of the file log, if file logging is on.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Log one page request against the remote listing endpoint.
pub fn log_api_fetch(album_id: &str, page: u32, shape: &str, status: OperationStatus, detail: Option<&str>) {
    let entry_type = LogEntryType::ApiFetch;
    match status {
        OperationStatus::Failed => warn!(
            entry_type = %entry_type,
            album_id = album_id,
            page = page,
            shape = shape,
            status = %status,
            detail = detail,
            timestamp = %Utc::now().to_rfc3339(),
            message = %format!("Fetch of album {} page {} failed", album_id, page),
        ),
        _ => tracing::debug!(
            entry_type = %entry_type,
            album_id = album_id,
            page = page,
            shape = shape,
            status = %status,
            timestamp = %Utc::now().to_rfc3339(),
        ),
    }
}

/// Log the outcome of one album during a crawl.
pub fn log_album_crawled(session_id: Uuid, album: &AlbumRef, photo_count: usize, status: OperationStatus) {
    info!(
        entry_type = %LogEntryType::Crawl,
        session_id = %session_id,
        album_id = %album.identifier,
        album_title = %album.title,
        collection = %album.collection,
        photo_count = photo_count,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        message = %format!("Album \"{}\" {} with {} photos", album.title, status, photo_count),
    );
}

/// Log a search and how many photos it produced.
pub fn log_search(query: &str, result_count: Option<usize>) {
    info!(
        entry_type = %LogEntryType::Search,
        query = query,
        result_count = result_count,
        timestamp = %Utc::now().to_rfc3339(),
    );
}

/// Log the validation result of one album.
pub fn log_validation(title: &str, album_id: Option<&str>, status: OperationStatus, detail: &str) {
    info!(
        entry_type = %LogEntryType::Validation,
        album_title = title,
        album_id = album_id,
        status = %status,
        detail = detail,
        timestamp = %Utc::now().to_rfc3339(),
    );
}
