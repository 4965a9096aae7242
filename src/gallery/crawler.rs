//! Batch crawler for the album catalog
//!
//! This module provides functionality for:
//! 1. Fetching every album of the catalog in fixed-size batches
//! 2. Folding each album's photos into the tag index as soon as it settles
//! 3. Publishing progress and lifecycle state on a watch channel
//! 4. Recomputing a pre-selected filter after every batch
//!
//! All fetches of a batch are in flight together on the calling task; the
//! next batch starts only after every fetch of the current one has settled.
//! There is no cancellation: `run` consumes the crawler and returns once the
//! whole catalog is processed.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::gallery::catalog::Catalog;
use crate::gallery::fetcher::AlbumSource;
use crate::gallery::logger::{log_album_crawled, OperationStatus};
use crate::gallery::photo::{AlbumRef, Photo};
use crate::gallery::search::{SearchEngine, SearchOutcome};
use crate::gallery::tag_index::TagIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlProgress {
    pub processed_albums: usize,
    pub total_albums: usize,
}

/// A filter chosen before the crawl started, e.g. from a deep link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlFilter {
    /// Exact tag
    Tag(String),
    /// Free-text fuzzy query
    Query(String),
}

/// Lifecycle of one crawl as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlState {
    Idle,
    Crawling {
        progress: CrawlProgress,
    },
    /// Crawling with a filter; `results` is refreshed after every batch.
    FilteringWhileCrawling {
        progress: CrawlProgress,
        filter: CrawlFilter,
        results: SearchOutcome,
    },
    Ready {
        progress: CrawlProgress,
    },
}

impl CrawlState {
    pub fn progress(&self) -> CrawlProgress {
        match self {
            CrawlState::Idle => CrawlProgress::default(),
            CrawlState::Crawling { progress }
            | CrawlState::FilteringWhileCrawling { progress, .. }
            | CrawlState::Ready { progress } => *progress,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, CrawlState::Ready { .. })
    }
}

/// Everything a finished crawl produced.
#[derive(Debug, Default)]
pub struct CrawlOutput {
    pub index: TagIndex,
    /// Every photo, in album completion order
    pub photos: Vec<Arc<Photo>>,
    pub progress: CrawlProgress,
    /// Albums that were attempted and yielded no result
    pub failed_albums: usize,
    pub skipped_albums: usize,
}

pub struct BatchCrawler<S: AlbumSource> {
    source: S,
    catalog: Arc<Catalog>,
    batch_size: usize,
    filter: Option<(CrawlFilter, SearchEngine)>,
    state_tx: watch::Sender<CrawlState>,
    session_id: Uuid,
}

impl<S: AlbumSource> BatchCrawler<S> {
    pub fn new(source: S, catalog: Arc<Catalog>, batch_size: usize) -> Self {
        let (state_tx, _) = watch::channel(CrawlState::Idle);
        Self {
            source,
            catalog,
            batch_size: batch_size.max(1),
            filter: None,
            state_tx,
            session_id: Uuid::new_v4(),
        }
    }

    /// Keep `filter` applied to the partial index while the crawl runs.
    pub fn with_filter(mut self, filter: CrawlFilter, engine: SearchEngine) -> Self {
        self.filter = Some((filter, engine));
        self
    }

    /// Receive every state change from now on.
    pub fn subscribe(&self) -> watch::Receiver<CrawlState> {
        self.state_tx.subscribe()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Crawl the whole catalog.
    pub async fn run(self) -> CrawlOutput {
        let span = tracing::info_span!("crawl", session_id = %self.session_id);
        self.crawl().instrument(span).await
    }

    async fn crawl(self) -> CrawlOutput {
        let mut output = CrawlOutput {
            progress: CrawlProgress {
                processed_albums: 0,
                total_albums: self.catalog.album_count(),
            },
            ..CrawlOutput::default()
        };

        // Albums without a usable source reference count as processed up front
        let mut pending: Vec<AlbumRef> = Vec::new();
        for album in self.catalog.albums() {
            match album.album_ref() {
                Some(album_ref) => pending.push(album_ref),
                None => {
                    debug!("Skipping album \"{}\": no source reference", album.title);
                    output.skipped_albums += 1;
                    output.progress.processed_albums += 1;
                }
            }
        }

        info!(
            "Crawling {} albums in batches of {} ({} skipped)",
            pending.len(),
            self.batch_size,
            output.skipped_albums
        );
        self.publish_progress(&output);

        let source = &self.source;
        for (batch_number, batch) in pending.chunks(self.batch_size).enumerate() {
            debug!("Starting batch {} with {} albums", batch_number + 1, batch.len());

            let mut in_flight: FuturesUnordered<_> = batch
                .iter()
                .map(|album| async move { (album, source.album_photos(album).await) })
                .collect();

            while let Some((album, result)) = in_flight.next().await {
                self.fold_album(&mut output, album, result);
                self.publish_progress(&output);
            }

            self.publish_batch_results(&output);
        }

        info!(
            "Crawl finished: {} photos, {} tags, {} failed albums",
            output.photos.len(),
            output.index.len(),
            output.failed_albums
        );
        self.state_tx.send_replace(CrawlState::Ready { progress: output.progress });

        output
    }

    fn fold_album(&self, output: &mut CrawlOutput, album: &AlbumRef, result: Option<Vec<Photo>>) {
        match result {
            Some(photos) => {
                log_album_crawled(self.session_id, album, photos.len(), OperationStatus::Completed);
                for photo in photos {
                    let photo = Arc::new(photo);
                    output.index.insert(&photo);
                    output.photos.push(photo);
                }
            }
            None => {
                log_album_crawled(self.session_id, album, 0, OperationStatus::Failed);
                output.failed_albums += 1;
            }
        }
        output.progress.processed_albums += 1;
    }

    /// Progress-only update; filter results are left as they were.
    fn publish_progress(&self, output: &CrawlOutput) {
        let progress = output.progress;
        self.state_tx.send_modify(|state| match state {
            CrawlState::FilteringWhileCrawling { progress: p, .. } => *p = progress,
            _ => {
                *state = match &self.filter {
                    Some((filter, _)) => CrawlState::FilteringWhileCrawling {
                        progress,
                        filter: filter.clone(),
                        results: SearchOutcome::Matches(Vec::new()),
                    },
                    None => CrawlState::Crawling { progress },
                }
            }
        });
    }

    fn publish_batch_results(&self, output: &CrawlOutput) {
        if let Some((filter, engine)) = &self.filter {
            let results = apply_filter(filter, engine, &output.index, &output.photos);
            debug!("Filter {:?} matches {} photos so far", filter, results.photos().len());
            self.state_tx.send_replace(CrawlState::FilteringWhileCrawling {
                progress: output.progress,
                filter: filter.clone(),
                results,
            });
        }
    }
}

/// Evaluate a filter against an index and photo list.
pub fn apply_filter(
    filter: &CrawlFilter,
    engine: &SearchEngine,
    index: &TagIndex,
    photos: &[Arc<Photo>],
) -> SearchOutcome {
    match filter {
        CrawlFilter::Tag(tag) => SearchOutcome::Matches(index.lookup(tag).to_vec()),
        CrawlFilter::Query(query) => engine.search(query, index, photos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::catalog::{Album, Collection, CollectionKind};
    use crate::gallery::config_loader::AppConfig;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Start(String),
        End(String),
    }

    /// Scripted source: per album id either photos or a failure.
    /// A gated album does not settle until its gate is notified.
    #[derive(Default)]
    struct FakeSource {
        albums: HashMap<String, Option<Vec<(String, Vec<String>)>>>,
        gates: HashMap<String, Arc<Notify>>,
        events: Mutex<Vec<Event>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeSource {
        fn with_album(mut self, id: &str, photos: Option<Vec<(&str, Vec<&str>)>>) -> Self {
            let photos = photos.map(|list| {
                list.into_iter()
                    .map(|(pid, tags)| (pid.to_string(), tags.into_iter().map(str::to_string).collect()))
                    .collect()
            });
            self.albums.insert(id.to_string(), photos);
            self
        }

        fn with_gate(mut self, id: &str, gate: Arc<Notify>) -> Self {
            self.gates.insert(id.to_string(), gate);
            self
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlbumSource for FakeSource {
        async fn album_photos(&self, album: &AlbumRef) -> Option<Vec<Photo>> {
            self.events.lock().unwrap().push(Event::Start(album.identifier.clone()));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::task::yield_now().await;
            if let Some(gate) = self.gates.get(&album.identifier) {
                gate.notified().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.events.lock().unwrap().push(Event::End(album.identifier.clone()));

            let owner = Arc::new(album.clone());
            self.albums.get(&album.identifier).cloned().unwrap_or(Some(Vec::new())).map(|list| {
                list.into_iter()
                    .map(|(id, tags)| Photo {
                        title: format!("Photo {}", id),
                        identifier: id,
                        description: String::new(),
                        tags,
                        thumbnail_url: String::new(),
                        full_size_url: String::new(),
                        owning_album: owner.clone(),
                    })
                    .collect()
            })
        }
    }

    fn album(title: &str, id: Option<&str>) -> Album {
        Album {
            title: title.to_string(),
            source_url: id.map(|id| format!("https://www.flickr.com/photos/jayneclamp/albums/{}/", id)),
            photo_count: None,
            cover_url: None,
            collection: CollectionKind::Music,
        }
    }

    fn catalog(albums: Vec<Album>) -> Arc<Catalog> {
        Arc::new(Catalog::new(vec![Collection { kind: CollectionKind::Music, albums }]))
    }

    fn ids(photos: &[Arc<Photo>]) -> Vec<&str> {
        photos.iter().map(|p| p.identifier.as_str()).collect()
    }

    #[tokio::test]
    async fn test_failed_album_does_not_stop_crawl() {
        let source = FakeSource::default()
            .with_album("100", Some(vec![("p1", vec!["live", "indoor"]), ("p2", vec!["crowd"]), ("p3", vec!["stage"])]))
            .with_album("200", None);
        let crawler = BatchCrawler::new(source, catalog(vec![album("A", Some("100")), album("B", Some("200"))]), 5);

        let output = crawler.run().await;

        assert_eq!(output.photos.len(), 3);
        assert_eq!(ids(output.index.lookup("live")), vec!["p1"]);
        assert_eq!(output.progress.processed_albums, 2);
        assert_eq!(output.progress.total_albums, 2);
        assert_eq!(output.failed_albums, 1);
    }

    #[tokio::test]
    async fn test_albums_without_source_count_as_processed() {
        let source = FakeSource::default().with_album("100", Some(vec![("p1", vec!["live"])]));
        let crawler = BatchCrawler::new(
            source,
            catalog(vec![album("Single photo", None), album("A", Some("100"))]),
            5,
        );

        let output = crawler.run().await;
        assert_eq!(output.progress.processed_albums, 2);
        assert_eq!(output.skipped_albums, 1);
        assert_eq!(output.photos.len(), 1);
    }

    #[tokio::test]
    async fn test_batches_are_strictly_sequential() {
        let albums: Vec<Album> = (0..12)
            .map(|i| album(&format!("Album {}", i), Some(format!("{}", 1000 + i).as_str())))
            .collect();
        let source = Arc::new(FakeSource::default());
        let output = BatchCrawler::new(source.clone(), catalog(albums), 5).run().await;

        assert_eq!(output.progress.processed_albums, 12);
        assert_eq!(source.peak_in_flight.load(Ordering::SeqCst), 5);

        let events = source.events();
        assert_eq!(events.len(), 24);
        let position = |event: Event| events.iter().position(|e| *e == event).unwrap();
        let batches: Vec<Vec<String>> = vec![
            (1000..1005).map(|i| i.to_string()).collect(),
            (1005..1010).map(|i| i.to_string()).collect(),
            (1010..1012).map(|i| i.to_string()).collect(),
        ];
        for pair in batches.windows(2) {
            let last_end = pair[0].iter().map(|id| position(Event::End(id.clone()))).max().unwrap();
            let first_start = pair[1].iter().map(|id| position(Event::Start(id.clone()))).min().unwrap();
            assert!(last_end < first_start, "batch overlapped the next one: {:?}", events);
        }
    }

    #[tokio::test]
    async fn test_progress_counts_each_album_once() {
        let albums: Vec<Album> = (0..7)
            .map(|i| album(&format!("Album {}", i), Some(format!("{}", 500 + i).as_str())))
            .collect();
        let crawler = BatchCrawler::new(FakeSource::default().with_album("502", None), catalog(albums), 3);
        let mut rx = crawler.subscribe();

        let collect = async {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                seen.push(state.progress().processed_albums);
                if state.is_ready() {
                    break;
                }
            }
            seen
        };

        let (output, seen) = tokio::join!(crawler.run(), collect);
        assert_eq!(output.progress.processed_albums, 7);
        assert_eq!(output.failed_albums, 1);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&7));
    }

    #[tokio::test]
    async fn test_filter_results_published_while_crawling() {
        let second_batch = Arc::new(Notify::new());
        let source = FakeSource::default()
            .with_album("1", Some(vec![("a1", vec!["live"])]))
            .with_album("2", Some(vec![("b1", vec!["birds"])]))
            .with_album("3", Some(vec![("c1", vec!["live"])]))
            .with_gate("3", second_batch.clone());
        let albums = vec![album("One", Some("1")), album("Two", Some("2")), album("Three", Some("3"))];
        let engine = SearchEngine::new(&AppConfig::default().search);
        let crawler = BatchCrawler::new(source, catalog(albums), 2)
            .with_filter(CrawlFilter::Tag("live".to_string()), engine);
        let mut rx = crawler.subscribe();

        // Album 3 stays open until released, so the state after the first batch holds still
        let between_batches = async {
            let state = tokio::time::timeout(
                Duration::from_secs(5),
                rx.wait_for(|state| state.progress().processed_albums == 2),
            )
            .await
            .expect("first batch never finished")
            .expect("crawler dropped the channel")
            .clone();
            second_batch.notify_one();
            state
        };

        let (output, between) = tokio::join!(crawler.run(), between_batches);

        let CrawlState::FilteringWhileCrawling { progress, results, .. } = &between else {
            panic!("expected filtering state between batches, got {:?}", between);
        };
        assert_eq!(progress.total_albums, 3);
        assert_eq!(ids(results.photos()), vec!["a1"]);

        assert!(rx.borrow().is_ready());
        assert_eq!(output.progress.processed_albums, 3);

        let engine = SearchEngine::new(&AppConfig::default().search);
        let filter = CrawlFilter::Tag("live".to_string());
        let final_results = apply_filter(&filter, &engine, &output.index, &output.photos);
        assert_eq!(ids(final_results.photos()), vec!["a1", "c1"]);
    }

    #[tokio::test]
    async fn test_recrawl_yields_same_tag_sets() {
        let make_source = || {
            FakeSource::default()
                .with_album("1", Some(vec![("a1", vec!["live", "indoor"]), ("a2", vec!["live"])]))
                .with_album("2", Some(vec![("b1", vec!["indoor", "crowd"])]))
                .with_album("3", None)
        };
        let albums = vec![album("One", Some("1")), album("Two", Some("2")), album("Three", Some("3"))];
        let shared = catalog(albums);

        let first = BatchCrawler::new(make_source(), shared.clone(), 2).run().await;
        let second = BatchCrawler::new(make_source(), shared, 2).run().await;

        let tag_sets = |output: &CrawlOutput| -> BTreeMap<String, BTreeSet<String>> {
            output
                .index
                .all_tags()
                .into_iter()
                .map(|tag| {
                    let set = output.index.lookup(tag).iter().map(|p| p.identifier.clone()).collect();
                    (tag.to_string(), set)
                })
                .collect()
        };
        assert_eq!(tag_sets(&first), tag_sets(&second));
        assert_eq!(first.index.all_tags(), vec!["crowd", "indoor", "live"]);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_ready_immediately() {
        let crawler = BatchCrawler::new(FakeSource::default(), catalog(Vec::new()), 5);
        let rx = crawler.subscribe();
        let output = crawler.run().await;

        assert!(output.photos.is_empty());
        assert!(rx.borrow().is_ready());
    }
}
