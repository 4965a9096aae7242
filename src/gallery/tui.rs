use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::watch;
use tracing::warn;

use crate::gallery::crawler::CrawlState;

const FALLBACK_TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar} {pos}/{len}";

/// A builder that helps in making a new [ProgressStyle] for use.
pub(crate) struct ProgressStyleBuilder {
    progress_style: ProgressStyle,
}

impl ProgressStyleBuilder {
    /// Sets the template of the progress style, falling back to a plain bar
    /// when `msg_template` does not parse.
    pub(crate) fn template(mut self, msg_template: &str) -> Self {
        self.progress_style = match self.progress_style.clone().template(msg_template) {
            Ok(style) => style,
            Err(err) => {
                warn!("Template error with '{}': {}. Using fallback template.", msg_template, err);
                self.progress_style
                    .clone()
                    .template(FALLBACK_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
            }
        };
        self
    }

    pub(crate) fn progress_chars(mut self, chars: &str) -> Self {
        self.progress_style = self.progress_style.progress_chars(chars);
        self
    }

    pub(crate) fn build(self) -> ProgressStyle {
        self.progress_style
    }
}

impl Default for ProgressStyleBuilder {
    fn default() -> Self {
        Self {
            progress_style: ProgressStyle::default_bar(),
        }
    }
}

/// A builder that helps in initializing and configuring a new [ProgressBar] for use.
pub(crate) struct ProgressBarBuilder {
    progress_bar: ProgressBar,
}

impl ProgressBarBuilder {
    pub(crate) fn new(len: u64) -> Self {
        Self {
            progress_bar: ProgressBar::new(len),
        }
    }

    pub(crate) fn style(self, progress_style: ProgressStyle) -> Self {
        self.progress_bar.set_style(progress_style);
        self
    }

    pub(crate) fn draw_target(self, target: ProgressDrawTarget) -> Self {
        self.progress_bar.set_draw_target(target);
        self
    }

    pub(crate) fn steady_tick(self, duration: Duration) -> Self {
        self.progress_bar.enable_steady_tick(duration);
        self
    }

    pub(crate) fn build(self) -> ProgressBar {
        self.progress_bar
    }
}

/// Progress bar for a crawl over `total_albums` albums.
pub(crate) fn crawl_progress_bar(total_albums: usize) -> ProgressBar {
    let style = ProgressStyleBuilder::default()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} albums {msg}")
        .progress_chars("=>-")
        .build();

    ProgressBarBuilder::new(total_albums as u64)
        .style(style)
        .draw_target(ProgressDrawTarget::stderr())
        .steady_tick(Duration::from_millis(100))
        .build()
}

/// Mirror crawl state onto `bar` until the crawl is ready.
pub(crate) async fn follow_crawl(mut state: watch::Receiver<CrawlState>, bar: ProgressBar) {
    loop {
        let snapshot = state.borrow_and_update().clone();
        let progress = snapshot.progress();
        bar.set_position(progress.processed_albums as u64);

        match &snapshot {
            CrawlState::FilteringWhileCrawling { results, .. } => {
                bar.set_message(format!("({} matching so far)", results.photos().len()));
            }
            CrawlState::Ready { .. } => {
                bar.finish_with_message("done");
                return;
            }
            CrawlState::Idle | CrawlState::Crawling { .. } => {}
        }

        if state.changed().await.is_err() {
            bar.abandon();
            return;
        }
    }
}
