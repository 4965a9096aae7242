use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use console::{Term, style};
use dialoguer::{Input, theme::ColorfulTheme};
use tracing::{info, trace, warn};

use crate::gallery::logger::log_search;
use crate::gallery::tui::{crawl_progress_bar, follow_crawl};
use crate::gallery::{
    apply_filter, Album, AlbumPhotoFetcher, AlbumValidator, BatchCrawler, CollectionKind,
    ConfigManager, CrawlFilter, CrawlOutput, DeepLink, FlickrClient, Photo, SearchEngine,
    SearchOutcome, ValidationOutcome, ValidationReport,
};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crawl a photo portfolio and search it by tag or free text.
#[derive(Parser, Debug)]
#[command(name = "photo_tag_index", version, about)]
pub(crate) struct Cli {
    /// Directory holding config.toml and catalog.toml
    #[arg(long, env = "PHOTO_TAG_INDEX_CONFIG_DIR", default_value = "config")]
    pub(crate) config_dir: PathBuf,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Crawl every album, then search. Prompts for queries when none is given.
    Search {
        query: Option<String>,
        /// Only photos carrying exactly this tag
        #[arg(long)]
        tag: Option<String>,
        /// Portfolio link or query string carrying `tag` / `search`
        #[arg(long)]
        link: Option<String>,
    },
    /// Crawl every album and print the most used tags
    Tags {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// List the catalog
    Albums { collection: Option<CollectionKind> },
    /// Check every album id against the photo service
    Validate {
        #[arg(long)]
        collection: Option<CollectionKind>,
    },
    /// Check the first album whose title contains TITLE
    Check { title: String },
}

/// Handles the flow of one command from start to finish.
pub(crate) struct Program {
    config: ConfigManager,
}

impl Program {
    pub(crate) fn new(config: ConfigManager) -> Self {
        Self { config }
    }

    pub(crate) async fn run(&self, command: Command) -> Result<()> {
        Term::stdout().set_title("photo tag index");
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);
        trace!("Config Directory: {}", self.config.config_dir().display());

        if !self.config.has_api_key() && !matches!(command, Command::Albums { .. }) {
            warn!("No API key configured, remote requests will fail");
            println!(
                "{} set api.api_key in {}",
                style("No API key configured:").yellow().bold(),
                self.config.config_dir().join("config.toml").display()
            );
        }

        match command {
            Command::Search { query, tag, link } => self.search(query, tag, link).await,
            Command::Tags { limit } => self.tags(limit).await,
            Command::Albums { collection } => self.albums(collection),
            Command::Validate { collection } => self.validate(collection).await,
            Command::Check { title } => self.check(&title).await,
        }
    }

    /// Crawl the whole catalog with a progress bar, optionally filtering as it goes.
    async fn crawl(&self, filter: Option<CrawlFilter>) -> Result<CrawlOutput> {
        let config = self.config.app_config();
        let catalog = self.config.catalog();

        let client = FlickrClient::new(&config.api)?;
        let fetcher = AlbumPhotoFetcher::from_limits(client, &config.limits);
        let mut crawler = BatchCrawler::new(fetcher, catalog.clone(), config.limits.batch_size);
        if let Some(filter) = filter {
            crawler = crawler.with_filter(filter, SearchEngine::new(&config.search));
        }

        info!("Starting crawl session {}", crawler.session_id());
        let bar = crawl_progress_bar(catalog.album_count());
        let state = crawler.subscribe();
        let (output, ()) = tokio::join!(crawler.run(), follow_crawl(state, bar));

        if output.failed_albums > 0 {
            println!(
                "{}",
                style(format!("{} albums could not be fetched", output.failed_albums)).red()
            );
        }
        println!(
            "Indexed {} photos under {} tags from {} albums",
            output.photos.len(),
            output.index.len(),
            output.progress.total_albums
        );
        Ok(output)
    }

    async fn search(&self, query: Option<String>, tag: Option<String>, link: Option<String>) -> Result<()> {
        let mut deep_link = link.as_deref().map(DeepLink::parse).unwrap_or_default();
        if tag.is_some() {
            deep_link.tag = tag;
        }
        if !deep_link.is_empty() {
            info!("Applying deep link: tag={:?} search={:?}", deep_link.tag, deep_link.search);
        }
        let query = query.or_else(|| deep_link.query().map(str::to_string));
        // A tag takes precedence over the query while crawling
        let filter = deep_link
            .filter()
            .or_else(|| query.clone().map(CrawlFilter::Query));

        let output = self.crawl(filter.clone()).await?;
        let engine = SearchEngine::new(&self.config.app_config().search);

        if let Some(CrawlFilter::Tag(tag)) = &filter {
            if output.index.contains_tag(tag) {
                let outcome = apply_filter(&CrawlFilter::Tag(tag.clone()), &engine, &output.index, &output.photos);
                print_outcome(&format!("tag \"{}\"", tag), &outcome);
            } else {
                println!("{}", style(format!("No photos tagged \"{}\"", tag)).yellow());
            }
        }

        match query {
            Some(query) => {
                let outcome = engine.search(&query, &output.index, &output.photos);
                log_search(&query, outcome_len(&outcome));
                print_outcome(&query, &outcome);
            }
            None if filter.is_none() => self.prompt_searches(&engine, &output)?,
            None => {}
        }
        Ok(())
    }

    /// Read queries until an empty line.
    fn prompt_searches(&self, engine: &SearchEngine, output: &CrawlOutput) -> Result<()> {
        let theme = ColorfulTheme::default();
        loop {
            let query: String = Input::with_theme(&theme)
                .with_prompt("Search (empty to quit)")
                .allow_empty(true)
                .interact_text()?;
            if query.trim().is_empty() {
                return Ok(());
            }

            let outcome = engine.search(&query, &output.index, &output.photos);
            log_search(&query, outcome_len(&outcome));
            print_outcome(&query, &outcome);
        }
    }

    async fn tags(&self, limit: usize) -> Result<()> {
        let output = self.crawl(None).await?;
        for (tag, count) in output.index.tag_counts().into_iter().take(limit) {
            println!("{:>6}  {}", style(count).cyan(), tag);
        }
        Ok(())
    }

    fn albums(&self, collection: Option<CollectionKind>) -> Result<()> {
        let catalog = self.config.catalog();
        for group in catalog.collections() {
            if collection.is_some_and(|wanted| wanted != group.kind) {
                continue;
            }
            println!("{} ({} albums)", style(group.kind).bold(), group.albums.len());
            for album in &group.albums {
                let id = album.identifier().unwrap_or_else(|| "-".to_string());
                let count = album.photo_count.map(|n| n.to_string()).unwrap_or_default();
                println!("  {:<20} {:>4}  {}", style(id).dim(), count, album.title);
            }
        }
        Ok(())
    }

    async fn validate(&self, collection: Option<CollectionKind>) -> Result<()> {
        let catalog = self.config.catalog();
        let albums: Vec<&Album> = match collection {
            Some(kind) => catalog
                .collection(kind)
                .map(|group| group.albums.iter().collect())
                .unwrap_or_default(),
            None => catalog.albums().collect(),
        };
        println!("Checking {} albums...", albums.len());

        let report = self.validator()?.validate_albums(albums).await;
        print_report(&report);
        Ok(())
    }

    async fn check(&self, title: &str) -> Result<()> {
        let catalog = self.config.catalog();
        let Some(validation) = self.validator()?.check_single_album(&catalog, title).await else {
            bail!("Album not found: {}", title);
        };
        println!("{}  {}", style(&validation.title).bold(), describe(&validation.outcome));
        if let Some(url) = &validation.source_url {
            println!("  {}", style(url).dim());
        }
        Ok(())
    }

    fn validator(&self) -> Result<AlbumValidator<FlickrClient>> {
        let config = self.config.app_config();
        Ok(AlbumValidator::new(FlickrClient::new(&config.api)?, &config.validation))
    }
}

fn outcome_len(outcome: &SearchOutcome) -> Option<usize> {
    (!outcome.is_no_query()).then(|| outcome.photos().len())
}

fn print_outcome(label: &str, outcome: &SearchOutcome) {
    match outcome {
        SearchOutcome::NoQuery => println!("{}", style("Type at least two characters to search").dim()),
        SearchOutcome::Matches(photos) if photos.is_empty() => {
            println!("No photos found for {}", style(label).bold());
        }
        SearchOutcome::Matches(photos) => {
            println!("{} photos for {}", style(photos.len()).green(), style(label).bold());
            for photo in photos {
                print_photo(photo);
            }
        }
    }
}

fn print_photo(photo: &Arc<Photo>) {
    println!(
        "  {}  {} / {}",
        style(&photo.identifier).dim(),
        photo.owning_album.title,
        if photo.title.is_empty() { "(untitled)" } else { photo.title.as_str() }
    );
    println!("      {}", style(&photo.full_size_url).underlined());
}

fn describe(outcome: &ValidationOutcome) -> String {
    match outcome {
        ValidationOutcome::Valid { photo_count } => format!("{} {} photos", style("valid").green(), photo_count),
        ValidationOutcome::Invalid { message } => format!("{} {}", style("invalid").red(), message),
        ValidationOutcome::Error { message } => format!("{} {}", style("error").red(), message),
        ValidationOutcome::Skipped { reason } => format!("{} {}", style("skipped").yellow(), reason),
    }
}

fn print_report(report: &ValidationReport) {
    println!();
    println!("{}", style("Validation summary").bold());
    println!("  valid:   {}", report.valid.len());
    println!("  invalid: {}", report.invalid.len());
    println!("  errors:  {}", report.errors.len());
    println!("  skipped: {}", report.skipped.len());

    for validation in report.invalid.iter().chain(report.errors.iter()) {
        println!("{}  {}", style(&validation.title).bold(), describe(&validation.outcome));
        if let Some(id) = &validation.album_id {
            println!("  album id: {}", id);
        }
        if let Some(url) = &validation.source_url {
            println!("  url: {}", url);
        }
    }

    if report.is_clean() {
        println!("{}", style("All albums validated successfully").green());
    } else {
        println!("{}", style(format!("{} albums need fixing", report.issue_count())).yellow());
    }
}
