use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gallery::catalog::{Album, Catalog, Collection, CollectionKind};

// Define error types for config loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

// Result type alias for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

const APP_CONFIG_FILE: &str = "config.toml";
const CATALOG_FILE: &str = "catalog.toml";

// Config structs for config.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Api {
    pub endpoint: String,
    pub api_key: String,
    pub user_agent: String,
    /// Request timeout in seconds. Unset means the transport default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Limits {
    pub per_page: u32,
    pub max_photos_per_album: usize,
    pub batch_size: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Search {
    pub min_query_len: usize,
    pub tag_threshold: f64,
    pub text_threshold: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Validation {
    pub request_delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Logging {
    pub log_level: String,
    pub log_format: String,
    pub log_directory: String,
    pub log_to_file: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub api: Api,
    pub limits: Limits,
    pub search: Search,
    pub validation: Validation,
    pub logging: Logging,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: Api {
                endpoint: "https://api.flickr.com/services/rest/".to_string(),
                api_key: "your_api_key_here".to_string(),
                user_agent: format!("photo_tag_index/{}", env!("CARGO_PKG_VERSION")),
                timeout_secs: None,
            },
            limits: Limits {
                per_page: 100,
                max_photos_per_album: 500,
                batch_size: 5,
            },
            search: Search {
                min_query_len: 2,
                tag_threshold: 0.3,
                text_threshold: 0.4,
            },
            validation: Validation {
                request_delay_ms: 100,
            },
            logging: Logging {
                log_level: "info".to_string(),
                log_format: "json".to_string(),
                log_directory: "./logs".to_string(),
                log_to_file: true,
            },
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        let album = |title: &str, id: &str, photo_count: u32, collection: CollectionKind| Album {
            title: title.to_string(),
            source_url: Some(format!("https://www.flickr.com/photos/jayneclamp/albums/{}/", id)),
            photo_count: Some(photo_count),
            cover_url: None,
            collection,
        };

        Catalog::new(vec![
            Collection {
                kind: CollectionKind::Music,
                albums: vec![
                    album("2025-10-19 Porchfest @ Athens, GA", "72177720329859726", 12, CollectionKind::Music),
                    album("2025-09-21 Vincas @ Hendershots | Athens, GA", "72177720329904439", 11, CollectionKind::Music),
                ],
            },
            Collection { kind: CollectionKind::Events, albums: Vec::new() },
            Collection { kind: CollectionKind::Travel, albums: Vec::new() },
            Collection { kind: CollectionKind::Birds, albums: Vec::new() },
            Collection {
                kind: CollectionKind::Landscapes,
                albums: vec![
                    album("Winter 2025 | Athens, GA", "72177720323325987", 11, CollectionKind::Landscapes),
                ],
            },
            Collection { kind: CollectionKind::Pets, albums: Vec::new() },
        ])
    }
}

/// Loads `config.toml` and `catalog.toml` from one directory.
///
/// Both files are read once; the catalog is handed out behind an [`Arc`] and
/// never changes for the lifetime of the process.
pub struct ConfigManager {
    app_config: AppConfig,
    catalog: Arc<Catalog>,
    config_dir: PathBuf,
}

impl ConfigManager {
    // Create a new ConfigManager instance
    pub fn new(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            tracing::info!("Creating config directory: {}", config_dir.display());
            fs::create_dir_all(&config_dir)?;
        }

        let app_config = Self::load_app_config(&config_dir)?;
        let catalog = Self::load_catalog(&config_dir)?;

        let manager = Self {
            app_config,
            catalog: Arc::new(catalog),
            config_dir,
        };

        // Create default config files if they don't exist
        manager.create_default_configs()?;

        Ok(manager)
    }

    // Load app config from config.toml
    fn load_app_config(config_dir: &Path) -> ConfigResult<AppConfig> {
        let config_path = config_dir.join(APP_CONFIG_FILE);

        if !config_path.exists() {
            tracing::warn!("Config file not found: {}", config_path.display());
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&config_path)?;
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse {}: {}", APP_CONFIG_FILE, e);
                tracing::info!("Backing up old config and creating new one with default values");

                if let Err(backup_err) = fs::rename(&config_path, config_path.with_extension("toml.backup")) {
                    tracing::warn!("Failed to backup old config: {}", backup_err);
                }

                let default_config = AppConfig::default();
                Self::write_toml(&config_path, &default_config)?;
                tracing::info!("Created new {} with default values", APP_CONFIG_FILE);

                Ok(default_config)
            }
        }
    }

    // Load the album catalog from catalog.toml. Unlike config.toml, a catalog
    // that fails to parse is not replaced.
    fn load_catalog(config_dir: &Path) -> ConfigResult<Catalog> {
        let catalog_path = config_dir.join(CATALOG_FILE);

        if !catalog_path.exists() {
            tracing::warn!("Catalog file not found: {}", catalog_path.display());
            return Ok(Catalog::default());
        }

        let content = fs::read_to_string(&catalog_path)?;
        let catalog: Catalog = toml::from_str(&content)?;
        Ok(catalog.with_collection_tags())
    }

    fn write_toml<T: Serialize>(path: &Path, value: &T) -> ConfigResult<()> {
        let toml_string = toml::to_string_pretty(value)
            .map_err(|e| ConfigError::TomlSer(e.to_string()))?;
        fs::write(path, toml_string)?;
        Ok(())
    }

    pub fn app_config(&self) -> &AppConfig {
        &self.app_config
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.clone()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    // Check that an API key other than the placeholder is configured
    pub fn has_api_key(&self) -> bool {
        let key = &self.app_config.api.api_key;
        !key.is_empty() && key != "your_api_key_here"
    }

    // Create all default config files if they don't exist
    pub fn create_default_configs(&self) -> ConfigResult<()> {
        let config_path = self.config_dir.join(APP_CONFIG_FILE);
        if !config_path.exists() {
            Self::write_toml(&config_path, &self.app_config)?;
            tracing::info!("Created default {}", config_path.display());
        }

        let catalog_path = self.config_dir.join(CATALOG_FILE);
        if !catalog_path.exists() {
            Self::write_toml(&catalog_path, self.catalog.as_ref())?;
            tracing::info!("Created default {}", catalog_path.display());
        }

        Ok(())
    }
}
