//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::types::SortDimension;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bidhall";
const ENV_PREFIX: &str = "BIDHALL";
const DEFAULT_PAGE_SIZE: u64 = 9;
const DEFAULT_ITEMS_COLLECTION: &str = "items";
const DEFAULT_QUESTIONS_COLLECTION: &str = "questions";
const DEFAULT_OFFERS_COLLECTION: &str = "offers";
const DEFAULT_IMAGE_PREFIX: &str = "images";

/// Command-line arguments for the bidhall binary.
#[derive(Debug, Parser)]
#[command(name = "bidhall", version, about = "Auction storefront data layer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BIDHALL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Load the storefront from a fixture and print listing pages.
    Browse(BrowseArgs),
    /// Search a fixture by name prefix and/or category.
    Search(SearchArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the listing page size.
    #[arg(long = "page-size", value_name = "COUNT")]
    pub page_size: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct BrowseArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Listing order to browse.
    #[arg(long, value_enum, default_value_t = SortDimension::Latest)]
    pub dimension: SortDimension,

    /// Number of pages to walk forward from the first one.
    #[arg(long, default_value_t = 1)]
    pub pages: u32,

    /// JSON fixture with `items`, `questions` and `offers` collections.
    #[arg(value_name = "FIXTURE", value_hint = ValueHint::FilePath)]
    pub fixture: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Case-insensitive name prefix.
    #[arg(long)]
    pub name: Option<String>,

    /// Exact category.
    #[arg(long)]
    pub category: Option<String>,

    /// JSON fixture with `items`, `questions` and `offers` collections.
    #[arg(value_name = "FIXTURE", value_hint = ValueHint::FilePath)]
    pub fixture: PathBuf,
}

impl Command {
    fn overrides(&self) -> &CommonOverrides {
        match self {
            Command::Browse(args) => &args.overrides,
            Command::Search(args) => &args.overrides,
        }
    }
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub listing: ListingSettings,
    pub collections: CollectionSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub page_size: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub items: String,
    pub questions: String,
    pub offers: String,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub image_prefix: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    listing: RawListingSettings,
    collections: RawCollectionSettings,
    storage: RawStorageSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(size) = overrides.page_size {
            self.listing.page_size = Some(size);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            listing,
            collections,
            storage,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            listing: build_listing_settings(listing)?,
            collections: build_collection_settings(collections)?,
            storage: build_storage_settings(storage)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_listing_settings(listing: RawListingSettings) -> Result<ListingSettings, LoadError> {
    let page_size = non_zero_u32(
        listing.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        "listing.page_size",
    )?;
    Ok(ListingSettings { page_size })
}

fn build_collection_settings(
    collections: RawCollectionSettings,
) -> Result<CollectionSettings, LoadError> {
    let items = collection_name(collections.items, DEFAULT_ITEMS_COLLECTION, "collections.items")?;
    let questions = collection_name(
        collections.questions,
        DEFAULT_QUESTIONS_COLLECTION,
        "collections.questions",
    )?;
    let offers = collection_name(
        collections.offers,
        DEFAULT_OFFERS_COLLECTION,
        "collections.offers",
    )?;

    if items == questions || items == offers || questions == offers {
        return Err(LoadError::invalid(
            "collections",
            "items, questions and offers must use distinct collections",
        ));
    }

    Ok(CollectionSettings {
        items,
        questions,
        offers,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let image_prefix = storage
        .image_prefix
        .unwrap_or_else(|| DEFAULT_IMAGE_PREFIX.to_string());
    let image_prefix = image_prefix.trim().trim_matches('/').to_string();
    if image_prefix.is_empty() {
        return Err(LoadError::invalid(
            "storage.image_prefix",
            "prefix must not be empty",
        ));
    }
    Ok(StorageSettings { image_prefix })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawListingSettings {
    page_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCollectionSettings {
    items: Option<String>,
    questions: Option<String>,
    offers: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    image_prefix: Option<String>,
}

fn collection_name(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let name = value.unwrap_or_else(|| default.to_string());
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "collection name must not be empty"));
    }
    if trimmed.contains('/') {
        return Err(LoadError::invalid(key, "collection name must not contain `/`"));
    }
    Ok(trimmed.to_string())
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }

    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;

    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
