use failure::Fail;
use log::LevelFilter;
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

use crate::{
    db::DatabaseConfig,
    models::{BasicContentType, ContentTypes},
    store::Store,
};

/// Names of the fields the publisher keeps for itself. These can't be named
/// in `empty-on-publish`.
const RESERVED_FIELDS: &[&str] = &[
    "id",
    "content_type",
    "is_draft",
    "linked",
    "modified_at",
    "published_at",
];

/// Load configuration from a TOML file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, failure::Error> {
    let data = fs::read_to_string(path).map_err(ReadConfigurationError)?;
    let config: Config = toml::from_str(&data).map_err(ConfigurationError)?;
    config.validate()?;
    Ok(config)
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub draft_mode: DraftMode,
    #[serde(default)]
    pub content_types: HashMap<String, ContentTypeConfig>,
}

impl Config {
    /// Validate configuration correctness.
    pub fn validate(&self) -> Result<(), InvalidContentTypeError> {
        for (name, config) in &self.content_types {
            if name.trim().is_empty() {
                return Err(InvalidContentTypeError::EmptyName);
            }

            if let Some(field) = config.empty_on_publish.iter()
                .find(|field| RESERVED_FIELDS.contains(&field.as_str()))
            {
                return Err(InvalidContentTypeError::ReservedField(
                    name.clone(), field.clone()));
            }
        }

        Ok(())
    }

    /// Build a registry with a [`BasicContentType`] for each configured
    /// content type.
    pub fn content_types<S: Store>(&self) -> ContentTypes<S> {
        let mut types = ContentTypes::new();

        for (name, config) in &self.content_types {
            types.register(BasicContentType::new(
                name.clone(), config.empty_on_publish.clone()));
        }

        types
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Logging {
    /// Default logging level.
    #[serde(default = "default_level_filter")]
    pub level: LevelFilter,
    /// Custom filters.
    #[serde(default)]
    pub filters: HashMap<String, LevelFilter>,
}

/// How draft mode is requested by a viewer.
#[derive(Clone, Debug, Deserialize)]
pub struct DraftMode {
    /// Query parameter which, when present in a request made by staff,
    /// switches queries to draft records.
    #[serde(default = "default_draft_parameter")]
    pub parameter: String,
}

/// Configuration of a single content type.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContentTypeConfig {
    /// Fields which are not carried over to published copies.
    #[serde(default)]
    pub empty_on_publish: Vec<String>,
}

/// Configure `env_logger` according to `config`. `RUST_LOG` is used as the
/// base, with configured levels applied on top.
pub fn setup_logging(config: &Logging) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(config.level);

    for (module, level) in &config.filters {
        builder.filter_module(module, *level);
    }

    builder.try_init()
}

#[derive(Debug, Fail)]
#[fail(display = "Cannot read configuration file")]
pub struct ReadConfigurationError(#[fail(cause)] std::io::Error);

#[derive(Debug, Fail)]
#[fail(display = "Invalid configuration: {}", _0)]
pub struct ConfigurationError(#[fail(cause)] toml::de::Error);

#[derive(Debug, Fail)]
pub enum InvalidContentTypeError {
    #[fail(display = "Content type names can't be empty")]
    EmptyName,
    #[fail(display = "Content type {} can't empty reserved field {}", _0, _1)]
    ReservedField(String, String),
}

fn default_level_filter() -> LevelFilter {
    LevelFilter::Info
}

fn default_draft_parameter() -> String {
    "edit".to_string()
}

impl Default for Logging {
    fn default() -> Self {
        Logging {
            level: default_level_filter(),
            filters: HashMap::new(),
        }
    }
}

impl Default for DraftMode {
    fn default() -> Self {
        DraftMode {
            parameter: default_draft_parameter(),
        }
    }
}
