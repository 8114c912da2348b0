use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use sqlx::sqlite::SqliteJournalMode;

use crate::data_types::DEFAULT_ID_FIELD;
use crate::naming;

pub const ENV_PREFIX: &str = "DOCSQL";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct DocsqlConfig {
    pub backend: Backend,
    #[serde(default)]
    pub collections: Collections,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backend {
    #[cfg(feature = "backend-postgres")]
    Postgres(Postgres),
    Sqlite(Sqlite),
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Postgres {
    pub dsn: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Sqlite {
    pub dsn: String,
    #[serde(default)]
    pub journal_mode: JournalMode,
}

fn default_max_connections() -> u32 {
    16
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
    Truncate,
    Memory,
}

impl From<JournalMode> for SqliteJournalMode {
    fn from(mode: JournalMode) -> Self {
        match mode {
            JournalMode::Wal => SqliteJournalMode::Wal,
            JournalMode::Delete => SqliteJournalMode::Delete,
            JournalMode::Truncate => SqliteJournalMode::Truncate,
            JournalMode::Memory => SqliteJournalMode::Memory,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct Collections {
    /// Dotted path of the field that identifies a document
    pub id_field: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }
}

pub fn validate_config(config: DocsqlConfig) -> Result<DocsqlConfig, ConfigError> {
    if let Err(e) = naming::field_path(&config.collections.id_field) {
        return Err(ConfigError::Message(format!(
            "Invalid collections.id_field: {e}"
        )));
    }

    #[cfg(feature = "backend-postgres")]
    let empty_pool = matches!(
        config.backend,
        Backend::Postgres(Postgres {
            max_connections: 0,
            ..
        })
    );
    #[cfg(not(feature = "backend-postgres"))]
    let empty_pool = false;

    if empty_pool {
        return Err(ConfigError::Message(
            "backend.max_connections must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

/// Load the config file at `path`, with `DOCSQL__SECTION__KEY` environment
/// variables taking precedence over its values
pub fn load_config(path: &Path) -> Result<DocsqlConfig, ConfigError> {
    let config = Config::builder().add_source(File::from(path)).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    config.build()?.try_deserialize().and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
) -> Result<DocsqlConfig, ConfigError> {
    let config =
        Config::builder().add_source(File::from_str(config_str, FileFormat::Toml));

    if skip_validation {
        config.build()?.try_deserialize()
    } else {
        config.build()?.try_deserialize().and_then(validate_config)
    }
}
