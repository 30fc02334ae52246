//! Process-wide query limits, loaded once at startup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix for overrides (`GKB_QUERY_MAX_LIMIT`, ...).
pub const ENV_PREFIX: &str = "GKB_QUERY_";

/// Immutable limits consumed by the compiler and the execution layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Largest accepted `limit`.
    pub max_limit: u64,
    /// Largest accepted `neighbors` projection depth.
    pub max_neighbors: u32,
    /// Depth bound for descendant/ancestor walks and the cap for explicit depths.
    pub max_depth: u32,
    /// Default depth of neighborhood traversals.
    pub related_node_depth: u32,
    /// Minimum word length for full-text (`~`) terms.
    pub min_word_size: usize,
    /// Default tracing filter used by [`crate::logging::init_logging`].
    pub log_level: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_limit: 1000,
            max_neighbors: 4,
            max_depth: 50,
            related_node_depth: 3,
            min_word_size: 4,
            log_level: "info".to_owned(),
        }
    }
}

impl QueryConfig {
    /// Loads the `[query]` table of a TOML file, applies `GKB_QUERY_*`
    /// overrides from the process environment, and validates the result.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let base = match explicit {
            Some(path) => read_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => QueryConfig::default(),
            },
        };
        base.with_overrides(std::env::vars())
    }

    /// Parses the `[query]` table from TOML text and validates it.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })?;
        raw.query.validate()
    }

    /// Applies `GKB_QUERY_*` overrides from `vars` and validates the result.
    pub fn with_overrides<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "MAX_LIMIT" => self.max_limit = parse_env(&key, &value)?,
                "MAX_NEIGHBORS" => self.max_neighbors = parse_env(&key, &value)?,
                "MAX_DEPTH" => self.max_depth = parse_env(&key, &value)?,
                "RELATED_NODE_DEPTH" => self.related_node_depth = parse_env(&key, &value)?,
                "MIN_WORD_SIZE" => self.min_word_size = parse_env(&key, &value)?,
                "LOG_LEVEL" => self.log_level = value,
                _ => {}
            }
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_limit == 0 {
            return Err(ConfigError::Invalid("max_limit must be at least 1".into()));
        }
        if self.min_word_size == 0 {
            return Err(ConfigError::Invalid(
                "min_word_size must be at least 1".into(),
            ));
        }
        if self.related_node_depth == 0 {
            return Err(ConfigError::Invalid(
                "related_node_depth must be at least 1".into(),
            ));
        }
        if self.related_node_depth > self.max_depth {
            return Err(ConfigError::Invalid(format!(
                "related_node_depth ({}) exceeds max_depth ({})",
                self.related_node_depth, self.max_depth
            )));
        }
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_owned(),
        value: value.to_owned(),
    })
}

fn read_file(path: &Path) -> Result<QueryConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: Some(path.to_path_buf()),
        source,
    })?;
    Ok(raw.query)
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    query: QueryConfig,
}

/// Errors raised while loading [`QueryConfig`].
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read query config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse query config{}: {source}", display_path(.path))]
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },
    #[error("environment override {key}={value} is not a valid number")]
    InvalidEnv { key: String, value: String },
    #[error("invalid query config: {0}")]
    Invalid(String),
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

/// Default location of the config file (`<config dir>/graphkb/query.toml`).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("graphkb").join("query.toml"))
}
