/// Runtime configuration
///
/// Defaults, overridden by `REPEATER_*` environment variables, overridden in
/// turn by command-line flags in `main`.
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::rank::DEFAULT_TOP_N;

/// Name of the counter document inside the data directory.
pub const DATA_FILE_NAME: &str = "repeater_data.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Holds the counter file, logs and rendered charts
    pub data_dir: PathBuf,
    /// Entries per leaderboard
    pub top_n: usize,
    /// Display names cached per group (0 disables the cache)
    pub name_cache_capacity: usize,
    /// Distinct words kept per bucket; unlimited when None
    pub max_words_per_bucket: Option<usize>,
    /// Render chart images alongside text replies
    pub charts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".repeater"),
            top_n: DEFAULT_TOP_N,
            name_cache_capacity: 256,
            max_words_per_bucket: None,
            charts: true,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = env::var_os("REPEATER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(n) = parse_env::<usize>("REPEATER_TOP_N")? {
            config.top_n = n;
        }
        if let Some(n) = parse_env::<usize>("REPEATER_NAME_CACHE")? {
            config.name_cache_capacity = n;
        }
        if let Some(n) = parse_env::<usize>("REPEATER_MAX_WORDS")? {
            config.max_words_per_bucket = (n > 0).then_some(n);
        }

        Ok(config)
    }

    pub fn data_file(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE_NAME)
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.data_dir.join("charts")
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: '{}'", name, value)),
        _ => Ok(None),
    }
}
