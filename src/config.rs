use crate::sentinel::{DEFAULT_MARGIN, DEFAULT_SETTLE};
use crate::tmdb::{DEFAULT_LANGUAGE, REQUEST_TIMEOUT};
use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_token: String,
    pub language: String,
    pub data_dir: PathBuf,
    pub request_timeout: Option<Duration>,
    pub scroll_margin: f64,
    pub settle_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let tmdb_token = lookup("TMDB_TOKEN")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("TMDB_TOKEN must be set"))?;
        let language = lookup("TMDB_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
        let data_dir = lookup("MOVIELIST_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        // 0 turns the controller-side timeout off; the HTTP client keeps its own bound.
        let request_timeout = match parse::<u64>(&lookup, "MOVIELIST_REQUEST_TIMEOUT_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(REQUEST_TIMEOUT),
        };
        let scroll_margin = parse::<f64>(&lookup, "MOVIELIST_SCROLL_MARGIN")?.unwrap_or(DEFAULT_MARGIN);
        let settle_delay = parse::<u64>(&lookup, "MOVIELIST_SETTLE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SETTLE);

        Ok(Self {
            tmdb_token,
            language,
            data_dir,
            request_timeout,
            scroll_margin,
            settle_delay,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {key}: '{raw}'"))
        })
        .transpose()
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "movielist", "movielist")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".movielist"))
}
