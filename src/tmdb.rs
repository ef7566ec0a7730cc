use crate::error::FetchError;
use crate::models::{MovieDetail, MoviePage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::debug;

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_LANGUAGE: &str = "ko-KR";
/// Upper bound for a whole TMDB request, body included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog and detail lookups consumed by the controller and the overlay.
#[async_trait]
pub trait MovieSource: Send + Sync {
    async fn fetch_popular_page(&self, page: u32) -> Result<MoviePage, FetchError>;
    async fn fetch_search_page(&self, page: u32, keyword: &str) -> Result<MoviePage, FetchError>;
    async fn fetch_movie_detail(&self, movie_id: i32) -> Result<MovieDetail, FetchError>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    token: String,
    language: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(token: impl Into<String>, language: impl Into<String>) -> Result<Self> {
        let user_agent = format!("movielist/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            token: token.into(),
            language: language.into(),
            base_url: TMDB_BASE.to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        let token = env::var("TMDB_TOKEN").context("TMDB_TOKEN not set")?;
        let language = env::var("TMDB_LANGUAGE").unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string());
        Self::new(token, language)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn popular_url(&self, page: u32) -> String {
        format!(
            "{}/movie/popular?language={}&page={page}",
            self.base_url, self.language
        )
    }

    fn search_url(&self, page: u32, keyword: &str) -> String {
        format!(
            "{}/search/movie?query={}&include_adult=false&language={}&page={page}",
            self.base_url,
            urlencoding::encode(keyword),
            self.language
        )
    }

    fn detail_url(&self, movie_id: i32) -> String {
        format!(
            "{}/movie/{movie_id}?language={}",
            self.base_url, self.language
        )
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, FetchError> {
        let res = self
            .client
            .get(url)
            .header("accept", "application/json")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        if !status.is_success() {
            debug!(status = status.as_u16(), body = %text, "TMDB request rejected");
            return Err(FetchError::status(status.as_u16()));
        }
        serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl MovieSource for TmdbClient {
    async fn fetch_popular_page(&self, page: u32) -> Result<MoviePage, FetchError> {
        self.get_json(&self.popular_url(page)).await
    }

    async fn fetch_search_page(&self, page: u32, keyword: &str) -> Result<MoviePage, FetchError> {
        self.get_json(&self.search_url(page, keyword)).await
    }

    async fn fetch_movie_detail(&self, movie_id: i32) -> Result<MovieDetail, FetchError> {
        self.get_json(&self.detail_url(movie_id)).await
    }
}
