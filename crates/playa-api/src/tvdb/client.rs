use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;

use playa_core::models::{unix_now, ItemType, RemoteEpisode, SeriesMatch};

use super::error::TvdbError;
use super::types::{
    runtime_to_duration, EpisodesPage, LoginData, LoginRequest, SearchHit, TvdbMovie,
    TvdbResponse,
};
use crate::traits::{EpisodeSource, SeriesLookup};

const BASE_URL: &str = "https://api4.thetvdb.com";

/// Tokens are valid for a month; refresh daily with a little slack.
const TOKEN_LIFETIME_SECS: i64 = 86_400 - 30;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SEARCH_LIMIT: &str = "10";

struct CachedToken {
    token: String,
    created_at: i64,
}

/// TheTVDB API v4 client.
pub struct TvdbClient {
    api_key: String,
    pin: Option<String>,
    http: Client,
    token: Mutex<Option<CachedToken>>,
}

impl TvdbClient {
    pub fn new(api_key: String, pin: Option<String>) -> Self {
        Self {
            api_key,
            pin: pin.filter(|p| !p.is_empty()),
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            token: Mutex::new(None),
        }
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, TvdbError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "TVDB API error");
            Err(TvdbError::Api {
                status,
                message: body,
            })
        }
    }

    /// Log in with the API key (and subscriber PIN) and return a bearer token.
    pub async fn login(&self) -> Result<String, TvdbError> {
        if self.api_key.is_empty() {
            return Err(TvdbError::Auth("no TVDB API key configured".into()));
        }
        let resp = self
            .http
            .post(format!("{BASE_URL}/v4/login"))
            .json(&LoginRequest {
                apikey: &self.api_key,
                pin: self.pin.as_deref(),
            })
            .send()
            .await?;

        let resp = Self::check_response(resp).await.map_err(|e| match e {
            TvdbError::Api { status: 401, .. } => TvdbError::Auth("login rejected".into()),
            other => other,
        })?;
        let body: TvdbResponse<LoginData> = resp
            .json()
            .await
            .map_err(|e| TvdbError::Parse(e.to_string()))?;

        body.data
            .map(|d| d.token)
            .ok_or_else(|| TvdbError::Auth("login response carried no token".into()))
    }

    /// A cached token, or a fresh one when the cache is empty or stale.
    async fn token(&self) -> Result<String, TvdbError> {
        let mut cached = self.token.lock().await;
        let now = unix_now();
        if let Some(t) = cached.as_ref() {
            if now - t.created_at < TOKEN_LIFETIME_SECS {
                return Ok(t.token.clone());
            }
        }
        tracing::debug!("Fetching new TVDB token");
        let token = self.login().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            created_at: now,
        });
        Ok(token)
    }

    /// Search series (or movies, for a movie item) by name.
    pub async fn search_series(
        &self,
        query: &str,
        item_type: ItemType,
    ) -> Result<Vec<SeriesMatch>, TvdbError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let kind = match item_type {
            ItemType::Show => "series",
            ItemType::Movie => "movie",
        };
        let token = self.token().await?;
        let resp = self
            .http
            .get(format!("{BASE_URL}/v4/search"))
            .bearer_auth(&token)
            .query(&[("q", query), ("type", kind), ("limit", SEARCH_LIMIT)])
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        let body: TvdbResponse<Vec<SearchHit>> = resp
            .json()
            .await
            .map_err(|e| TvdbError::Parse(e.to_string()))?;

        let matches: Vec<SeriesMatch> = body
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(SearchHit::into_series_match)
            .collect();
        tracing::debug!(query, kind, count = matches.len(), "TVDB search");
        Ok(matches)
    }

    /// A movie's runtime, formatted like other durations.
    pub async fn movie_runtime(&self, movie_id: i64) -> Result<Option<String>, TvdbError> {
        let token = self.token().await?;
        let resp = self
            .http
            .get(format!("{BASE_URL}/v4/movies/{movie_id}"))
            .bearer_auth(&token)
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;
        let body: TvdbResponse<TvdbMovie> = resp
            .json()
            .await
            .map_err(|e| TvdbError::Parse(e.to_string()))?;

        Ok(body
            .data
            .and_then(|m| m.runtime)
            .and_then(runtime_to_duration))
    }
}

impl SeriesLookup for TvdbClient {
    type Error = TvdbError;

    async fn search(
        &self,
        query: &str,
        item_type: ItemType,
    ) -> Result<Vec<SeriesMatch>, TvdbError> {
        self.search_series(query, item_type).await
    }

    async fn movie_runtime(&self, movie_id: i64) -> Result<Option<String>, TvdbError> {
        TvdbClient::movie_runtime(self, movie_id).await
    }
}

impl EpisodeSource for TvdbClient {
    type Error = TvdbError;

    async fn series_episodes(
        &self,
        series_id: i64,
        include_unaired: bool,
    ) -> Result<Vec<RemoteEpisode>, TvdbError> {
        let token = self.token().await?;
        let mut url = format!("{BASE_URL}/v4/series/{series_id}/episodes/default/eng");
        let mut episodes = Vec::new();

        loop {
            let resp = self.http.get(&url).bearer_auth(&token).send().await?;
            let resp = Self::check_response(resp).await?;
            let page: TvdbResponse<EpisodesPage> = resp
                .json()
                .await
                .map_err(|e| TvdbError::Parse(e.to_string()))?;

            let data = page
                .data
                .ok_or_else(|| TvdbError::Parse("response carried no episode data".into()))?;
            episodes.extend(
                data.episodes
                    .into_iter()
                    .filter(|e| include_unaired || e.has_aired())
                    .map(|e| e.into_remote_episode()),
            );

            match page.links.and_then(|l| l.next) {
                Some(next) if !next.is_empty() => url = next,
                _ => break,
            }
        }

        tracing::debug!(series_id, count = episodes.len(), "Fetched TVDB episodes");
        Ok(episodes)
    }
}
