use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;

use playa_core::models::PlaylistVideo;

use super::error::YoutubeError;
use super::types::{iso_duration_to_time_str, PlaylistItemsResponse, SnippetVideo, VideosResponse};
use crate::traits::PlaylistSource;

const BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Most ids the `videos` endpoint accepts per request.
const VIDEO_BATCH_SIZE: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// YouTube Data API v3 client (API-key auth, read only).
pub struct YoutubeClient {
    api_key: String,
    http: Client,
}

impl YoutubeClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, YoutubeError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "YouTube API error");
            Err(YoutubeError::Api {
                status,
                message: body,
            })
        }
    }

    /// Every video entry of a playlist, following `nextPageToken`.
    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<SnippetVideo>, YoutubeError> {
        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("part", "snippet"),
                ("maxResults", "50"),
                ("playlistId", playlist_id),
                ("key", self.api_key.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let resp = self
                .http
                .get(format!("{BASE_URL}/playlistItems"))
                .query(&query)
                .send()
                .await?;
            let resp = Self::check_response(resp).await?;
            let page: PlaylistItemsResponse = resp
                .json()
                .await
                .map_err(|e| YoutubeError::Parse(e.to_string()))?;

            videos.extend(
                page.items
                    .into_iter()
                    .filter_map(|i| i.snippet)
                    .filter_map(|s| s.into_video(playlist_id)),
            );

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(videos)
    }

    /// Durations keyed by video id, fetched in batches.
    async fn durations(&self, video_ids: &[&str]) -> Result<HashMap<String, String>, YoutubeError> {
        let mut durations = HashMap::new();
        for batch in video_ids.chunks(VIDEO_BATCH_SIZE) {
            let ids = batch.join(",");
            let resp = self
                .http
                .get(format!("{BASE_URL}/videos"))
                .query(&[
                    ("part", "contentDetails"),
                    ("id", ids.as_str()),
                    ("key", self.api_key.as_str()),
                ])
                .send()
                .await?;
            let resp = Self::check_response(resp).await?;
            let list: VideosResponse = resp
                .json()
                .await
                .map_err(|e| YoutubeError::Parse(e.to_string()))?;

            for item in list.items {
                let (Some(id), Some(iso)) = (
                    item.id,
                    item.content_details.and_then(|c| c.duration),
                ) else {
                    continue;
                };
                if let Some(duration) = iso_duration_to_time_str(&iso) {
                    durations.insert(id, duration);
                }
            }
        }
        Ok(durations)
    }
}

impl PlaylistSource for YoutubeClient {
    type Error = YoutubeError;

    async fn playlist_videos(&self, playlist_id: &str) -> Result<Vec<PlaylistVideo>, YoutubeError> {
        let entries = self.playlist_items(playlist_id).await?;
        let ids: Vec<&str> = entries.iter().map(|e| e.video_id.as_str()).collect();
        let mut durations = self.durations(&ids).await?;

        let videos: Vec<PlaylistVideo> = entries
            .into_iter()
            .map(|e| PlaylistVideo {
                duration: durations.remove(&e.video_id),
                ..e.video
            })
            .collect();

        tracing::debug!(playlist_id, count = videos.len(), "Fetched playlist videos");
        Ok(videos)
    }
}

/// Extract the playlist id from a playlist or watch url (`list=` query
/// parameter). A bare id is returned as is.
pub fn playlist_id_from_url(input: &str) -> Result<String, YoutubeError> {
    let input = input.trim();
    match url::Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(k, _)| k == "list")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| YoutubeError::InvalidPlaylist(input.to_string())),
        Err(_) if !input.is_empty() && !input.contains(['/', '?', '&', ' ']) => {
            Ok(input.to_string())
        }
        Err(_) => Err(YoutubeError::InvalidPlaylist(input.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_id_from_url() {
        assert_eq!(
            playlist_id_from_url("https://www.youtube.com/playlist?list=PLabc").unwrap(),
            "PLabc"
        );
        assert_eq!(
            playlist_id_from_url("https://www.youtube.com/watch?v=x&list=PLdef&index=2").unwrap(),
            "PLdef"
        );
        assert_eq!(playlist_id_from_url(" PLbare ").unwrap(), "PLbare");
        assert!(matches!(
            playlist_id_from_url("https://www.youtube.com/watch?v=x"),
            Err(YoutubeError::InvalidPlaylist(_))
        ));
        assert!(playlist_id_from_url("").is_err());
    }
}
