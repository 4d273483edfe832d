use std::sync::LazyLock;

use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;

use playa_core::duration::seconds_to_time_str;
use playa_core::models::PlaylistVideo;

/// Longest overview kept from a video description.
pub const OVERVIEW_MAX_CHARS: usize = 300;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(?P<hours>[\d.]+)H)?(?:(?P<minutes>[\d.]+)M)?(?:(?P<seconds>[\d.]+)S)?$")
        .unwrap()
});

// ── playlistItems ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemsResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i64>,
    pub published_at: Option<String>,
    pub resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    pub video_id: Option<String>,
}

/// A playlist entry that points at a video, with the id kept for the
/// duration lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SnippetVideo {
    pub video_id: String,
    pub video: PlaylistVideo,
}

impl Snippet {
    /// Convert to a playlist video. Entries that are not videos (deleted,
    /// channels, nested playlists) yield `None`.
    pub fn into_video(self, playlist_id: &str) -> Option<SnippetVideo> {
        let resource = self.resource_id?;
        if resource.kind != "youtube#video" {
            return None;
        }
        let video_id = resource.video_id.filter(|v| !v.is_empty())?;
        let released_on = self
            .published_at
            .as_deref()
            .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
            .map(|d| d.timestamp());
        let overview = self
            .description
            .map(|d| d.chars().take(OVERVIEW_MAX_CHARS).collect::<String>())
            .filter(|d| !d.is_empty());

        Some(SnippetVideo {
            video: PlaylistVideo {
                name: self.title,
                overview,
                order_num: self.position,
                url: watch_url(&video_id, playlist_id),
                released_on,
                duration: None,
            },
            video_id,
        })
    }
}

pub fn watch_url(video_id: &str, playlist_id: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("v", video_id)
        .append_pair("list", playlist_id)
        .finish();
    format!("https://www.youtube.com/watch?{query}")
}

// ── videos ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VideosResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: Option<String>,
    pub content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ContentDetails {
    pub duration: Option<String>,
}

/// Parse an ISO-8601 `PT#H#M#S` duration into a display string.
pub fn iso_duration_to_time_str(iso: &str) -> Option<String> {
    let caps = ISO_DURATION.captures(iso)?;
    let part = |name: &str| {
        caps.name(name)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let total = part("hours") * 3600.0 + part("minutes") * 60.0 + part("seconds");
    Some(seconds_to_time_str(total.floor() as u64))
}
