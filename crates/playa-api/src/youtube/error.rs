use thiserror::Error;

/// Errors from the YouTube Data API client.
#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("not a playlist: {0}")]
    InvalidPlaylist(String),
}
