use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayaError {
    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("ambiguous match in {scope}: more than one entry has key {key}")]
    MatchAmbiguous { scope: String, key: String },

    #[error("invalid source response: {0}")]
    InvalidSourceResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
