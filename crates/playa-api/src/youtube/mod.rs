pub mod client;
pub mod error;
pub mod types;

pub use client::{playlist_id_from_url, YoutubeClient};
pub use error::YoutubeError;
