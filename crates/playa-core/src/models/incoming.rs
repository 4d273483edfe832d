//! Raw records handed to the reconciler by scanners and API clients.

use serde::{Deserialize, Serialize};

use crate::error::PlayaError;

/// Output of a TV directory scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResults {
    #[serde(default)]
    pub show_dir_names: Vec<String>,
    #[serde(default)]
    pub episode_files: Vec<EpisodeFile>,
}

impl ScanResults {
    /// Decode a scan payload produced by an external scanner.
    pub fn from_json(json: &str) -> Result<Self, PlayaError> {
        serde_json::from_str(json).map_err(|e| PlayaError::InvalidSourceResponse(e.to_string()))
    }
}

/// A video file found inside a show directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeFile {
    pub show_dir_name: String,
    pub pathname: String,
    pub filename: String,
    #[serde(default)]
    pub duration: Option<String>,
}

/// A video file found under the movie directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieFile {
    pub pathname: String,
    pub filename: String,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Decode a movie scan payload produced by an external scanner.
pub fn movie_files_from_json(json: &str) -> Result<Vec<MovieFile>, PlayaError> {
    serde_json::from_str(json).map_err(|e| PlayaError::InvalidSourceResponse(e.to_string()))
}

/// A normalized episode from a metadata service (TVDB).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEpisode {
    pub season_num: Option<i64>,
    pub episode_num: Option<i64>,
    pub name: Option<String>,
    pub overview: Option<String>,
    /// Unix seconds.
    pub released_on: Option<i64>,
    pub duration: Option<String>,
    #[serde(default)]
    pub is_season_finale: bool,
    #[serde(default)]
    pub is_series_finale: bool,
}

/// A normalized video from a playlist listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistVideo {
    pub name: Option<String>,
    pub overview: Option<String>,
    pub order_num: Option<i64>,
    pub url: String,
    /// Unix seconds.
    pub released_on: Option<i64>,
    pub duration: Option<String>,
}

/// A series or movie found by name on a metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMatch {
    pub tvdb_id: i64,
    pub slug: Option<String>,
    pub name: String,
    pub year: Option<String>,
    pub overview: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_results_from_json() {
        let json = r#"{
            "show_dir_names": ["Foo"],
            "episode_files": [
                {"show_dir_name": "Foo", "pathname": "/tv/Foo/a.mkv", "filename": "a.mkv"}
            ]
        }"#;
        let scan = ScanResults::from_json(json).unwrap();
        assert_eq!(scan.show_dir_names, vec!["Foo".to_string()]);
        assert_eq!(scan.episode_files[0].duration, None);
    }

    #[test]
    fn test_malformed_scan_is_invalid_source_response() {
        let err = ScanResults::from_json("{\"episode_files\": 3}").unwrap_err();
        assert!(matches!(err, PlayaError::InvalidSourceResponse(_)));
    }

    #[test]
    fn test_movie_files_from_json() {
        let movies =
            movie_files_from_json(r#"[{"pathname": "/m/x.mkv", "filename": "x.mkv"}]"#).unwrap();
        assert_eq!(movies.len(), 1);
        assert!(movie_files_from_json("not json").is_err());
    }
}
