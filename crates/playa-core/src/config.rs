use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::PlayaError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Seconds in a day, used to turn `refresh_interval_days` into a window.
const DAY_SECS: i64 = 86_400;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directory whose immediate subdirectories are shows.
    pub tv_dir: String,
    /// Directory walked recursively for movie files.
    pub movie_dir: String,
    pub show_finished_items: bool,
    /// Un-archive a local item when a scan finds new episodes for it.
    pub unarchive_on_new_episodes: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub tvdb: TvdbConfig,
    pub youtube: YoutubeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TvdbConfig {
    pub api_key: String,
    pub pin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub api_key: String,
    pub refresh_interval_days: u32,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            tv_dir: String::new(),
            movie_dir: String::new(),
            show_finished_items: false,
            unarchive_on_new_episodes: true,
        }
    }
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            refresh_interval_days: 7,
        }
    }
}

impl LibraryConfig {
    pub fn tv_dir(&self) -> Option<&str> {
        non_empty(&self.tv_dir)
    }

    pub fn movie_dir(&self) -> Option<&str> {
        non_empty(&self.movie_dir)
    }
}

impl TvdbConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl YoutubeConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Minimum age, in seconds, before a playlist is refreshed again.
    pub fn refresh_interval_secs(&self) -> i64 {
        i64::from(self.refresh_interval_days) * DAY_SECS
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

impl AppConfig {
    /// Load config: user file if it exists, built-in defaults otherwise.
    pub fn load() -> Result<Self, PlayaError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            let user_str = std::fs::read_to_string(&user_path)?;
            toml::from_str(&user_str).map_err(|e| PlayaError::Config(e.to_string()))
        } else {
            toml::from_str(DEFAULT_CONFIG).map_err(|e| PlayaError::Config(e.to_string()))
        }
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), PlayaError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PlayaError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the database file.
    pub fn db_path() -> PathBuf {
        Self::data_dir().join("playa.db")
    }

    /// Directory for the database and log files.
    pub fn data_dir() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure the data directory exists and return the DB path.
    pub fn ensure_db_path() -> Result<PathBuf, PlayaError> {
        let path = Self::db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "playa")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert!(config.library.tv_dir().is_none());
        assert!(!config.library.show_finished_items);
        assert!(config.library.unarchive_on_new_episodes);
        assert!(!config.services.tvdb.is_configured());
        assert_eq!(config.services.youtube.refresh_interval_days, 7);
        assert_eq!(config.services.youtube.refresh_interval_secs(), 604_800);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = AppConfig::default();
        config.library.tv_dir = "/media/tv".into();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.library.tv_dir(), Some("/media/tv"));
    }

    #[test]
    fn test_missing_keys_fall_back_to_defaults() {
        let older = r#"
            [library]
            tv_dir = "/media/tv"
            movie_dir = ""
            show_finished_items = true

            [services.tvdb]
            api_key = "key"
            pin = ""
        "#;
        let config: AppConfig = toml::from_str(older).unwrap();
        assert_eq!(config.library.tv_dir(), Some("/media/tv"));
        assert!(config.library.show_finished_items);
        assert!(config.library.unarchive_on_new_episodes);
        assert!(config.services.tvdb.is_configured());
        assert!(!config.services.youtube.is_configured());
        assert_eq!(config.services.youtube.refresh_interval_days, 7);

        let empty: AppConfig = toml::from_str("").unwrap();
        assert!(empty.library.movie_dir().is_none());
        assert_eq!(empty.services.youtube.refresh_interval_secs(), 604_800);
    }
}
