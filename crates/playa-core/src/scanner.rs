//! Library directory scanner.
//!
//! Walks the configured TV and movie directories and produces raw scan
//! results for the reconciler. A show is an immediate subdirectory of the
//! TV directory holding at least one video file at any depth.

use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::PlayaError;
use crate::models::{EpisodeFile, MovieFile, ScanResults};

/// Video file extensions to consider.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "webm", "flv", "mpg", "mpeg", "ogm", "ts",
];

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Scan the TV directory.
///
/// A missing directory is an error rather than an empty scan, so an
/// unmounted drive never prunes the library.
pub fn scan_tv_dir(tv_dir: &Path) -> Result<ScanResults, PlayaError> {
    ensure_dir(tv_dir)?;
    info!(path = %tv_dir.display(), "Scanning TV directory");

    let mut show_dirs: Vec<_> = std::fs::read_dir(tv_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .collect();
    show_dirs.sort_by_key(|e| e.file_name());

    let mut results = ScanResults::default();
    for dir in show_dirs {
        let Some(dir_name) = dir.file_name().to_str().map(String::from) else {
            warn!(path = %dir.path().display(), "Skipping directory with non-UTF-8 name");
            continue;
        };
        let files = video_files(&dir.path());
        if files.is_empty() {
            debug!(show = %dir_name, "No video files, skipping");
            continue;
        }
        results
            .episode_files
            .extend(files.into_iter().map(|(pathname, filename)| EpisodeFile {
                show_dir_name: dir_name.clone(),
                pathname,
                filename,
                duration: None,
            }));
        results.show_dir_names.push(dir_name);
    }

    info!(
        shows = results.show_dir_names.len(),
        files = results.episode_files.len(),
        "TV scan finished"
    );
    Ok(results)
}

/// Scan the movie directory: every video file at any depth is a movie.
pub fn scan_movie_dir(movie_dir: &Path) -> Result<Vec<MovieFile>, PlayaError> {
    ensure_dir(movie_dir)?;
    info!(path = %movie_dir.display(), "Scanning movie directory");

    let movies: Vec<MovieFile> = video_files(movie_dir)
        .into_iter()
        .map(|(pathname, filename)| MovieFile {
            pathname,
            filename,
            duration: None,
        })
        .collect();

    info!(movies = movies.len(), "Movie scan finished");
    Ok(movies)
}

fn ensure_dir(path: &Path) -> Result<(), PlayaError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(PlayaError::NotFound(format!(
            "library directory {}",
            path.display()
        )))
    }
}

/// `(pathname, filename)` of every video file under `root`, sorted by path.
fn video_files(root: &Path) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video(e.path()))
        .filter_map(|e| {
            let filename = e.file_name().to_str()?.to_string();
            let pathname = e.path().to_str()?.to_string();
            Some((pathname, filename))
        })
        .collect();
    files.sort();
    files
}
