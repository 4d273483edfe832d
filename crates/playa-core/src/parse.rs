//! Filename parsing for scanned media files.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// `S01E02`, `s1.e2`, `Season 1 Episode 2`, bounded by separators.
static RE_SEASON_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\s.\-]+s(?:eason)?[\s.\-]*(?P<sn>\d+)[\s.\-]*e(?:pisode)?[\s.\-]*(?P<en>\d+)[\s.\-]+")
        .unwrap()
});

/// `1x02`, bounded by separators.
static RE_CROSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[\s.\-]+(?P<sn>\d+)x(?P<en>\d+)[\s.\-]+").unwrap());

/// Resolution tokens that end an episode title: `720p`, `(1080i)`, `1920x1080`.
static RE_RESOLUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[\s.\-]+\(?\d+(?:i|p|x\d+)(?:\)|\s|\.|-|$)").unwrap());

static RE_MOVIE_PAREN_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.*)\((?:19|20)\d\d").unwrap());

static RE_MOVIE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.*)(?:19|20)\d\d").unwrap());

/// Season/episode numbers and title recovered from an episode filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEpisode {
    pub season_num: Option<i64>,
    pub episode_num: Option<i64>,
    pub name: Option<String>,
}

/// Parse an episode filename such as `Show.S01E02.Pilot.720p.mkv`.
///
/// Without a recognizable season/episode marker the whole file stem becomes
/// the name. With one, the name is the text after the marker up to the
/// first resolution token.
pub fn parse_episode_filename(filename: &str) -> ParsedEpisode {
    let stem = file_stem(filename);
    // Pad so markers at either edge still see a separator.
    let haystack = format!(" {stem} ");

    let caps = RE_SEASON_EPISODE
        .captures(&haystack)
        .or_else(|| RE_CROSS.captures(&haystack));

    let Some(caps) = caps else {
        return ParsedEpisode {
            season_num: None,
            episode_num: None,
            name: non_empty(stem.replace('.', " ")),
        };
    };

    let season_num = caps.name("sn").and_then(|m| m.as_str().parse().ok());
    let episode_num = caps.name("en").and_then(|m| m.as_str().parse().ok());

    let marker_end = caps.get(0).map(|m| m.end()).unwrap_or(haystack.len());
    // Re-add the separator consumed by the marker so a resolution token
    // directly after it is still recognized.
    let rest = format!(" {}", &haystack[marker_end..]);
    let title = RE_RESOLUTION.split(&rest).next().unwrap_or_default();

    ParsedEpisode {
        season_num,
        episode_num,
        name: non_empty(title.replace('.', " ")),
    }
}

/// Derive a movie name from its filename: the text before the release
/// year, with dots and underscores turned into spaces.
pub fn parse_movie_name(filename: &str) -> String {
    let stem = file_stem(filename);

    let captured = RE_MOVIE_PAREN_YEAR
        .captures(stem)
        .or_else(|| RE_MOVIE_YEAR.captures(stem))
        .and_then(|caps| caps.name("name"))
        .map(|m| m.as_str().replace(['.', '_'], " ").trim().to_string())
        .filter(|name| !name.is_empty());

    captured.unwrap_or_else(|| stem.to_string())
}

fn file_stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    (!trimmed.is_empty()).then_some(trimmed)
}
