use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use playa_core::duration::seconds_to_time_str;
use playa_core::models::{RemoteEpisode, SeriesMatch};

// ── Envelope ────────────────────────────────────────────────────

/// Every v4 response wraps its payload in `{ status, data, links }`.
#[derive(Debug, Deserialize)]
pub struct TvdbResponse<T> {
    #[serde(default)]
    pub status: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub links: Option<TvdbLinks>,
}

#[derive(Debug, Deserialize)]
pub struct TvdbLinks {
    pub next: Option<String>,
}

// ── Login ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub apikey: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub token: String,
}

// ── Episodes ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EpisodesPage {
    #[serde(default)]
    pub episodes: Vec<TvdbEpisode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TvdbEpisode {
    pub name: Option<String>,
    pub overview: Option<String>,
    /// Minutes.
    pub runtime: Option<u64>,
    pub season_number: Option<i64>,
    pub number: Option<i64>,
    pub aired: Option<String>,
    pub finale_type: Option<String>,
}

impl TvdbEpisode {
    pub fn has_aired(&self) -> bool {
        self.aired.as_deref().is_some_and(|a| !a.is_empty())
    }

    pub fn into_remote_episode(self) -> RemoteEpisode {
        let released_on = self.aired.as_deref().and_then(aired_to_unix);
        let finale = self.finale_type.as_deref();
        RemoteEpisode {
            season_num: self.season_number,
            episode_num: self.number,
            name: self.name.filter(|n| !n.is_empty()),
            overview: self.overview.filter(|o| !o.is_empty()),
            released_on,
            duration: self.runtime.and_then(runtime_to_duration),
            is_season_finale: finale == Some("season"),
            is_series_finale: finale == Some("series"),
        }
    }
}

// ── Search ──────────────────────────────────────────────────────

/// One record of `/v4/search`. Ids come back as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub tvdb_id: Option<String>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub year: Option<String>,
    pub overview: Option<String>,
}

impl SearchHit {
    /// `None` when the id is missing or not numeric.
    pub fn into_series_match(self) -> Option<SeriesMatch> {
        let tvdb_id = self.tvdb_id?.trim().parse().ok()?;
        Some(SeriesMatch {
            tvdb_id,
            slug: self.slug.filter(|s| !s.is_empty()),
            name: self.name.unwrap_or_default(),
            year: self.year.filter(|y| !y.is_empty()),
            overview: self.overview.filter(|o| !o.is_empty()),
        })
    }
}

// ── Movies ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TvdbMovie {
    /// Minutes.
    pub runtime: Option<u64>,
}

/// Runtime minutes as a duration string; zero means unknown.
pub fn runtime_to_duration(minutes: u64) -> Option<String> {
    (minutes > 0).then(|| seconds_to_time_str(minutes * 60))
}

/// `YYYY-MM-DD` to unix seconds at UTC midnight.
pub fn aired_to_unix(aired: &str) -> Option<i64> {
    if aired.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(aired, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(json: &str) -> TvdbEpisode {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_aired_to_unix() {
        assert_eq!(aired_to_unix("1970-01-02"), Some(86_400));
        assert_eq!(aired_to_unix("2021-03-04"), Some(1_614_816_000));
        assert_eq!(aired_to_unix("2021-3-4"), None);
        assert_eq!(aired_to_unix("soon"), None);
        assert_eq!(aired_to_unix(""), None);
    }

    #[test]
    fn test_into_remote_episode() {
        let ep = sample(
            r#"{
                "id": 7, "name": "Pilot", "overview": "It begins.",
                "runtime": 45, "seasonNumber": 1, "number": 1,
                "aired": "1970-01-02", "finaleType": null
            }"#,
        )
        .into_remote_episode();
        assert_eq!(ep.season_num, Some(1));
        assert_eq!(ep.episode_num, Some(1));
        assert_eq!(ep.name.as_deref(), Some("Pilot"));
        assert_eq!(ep.released_on, Some(86_400));
        assert_eq!(ep.duration.as_deref(), Some("45:00"));
        assert!(!ep.is_season_finale);
        assert!(!ep.is_series_finale);
    }

    #[test]
    fn test_finale_flags() {
        let season = sample(r#"{"finaleType": "season"}"#).into_remote_episode();
        assert!(season.is_season_finale && !season.is_series_finale);
        let series = sample(r#"{"finaleType": "series"}"#).into_remote_episode();
        assert!(series.is_series_finale && !series.is_season_finale);
        let mid = sample(r#"{"finaleType": "midseason"}"#).into_remote_episode();
        assert!(!mid.is_season_finale && !mid.is_series_finale);
    }

    #[test]
    fn test_long_runtime_has_hours() {
        let ep = sample(r#"{"runtime": 95}"#).into_remote_episode();
        assert_eq!(ep.duration.as_deref(), Some("1:35:00"));
        let none = sample(r#"{"runtime": 0}"#).into_remote_episode();
        assert_eq!(none.duration, None);
    }

    #[test]
    fn test_has_aired() {
        assert!(sample(r#"{"aired": "2020-01-01"}"#).has_aired());
        assert!(!sample(r#"{"aired": ""}"#).has_aired());
        assert!(!sample(r#"{}"#).has_aired());
    }

    #[test]
    fn test_search_hits() {
        let resp: TvdbResponse<Vec<SearchHit>> = serde_json::from_str(
            r#"{"status": "success", "data": [
                {"objectID": "series-81189", "tvdb_id": "81189", "name": "Breaking Bad",
                 "slug": "breaking-bad", "year": "2008", "type": "series",
                 "overview": "A chemistry teacher..."},
                {"tvdb_id": "n/a", "name": "Broken"},
                {"tvdb_id": "12", "name": "Bare", "slug": "", "year": ""}
            ]}"#,
        )
        .unwrap();
        let matches: Vec<SeriesMatch> = resp
            .data
            .unwrap()
            .into_iter()
            .filter_map(SearchHit::into_series_match)
            .collect();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].tvdb_id, 81189);
        assert_eq!(matches[0].slug.as_deref(), Some("breaking-bad"));
        assert_eq!(matches[0].year.as_deref(), Some("2008"));
        assert_eq!(matches[1].tvdb_id, 12);
        assert_eq!(matches[1].slug, None);
        assert_eq!(matches[1].year, None);
    }

    #[test]
    fn test_movie_runtime() {
        let resp: TvdbResponse<TvdbMovie> =
            serde_json::from_str(r#"{"data": {"id": 3, "name": "Heat", "runtime": 170}}"#)
                .unwrap();
        let runtime = resp.data.unwrap().runtime;
        assert_eq!(runtime.and_then(runtime_to_duration).as_deref(), Some("2:50:00"));
        assert_eq!(runtime_to_duration(0), None);
        assert_eq!(runtime_to_duration(42).as_deref(), Some("42:00"));
    }

    #[test]
    fn test_envelope() {
        let resp: TvdbResponse<EpisodesPage> = serde_json::from_str(
            r#"{"status": "success",
                "data": {"series": {"id": 1}, "episodes": [{"name": "A"}]},
                "links": {"prev": null, "self": "x", "next": null}}"#,
        )
        .unwrap();
        assert_eq!(resp.data.unwrap().episodes.len(), 1);
        assert!(resp.links.unwrap().next.is_none());
    }
}
