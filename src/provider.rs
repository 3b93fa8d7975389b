use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::ProviderError;
use crate::http_client::http_client;
use crate::table::{Table, parse_result_set_json};

pub type PlayerId = i64;

const NBA_STATS_URL: &str = "https://stats.nba.com/stats";
const LEAGUE_ID: &str = "00";
const REGULAR_SEASON: &str = "Regular Season";
const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(500);

pub const NBA_TEAMS: &[(&str, u32)] = &[
    ("Atlanta Hawks", 1610612737),
    ("Boston Celtics", 1610612738),
    ("Cleveland Cavaliers", 1610612739),
    ("New Orleans Pelicans", 1610612740),
    ("Chicago Bulls", 1610612741),
    ("Dallas Mavericks", 1610612742),
    ("Denver Nuggets", 1610612743),
    ("Golden State Warriors", 1610612744),
    ("Houston Rockets", 1610612745),
    ("LA Clippers", 1610612746),
    ("Los Angeles Lakers", 1610612747),
    ("Miami Heat", 1610612748),
    ("Milwaukee Bucks", 1610612749),
    ("Minnesota Timberwolves", 1610612750),
    ("Brooklyn Nets", 1610612751),
    ("New York Knicks", 1610612752),
    ("Orlando Magic", 1610612753),
    ("Indiana Pacers", 1610612754),
    ("Philadelphia 76ers", 1610612755),
    ("Phoenix Suns", 1610612756),
    ("Portland Trail Blazers", 1610612757),
    ("Sacramento Kings", 1610612758),
    ("San Antonio Spurs", 1610612759),
    ("Oklahoma City Thunder", 1610612760),
    ("Toronto Raptors", 1610612761),
    ("Utah Jazz", 1610612762),
    ("Memphis Grizzlies", 1610612763),
    ("Washington Wizards", 1610612764),
    ("Detroit Pistons", 1610612765),
    ("Charlotte Hornets", 1610612766),
];

pub fn team_ids() -> Vec<u32> {
    NBA_TEAMS.iter().map(|(_, id)| *id).collect()
}

/// The statistics provider as seen by the pipeline. Each call returns the
/// first result set of the response.
pub trait StatsProvider {
    /// Per-game season stats, optionally restricted to one team.
    fn league_player_stats(&self, season: &str, team_id: Option<u32>) -> Result<Table, ProviderError>;

    /// Player directory; `current_only` limits it to the season's players.
    fn all_players(&self, season: &str, current_only: bool) -> Result<Table, ProviderError>;

    /// Regular-season field-goal attempts for one player.
    fn shot_chart(&self, player_id: PlayerId, season: &str) -> Result<Table, ProviderError>;
}

pub struct NbaStatsClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
}

impl NbaStatsClient {
    pub fn new(cfg: &PipelineConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(cfg.request_timeout)?.clone(),
            base_url: NBA_STATS_URL.to_string(),
            max_attempts: cfg.max_attempts.max(1),
        })
    }

    /// Same client pointed at another host, e.g. a mirror or a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn fetch_table(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Table, ProviderError> {
        let mut last_err = None;
        for attempt in 1..=self.max_attempts {
            match self.fetch_once(endpoint, query) {
                Ok(table) => return Ok(table),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let wait = backoff_delay(attempt);
                    debug!(endpoint, attempt, ?wait, error = %err, "retrying provider request");
                    thread::sleep(wait);
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| ProviderError::Malformed(format!("{endpoint}: no attempts made"))))
    }

    fn fetch_once(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Table, ProviderError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let resp = self.client.get(&url).query(query).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = resp.text()?;
        parse_result_set_json(&body)
    }
}

impl StatsProvider for NbaStatsClient {
    fn league_player_stats(&self, season: &str, team_id: Option<u32>) -> Result<Table, ProviderError> {
        let mut query = blank_params(&[
            "College",
            "Conference",
            "Country",
            "DateFrom",
            "DateTo",
            "Division",
            "DraftPick",
            "DraftYear",
            "GameScope",
            "GameSegment",
            "Height",
            "Location",
            "Outcome",
            "PlayerExperience",
            "PlayerPosition",
            "SeasonSegment",
            "ShotClockRange",
            "StarterBench",
            "VsConference",
            "VsDivision",
            "Weight",
        ]);
        query.extend([
            ("LastNGames", "0".to_string()),
            ("LeagueID", LEAGUE_ID.to_string()),
            ("MeasureType", "Base".to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("PORound", "0".to_string()),
            ("PaceAdjust", "N".to_string()),
            ("PerMode", "PerGame".to_string()),
            ("Period", "0".to_string()),
            ("PlusMinus", "N".to_string()),
            ("Rank", "N".to_string()),
            ("Season", season.to_string()),
            ("SeasonType", REGULAR_SEASON.to_string()),
            ("TeamID", team_id.unwrap_or(0).to_string()),
            ("TwoWay", "0".to_string()),
        ]);
        self.fetch_table("leaguedashplayerstats", &query)
    }

    fn all_players(&self, season: &str, current_only: bool) -> Result<Table, ProviderError> {
        let query = [
            ("IsOnlyCurrentSeason", if current_only { "1" } else { "0" }.to_string()),
            ("LeagueID", LEAGUE_ID.to_string()),
            ("Season", season.to_string()),
        ];
        self.fetch_table("commonallplayers", &query)
    }

    fn shot_chart(&self, player_id: PlayerId, season: &str) -> Result<Table, ProviderError> {
        let mut query = blank_params(&[
            "AheadBehind",
            "ClutchTime",
            "ContextFilter",
            "DateFrom",
            "DateTo",
            "EndPeriod",
            "EndRange",
            "GameID",
            "GameSegment",
            "Location",
            "Outcome",
            "PlayerPosition",
            "PointDiff",
            "Position",
            "RangeType",
            "RookieYear",
            "SeasonSegment",
            "StartPeriod",
            "StartRange",
            "VsConference",
            "VsDivision",
        ]);
        query.extend([
            ("ContextMeasure", "FGA".to_string()),
            ("LastNGames", "0".to_string()),
            ("LeagueID", LEAGUE_ID.to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("Period", "0".to_string()),
            ("PlayerID", player_id.to_string()),
            ("Season", season.to_string()),
            ("SeasonType", REGULAR_SEASON.to_string()),
            ("TeamID", "0".to_string()),
        ]);
        self.fetch_table("shotchartdetail", &query)
    }
}

/// 500ms, 1s, 2s, ... capped at 8s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(4);
    RETRY_BACKOFF_BASE.saturating_mul(factor)
}

fn blank_params<'a>(keys: &[&'a str]) -> Vec<(&'a str, String)> {
    keys.iter().map(|k| (*k, String::new())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(2));
        assert_eq!(backoff_delay(5), Duration::from_secs(8));
        assert_eq!(backoff_delay(30), Duration::from_secs(8));
    }

    #[test]
    fn thirty_distinct_teams() {
        let mut ids = team_ids();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 30);
    }

    #[test]
    fn retry_classification() {
        let throttled = ProviderError::Status {
            status: 429,
            url: "x".into(),
        };
        let missing = ProviderError::Status {
            status: 404,
            url: "x".into(),
        };
        assert!(throttled.is_retryable());
        assert!(!missing.is_retryable());
        assert!(!ProviderError::Malformed("bad".into()).is_retryable());
    }
}
