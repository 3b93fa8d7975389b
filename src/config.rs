use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_SEASON: &str = "2023-24";
pub const DEFAULT_MAX_PLAYERS: usize = 60;
pub const DEFAULT_OUT_DIR: &str = "data_raw";
pub const DEFAULT_DB_FILE: &str = "nba_shots.sqlite";
pub const DEFAULT_TABLE: &str = "shots";
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 600;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_PROGRESS_EVERY: usize = 25;

/// Everything one pipeline run needs to know. Built from defaults, then the
/// environment, then command-line flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub season: String,
    /// `None` processes every active player.
    pub max_players: Option<usize>,
    pub out_dir: PathBuf,
    pub db_path: PathBuf,
    pub table_name: String,
    /// Pause before every shot-chart request.
    pub request_delay: Duration,
    pub request_timeout: Duration,
    /// Total attempts per provider request, including the first.
    pub max_attempts: u32,
    pub progress_every: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            season: DEFAULT_SEASON.to_string(),
            max_players: Some(DEFAULT_MAX_PLAYERS),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            db_path: Path::new(DEFAULT_OUT_DIR).join(DEFAULT_DB_FILE),
            table_name: DEFAULT_TABLE.to_string(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PipelineConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(season) = get("NBA_SEASON") {
            cfg.season = season.trim().to_string();
        }
        if let Some(raw) = get("NBA_MAX_PLAYERS") {
            cfg.max_players = parse_player_cap("NBA_MAX_PLAYERS", &raw)?;
        }
        if let Some(dir) = get("NBA_OUT_DIR") {
            cfg.out_dir = PathBuf::from(dir.trim());
            cfg.db_path = cfg.out_dir.join(DEFAULT_DB_FILE);
        }
        if let Some(db) = get("NBA_DB_PATH") {
            cfg.db_path = PathBuf::from(db.trim());
        }
        if let Some(table) = get("NBA_SHOTS_TABLE") {
            cfg.table_name = table.trim().to_string();
        }
        if let Some(raw) = get("NBA_REQUEST_DELAY_MS") {
            cfg.request_delay = Duration::from_millis(parse_num("NBA_REQUEST_DELAY_MS", &raw)?);
        }
        if let Some(raw) = get("NBA_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_num("NBA_REQUEST_TIMEOUT_SECS", &raw)?;
            cfg.request_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(raw) = get("NBA_MAX_ATTEMPTS") {
            let attempts: u32 = parse_num("NBA_MAX_ATTEMPTS", &raw)?;
            cfg.max_attempts = attempts.clamp(1, 10);
        }
        if let Some(raw) = get("NBA_PROGRESS_EVERY") {
            let every: usize = parse_num("NBA_PROGRESS_EVERY", &raw)?;
            cfg.progress_every = every.max(1);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies `--season`, `--max-players`, `--out-dir` and `--db` flags.
    /// Both `--flag value` and `--flag=value` forms are accepted.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        if let Some(season) = arg_value(args, "--season") {
            self.season = season;
        }
        if let Some(raw) = arg_value(args, "--max-players") {
            self.max_players = parse_player_cap("--max-players", &raw)?;
        }
        let db_given = arg_value(args, "--db");
        if let Some(dir) = arg_value(args, "--out-dir") {
            self.out_dir = PathBuf::from(dir);
            if db_given.is_none() {
                self.db_path = self.out_dir.join(DEFAULT_DB_FILE);
            }
        }
        if let Some(db) = db_given {
            self.db_path = PathBuf::from(db);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_season(&self.season)?;
        validate_table_name(&self.table_name)?;
        Ok(())
    }

    /// `<out_dir>/shots_<season without '-'>.parquet`
    pub fn shots_path(&self) -> PathBuf {
        self.out_dir.join(shots_file_name(&self.season))
    }
}

pub fn shots_file_name(season: &str) -> String {
    format!("shots_{}.parquet", season.replace('-', ""))
}

/// Accepts labels such as `2023-24`, where the suffix is the following year.
pub fn validate_season(season: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidSeason(season.to_string());
    let (start, end) = season.split_once('-').ok_or_else(invalid)?;
    if start.len() != 4 || end.len() != 2 {
        return Err(invalid());
    }
    let start_year = start.parse::<u32>().map_err(|_| invalid())?;
    let end_year = end.parse::<u32>().map_err(|_| invalid())?;
    if (start_year + 1) % 100 != end_year {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_table_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidTableName(name.to_string()))
    }
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn parse_player_cap(key: &str, raw: &str) -> Result<Option<usize>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    let cap: usize = parse_num(key, trimmed)?;
    Ok(if cap == 0 { None } else { Some(cap) })
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}
