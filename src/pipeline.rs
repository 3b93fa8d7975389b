use std::collections::HashMap;
use std::fmt;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, ProviderError};
use crate::persist::{PersistSummary, normalize_shots, persist_batch};
use crate::players::{active_player_ids, build_player_dict};
use crate::provider::{PlayerId, StatsProvider};
use crate::shots::{COL_PLAYER_NAME, get_player_shots};
use crate::table::{Cell, Table};

pub const UNKNOWN_PLAYER: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct PlayerFailure {
    pub player_id: PlayerId,
    pub player_name: Option<String>,
    pub error: String,
}

impl fmt::Display for PlayerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.player_name {
            Some(name) => write!(f, "{name} ({}): {}", self.player_id, self.error),
            None => write!(f, "player {}: {}", self.player_id, self.error),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub season: String,
    pub players_attempted: usize,
    pub players_with_shots: usize,
    pub players_without_shots: usize,
    pub failures: Vec<PlayerFailure>,
    pub rows: usize,
}

/// Per-player shot tables in resolution order, plus what happened along the way.
#[derive(Debug, Clone, Default)]
pub struct ShotBatch {
    pub tables: Vec<Table>,
    pub report: BatchReport,
}

impl ShotBatch {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Persisted {
        report: BatchReport,
        summary: PersistSummary,
    },
    /// Nothing came back for any player; nothing was written.
    NoData { report: BatchReport },
}

impl RunOutcome {
    pub fn report(&self) -> &BatchReport {
        match self {
            RunOutcome::Persisted { report, .. } | RunOutcome::NoData { report } => report,
        }
    }
}

/// Active player identifiers in provider order, truncated to `cap`.
pub fn resolve_player_ids<P>(
    provider: &P,
    season: &str,
    cap: Option<usize>,
) -> Result<Vec<PlayerId>, ProviderError>
where
    P: StatsProvider + ?Sized,
{
    let mut ids = active_player_ids(provider, season)?;
    if let Some(cap) = cap {
        ids.truncate(cap);
    }
    Ok(ids)
}

/// Fetches shots for each player in turn. A failing player is logged,
/// recorded in the report and skipped; it never stops the batch.
pub fn collect_shots<P>(
    provider: &P,
    player_ids: &[PlayerId],
    names: &HashMap<PlayerId, String>,
    cfg: &PipelineConfig,
) -> ShotBatch
where
    P: StatsProvider + ?Sized,
{
    let mut batch = ShotBatch {
        tables: Vec::new(),
        report: BatchReport {
            season: cfg.season.clone(),
            ..BatchReport::default()
        },
    };
    let total = player_ids.len();
    let every = cfg.progress_every.max(1);

    for (idx, player_id) in player_ids.iter().copied().enumerate() {
        let name = names.get(&player_id);
        batch.report.players_attempted += 1;

        match get_player_shots(provider, player_id, &cfg.season, cfg.request_delay) {
            Ok(mut shots) if !shots.is_empty() => {
                let display = name.map(String::as_str).unwrap_or(UNKNOWN_PLAYER);
                shots.stamp(COL_PLAYER_NAME, Cell::Text(display.to_string()));
                batch.report.players_with_shots += 1;
                batch.report.rows += shots.len();
                batch.tables.push(shots);
            }
            Ok(_) => batch.report.players_without_shots += 1,
            Err(err) => {
                let failure = PlayerFailure {
                    player_id,
                    player_name: name.cloned(),
                    error: err.to_string(),
                };
                warn!(player = %failure_label(&failure), error = %err, "shot fetch failed, skipping player");
                batch.report.failures.push(failure);
            }
        }

        let done = idx + 1;
        if done % every == 0 || done == total {
            info!(
                processed = done,
                total,
                rows = batch.report.rows,
                "shot fetch progress"
            );
        }
    }

    batch
}

fn failure_label(failure: &PlayerFailure) -> String {
    match &failure.player_name {
        Some(name) => name.clone(),
        None => format!("id {}", failure.player_id),
    }
}

/// One full pass: resolve players, fetch every shot chart, then write the
/// season parquet file and append it to the database. Provider failures while
/// resolving players abort the run; per-player failures do not.
pub fn run<P>(provider: &P, cfg: &PipelineConfig) -> Result<RunOutcome, PipelineError>
where
    P: StatsProvider + ?Sized,
{
    info!(season = %cfg.season, cap = ?cfg.max_players, "starting shot pull");
    let names = build_player_dict(provider, &cfg.season)?;
    let player_ids = resolve_player_ids(provider, &cfg.season, cfg.max_players)?;
    info!(players = player_ids.len(), known_names = names.len(), "resolved active players");

    let batch = collect_shots(provider, &player_ids, &names, cfg);
    if batch.is_empty() {
        warn!(
            season = %cfg.season,
            attempted = batch.report.players_attempted,
            failures = batch.report.failures.len(),
            "no shots pulled, skipping persistence"
        );
        return Ok(RunOutcome::NoData {
            report: batch.report,
        });
    }

    let normalized = normalize_shots(batch.tables);
    let summary = persist_batch(&normalized, cfg)?;
    Ok(RunOutcome::Persisted {
        report: batch.report,
        summary,
    })
}
