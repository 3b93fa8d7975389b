use std::thread;
use std::time::Duration;

use crate::error::ProviderError;
use crate::provider::{PlayerId, StatsProvider};
use crate::table::{Cell, Table};

/// Columns persisted for every shot, in output order.
pub const SHOT_COLUMNS: &[&str] = &[
    "GAME_ID",
    "GAME_EVENT_ID",
    "PLAYER_ID",
    "PLAYER_NAME",
    "TEAM_ID",
    "TEAM_NAME",
    "LOC_X",
    "LOC_Y",
    "SHOT_DISTANCE",
    "SHOT_TYPE",
    "SHOT_ZONE_BASIC",
    "SHOT_ZONE_AREA",
    "SHOT_ZONE_RANGE",
    "PERIOD",
    "MINUTES_REMAINING",
    "SECONDS_REMAINING",
    "GAME_DATE",
    "ACTION_TYPE",
    "EVENT_TYPE",
    "HTM",
    "VTM",
    "SHOT_MADE_FLAG",
    "SEASON",
];

pub const COL_PLAYER_ID: &str = "PLAYER_ID";
pub const COL_PLAYER_NAME: &str = "PLAYER_NAME";
pub const COL_SEASON: &str = "SEASON";

/// Regular-season field-goal attempts for one player, every row stamped with
/// `PLAYER_ID` and `SEASON`. Always sleeps `delay` first to stay under the
/// provider's rate limit. A player without attempts yields an empty table.
pub fn get_player_shots<P>(
    provider: &P,
    player_id: PlayerId,
    season: &str,
    delay: Duration,
) -> Result<Table, ProviderError>
where
    P: StatsProvider + ?Sized,
{
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    let mut shots = provider.shot_chart(player_id, season)?;
    shots.stamp(COL_PLAYER_ID, Cell::Int(player_id));
    shots.stamp(COL_SEASON, Cell::Text(season.to_string()));
    Ok(shots)
}

/// Share of made attempts, `None` without a usable `SHOT_MADE_FLAG`.
pub fn make_rate(shots: &Table) -> Option<f64> {
    let flags = shots
        .column("SHOT_MADE_FLAG")?
        .filter_map(Cell::as_i64)
        .collect::<Vec<_>>();
    if flags.is_empty() {
        return None;
    }
    let made = flags.iter().filter(|f| **f == 1).count();
    Some(made as f64 / flags.len() as f64)
}
