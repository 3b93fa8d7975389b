use std::collections::{HashMap, HashSet};

use crate::error::ProviderError;
use crate::provider::{PlayerId, StatsProvider};
use crate::table::{Cell, Table};

const COL_PLAYER_ID: &str = "PLAYER_ID";
const COL_PLAYER_NAME: &str = "PLAYER_NAME";
const COL_GAMES_PLAYED: &str = "GP";
const COL_PERSON_ID: &str = "PERSON_ID";
const COL_ROSTER_STATUS: &str = "ROSTERSTATUS";

/// Bidirectional name/identifier lookup for one season.
#[derive(Debug, Clone, Default)]
pub struct PlayerLookup {
    /// Keys are trimmed, uppercased names.
    pub name_to_id: HashMap<String, PlayerId>,
    /// Values keep the provider's casing.
    pub id_to_name: HashMap<PlayerId, String>,
    /// Deduplicated `PLAYER_ID`/`PLAYER_NAME`/`GP` rows, sorted by name.
    pub table: Table,
}

impl PlayerLookup {
    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<PlayerId> {
        find_player_id(name, &self.name_to_id)
    }

    pub fn search(&self, partial: &str, limit: usize) -> Vec<(String, PlayerId)> {
        search_players(partial, &self.name_to_id, limit)
    }
}

pub fn name_key(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Fetches the season stats snapshot and builds the lookup from it.
pub fn build_player_lookup<P>(provider: &P, season: &str) -> Result<PlayerLookup, ProviderError>
where
    P: StatsProvider + ?Sized,
{
    let stats = provider.league_player_stats(season, None)?;
    Ok(player_lookup_from_stats(&stats))
}

/// Rows without an identifier or name are dropped. When a name repeats (case
/// insensitively) the row with more games played wins, earlier rows on ties.
pub fn player_lookup_from_stats(stats: &Table) -> PlayerLookup {
    struct Candidate {
        id: PlayerId,
        name: String,
        games: Option<i64>,
    }

    let (Some(id_idx), Some(name_idx)) = (
        stats.column_index(COL_PLAYER_ID),
        stats.column_index(COL_PLAYER_NAME),
    ) else {
        return PlayerLookup::default();
    };
    let gp_idx = stats.column_index(COL_GAMES_PLAYED);

    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, Candidate> = HashMap::new();
    for row in &stats.rows {
        let Some(id) = row[id_idx].as_i64() else {
            continue;
        };
        let name = match &row[name_idx] {
            Cell::Null => continue,
            cell => cell.render().trim().to_string(),
        };
        if name.is_empty() {
            continue;
        }
        let games = gp_idx.and_then(|idx| row[idx].as_i64());
        let key = name_key(&name);
        match best.get_mut(&key) {
            Some(current) => {
                if games > current.games {
                    *current = Candidate { id, name, games };
                }
            }
            None => {
                order.push(key.clone());
                best.insert(key, Candidate { id, name, games });
            }
        }
    }

    let kept = order
        .into_iter()
        .filter_map(|key| best.remove(&key).map(|c| (key, c)))
        .collect::<Vec<_>>();

    let mut lookup = PlayerLookup::default();
    let mut rows = Vec::with_capacity(kept.len());
    for (key, c) in kept {
        // One identifier under two names keeps the first-seen name.
        if lookup.id_to_name.contains_key(&c.id) {
            continue;
        }
        lookup.name_to_id.insert(key, c.id);
        lookup.id_to_name.insert(c.id, c.name.clone());
        rows.push(c);
    }
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    let mut columns = vec![COL_PLAYER_ID.to_string(), COL_PLAYER_NAME.to_string()];
    if gp_idx.is_some() {
        columns.push(COL_GAMES_PLAYED.to_string());
    }
    lookup.table = Table::new(columns);
    for c in rows {
        let mut row = vec![Cell::Int(c.id), Cell::Text(c.name)];
        if gp_idx.is_some() {
            row.push(c.games.map(Cell::Int).unwrap_or(Cell::Null));
        }
        lookup.table.push_row(row);
    }
    lookup
}

/// Case-insensitive, whitespace-trimmed exact match.
pub fn find_player_id(name: &str, name_to_id: &HashMap<String, PlayerId>) -> Option<PlayerId> {
    let key = name_key(name);
    if key.is_empty() {
        return None;
    }
    name_to_id.get(&key).copied()
}

/// Case-insensitive substring search. Earlier match positions rank first,
/// then names alphabetically.
pub fn search_players(
    partial: &str,
    name_to_id: &HashMap<String, PlayerId>,
    limit: usize,
) -> Vec<(String, PlayerId)> {
    let query = name_key(partial);
    let mut hits = name_to_id
        .iter()
        .filter_map(|(name, id)| name.find(&query).map(|pos| (pos, name.clone(), *id)))
        .collect::<Vec<_>>();
    hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    hits.truncate(limit);
    hits.into_iter().map(|(_, name, id)| (name, id)).collect()
}

/// Identifier to display name, straight from the season stats. Repeated
/// identifiers keep their first name.
pub fn build_player_dict<P>(provider: &P, season: &str) -> Result<HashMap<PlayerId, String>, ProviderError>
where
    P: StatsProvider + ?Sized,
{
    let stats = provider.league_player_stats(season, None)?;
    Ok(player_dict_from_stats(&stats))
}

pub fn player_dict_from_stats(stats: &Table) -> HashMap<PlayerId, String> {
    let mut out = HashMap::new();
    let (Some(id_idx), Some(name_idx)) = (
        stats.column_index(COL_PLAYER_ID),
        stats.column_index(COL_PLAYER_NAME),
    ) else {
        return out;
    };
    for row in &stats.rows {
        let (Some(id), Some(name)) = (row[id_idx].as_i64(), row[name_idx].as_str()) else {
            continue;
        };
        out.entry(id).or_insert_with(|| name.trim().to_string());
    }
    out
}

pub fn player_name_from_id<P>(
    provider: &P,
    player_id: PlayerId,
    season: &str,
) -> Result<Option<String>, ProviderError>
where
    P: StatsProvider + ?Sized,
{
    Ok(build_player_dict(provider, season)?.remove(&player_id))
}

/// Identifiers from the team-filtered season stats, in provider order.
pub fn team_roster_player_ids<P>(
    provider: &P,
    team_id: u32,
    season: &str,
) -> Result<Vec<PlayerId>, ProviderError>
where
    P: StatsProvider + ?Sized,
{
    let stats = provider.league_player_stats(season, Some(team_id))?;
    let ids: Vec<PlayerId> = stats
        .column(COL_PLAYER_ID)
        .map(|col| col.filter_map(Cell::as_i64).collect())
        .unwrap_or_default();
    Ok(ids)
}

/// Players currently on a roster, in provider order.
pub fn active_player_ids<P>(provider: &P, season: &str) -> Result<Vec<PlayerId>, ProviderError>
where
    P: StatsProvider + ?Sized,
{
    let players = provider.all_players(season, true)?;
    Ok(active_ids_from_directory(&players))
}

pub fn active_ids_from_directory(players: &Table) -> Vec<PlayerId> {
    let Some(id_idx) = players.column_index(COL_PERSON_ID) else {
        return Vec::new();
    };
    let status_idx = players.column_index(COL_ROSTER_STATUS);

    let mut seen = HashSet::new();
    players
        .rows
        .iter()
        .filter(|row| status_idx.is_none_or(|idx| row[idx].as_i64() == Some(1)))
        .filter_map(|row| row[id_idx].as_i64())
        .filter(|id| seen.insert(*id))
        .collect()
}
