mod common;

use nba_shot_prob::error::ProviderError;
use nba_shot_prob::players::{
    build_player_lookup, find_player_id, player_lookup_from_stats, player_name_from_id,
    search_players, team_roster_player_ids,
};
use nba_shot_prob::table::Cell;

use common::{FakeProvider, fixture_table, season_stats};

#[test]
fn lookup_maps_are_inverse_and_same_size() {
    let lookup = player_lookup_from_stats(&fixture_table("leaguedashplayerstats.json"));
    assert_eq!(lookup.name_to_id.len(), lookup.id_to_name.len());
    assert_eq!(lookup.name_to_id.len(), 5);
    for (key, id) in &lookup.name_to_id {
        let name = lookup.id_to_name.get(id).expect("every id has a name");
        assert_eq!(&name.to_uppercase(), key);
    }
    assert_eq!(lookup.table.len(), 5);
}

#[test]
fn duplicate_name_keeps_row_with_more_games() {
    let lookup = player_lookup_from_stats(&fixture_table("leaguedashplayerstats.json"));
    assert_eq!(lookup.find("Curry Jones"), Some(1630001));
    assert!(!lookup.id_to_name.contains_key(&1630000));
}

#[test]
fn names_are_trimmed_but_keep_casing() {
    let lookup = player_lookup_from_stats(&fixture_table("leaguedashplayerstats.json"));
    assert_eq!(lookup.id_to_name.get(&2544).map(String::as_str), Some("LeBron James"));
    assert_eq!(lookup.name_to_id.get("LEBRON JAMES"), Some(&2544));
}

#[test]
fn lookup_table_is_sorted_by_name() {
    let lookup = player_lookup_from_stats(&fixture_table("leaguedashplayerstats.json"));
    let names = lookup
        .table
        .column("PLAYER_NAME")
        .expect("name column")
        .filter_map(Cell::as_str)
        .collect::<Vec<_>>();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn find_is_case_and_whitespace_insensitive() {
    let lookup = player_lookup_from_stats(&fixture_table("leaguedashplayerstats.json"));
    assert_eq!(find_player_id("  malik BEASLEY ", &lookup.name_to_id), Some(1627736));
    assert_eq!(find_player_id("Nonexistent Person", &lookup.name_to_id), None);
    assert_eq!(find_player_id("", &lookup.name_to_id), None);
    // Exact match only.
    assert_eq!(find_player_id("Beasley", &lookup.name_to_id), None);
}

#[test]
fn search_ranks_earlier_matches_first() {
    let lookup = player_lookup_from_stats(&fixture_table("leaguedashplayerstats.json"));
    let hits = search_players("curry", &lookup.name_to_id, 10);
    let names = hits.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["CURRY JONES", "SETH CURRY", "STEPHEN CURRY"]);
    assert_eq!(hits[0].1, 1630001);

    let limited = search_players(" Curry ", &lookup.name_to_id, 2);
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].0, "CURRY JONES");
    assert_eq!(limited[1].0, "SETH CURRY");

    assert!(search_players("zzz", &lookup.name_to_id, 10).is_empty());
}

#[test]
fn search_ties_break_alphabetically() {
    let lookup = player_lookup_from_stats(&season_stats(&[(1, "Bo Smith"), (2, "Al Smith"), (3, "Cy Smith")]));
    let names = lookup
        .search("smith", 10)
        .into_iter()
        .map(|(n, _)| n)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["AL SMITH", "BO SMITH", "CY SMITH"]);
}

#[test]
fn build_lookup_goes_through_provider() {
    let provider = FakeProvider {
        stats: fixture_table("leaguedashplayerstats.json"),
        ..FakeProvider::default()
    };
    let lookup = build_player_lookup(&provider, "2023-24").expect("lookup builds");
    assert_eq!(lookup.find("stephen curry"), Some(201939));

    let roster = team_roster_player_ids(&provider, 1610612744, "2023-24").expect("roster");
    assert_eq!(roster.len(), 7);

    let name = player_name_from_id(&provider, 201939, "2023-24").expect("name lookup");
    assert_eq!(name.as_deref(), Some("Stephen Curry"));
    assert_eq!(player_name_from_id(&provider, 1, "2023-24").expect("name lookup"), None);
}

#[test]
fn build_lookup_with_no_rows_is_empty() {
    let provider = FakeProvider::default();
    let lookup = build_player_lookup(&provider, "2023-24").expect("empty is fine");
    assert!(lookup.name_to_id.is_empty());
    assert!(lookup.id_to_name.is_empty());
}

#[test]
fn build_lookup_propagates_provider_errors() {
    let provider = FakeProvider {
        fail_stats: true,
        ..FakeProvider::default()
    };
    let err = build_player_lookup(&provider, "2023-24").unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 503, .. }));
}
