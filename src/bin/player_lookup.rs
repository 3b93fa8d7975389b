use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use nba_shot_prob::config::PipelineConfig;
use nba_shot_prob::players::build_player_lookup;
use nba_shot_prob::provider::NbaStatsClient;
use nba_shot_prob::shots::{get_player_shots, make_rate};

const DEFAULT_LIMIT: usize = 10;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let query = positional_query(&args)
        .ok_or_else(|| anyhow!("usage: player_lookup <name> [--season 2023-24] [--limit N] [--shots]"))?;
    let limit = parse_limit_arg(&args).unwrap_or(DEFAULT_LIMIT);
    let want_shots = args.iter().any(|a| a == "--shots");

    let mut cfg = PipelineConfig::from_env().context("invalid environment configuration")?;
    cfg.apply_args(&args).context("invalid arguments")?;

    let client = NbaStatsClient::new(&cfg).context("failed to build stats client")?;
    let lookup = build_player_lookup(&client, &cfg.season)
        .with_context(|| format!("fetch player lookup for {}", cfg.season))?;
    println!("{} players in {}", lookup.len(), cfg.season);

    let Some(player_id) = lookup.find(&query) else {
        let hits = lookup.search(&query, limit);
        if hits.is_empty() {
            println!("No player matches \"{query}\".");
        } else {
            println!("No exact match for \"{query}\". Candidates:");
            for (name, id) in hits {
                println!("  {id:>10}  {name}");
            }
        }
        return Ok(());
    };

    let name = lookup
        .id_to_name
        .get(&player_id)
        .cloned()
        .unwrap_or_else(|| query.clone());
    println!("{name}: {player_id}");

    if want_shots {
        let shots = get_player_shots(&client, player_id, &cfg.season, cfg.request_delay)
            .with_context(|| format!("fetch shots for {name}"))?;
        println!("Shots: {}", shots.len());
        if let Some(rate) = make_rate(&shots) {
            println!("FG%: {:.1}", rate * 100.0);
        }
    }

    Ok(())
}

/// Words that are neither flags nor flag values, joined with spaces.
fn positional_query(args: &[String]) -> Option<String> {
    let mut words = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with("--") {
            let takes_value = matches!(
                arg.as_str(),
                "--season" | "--limit" | "--max-players" | "--db" | "--out-dir"
            );
            skip_next = takes_value;
            continue;
        }
        words.push(arg.as_str());
    }
    let query = words.join(" ");
    if query.trim().is_empty() {
        None
    } else {
        Some(query)
    }
}

fn parse_limit_arg(args: &[String]) -> Option<usize> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix("--limit=") {
            return raw.trim().parse().ok();
        }
        if arg == "--limit" {
            return args.get(idx + 1).and_then(|v| v.trim().parse().ok());
        }
    }
    None
}
