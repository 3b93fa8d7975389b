#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use nba_shot_prob::config::PipelineConfig;
use nba_shot_prob::error::ProviderError;
use nba_shot_prob::provider::{PlayerId, StatsProvider};
use nba_shot_prob::table::{Table, parse_result_set_json};

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn fixture_table(name: &str) -> Table {
    parse_result_set_json(&read_fixture(name)).expect("fixture should parse")
}

/// Fresh, empty directory under the system temp dir.
pub fn temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let dir = std::env::temp_dir().join(format!(
        "nba_shot_prob_{label}_{}_{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

pub fn test_config(out_dir: PathBuf) -> PipelineConfig {
    PipelineConfig {
        db_path: out_dir.join("shots.sqlite"),
        out_dir,
        max_players: None,
        request_delay: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

pub enum ShotReply {
    Rows(Table),
    Fail(u16),
}

/// In-memory provider. Players without a scripted reply get an empty chart.
#[derive(Default)]
pub struct FakeProvider {
    pub stats: Table,
    pub directory: Table,
    pub shots: HashMap<PlayerId, ShotReply>,
    pub fail_stats: bool,
    pub shot_calls: RefCell<Vec<PlayerId>>,
}

impl StatsProvider for FakeProvider {
    fn league_player_stats(&self, _season: &str, _team_id: Option<u32>) -> Result<Table, ProviderError> {
        if self.fail_stats {
            return Err(ProviderError::Status {
                status: 503,
                url: "leaguedashplayerstats".to_string(),
            });
        }
        Ok(self.stats.clone())
    }

    fn all_players(&self, _season: &str, _current_only: bool) -> Result<Table, ProviderError> {
        Ok(self.directory.clone())
    }

    fn shot_chart(&self, player_id: PlayerId, _season: &str) -> Result<Table, ProviderError> {
        self.shot_calls.borrow_mut().push(player_id);
        match self.shots.get(&player_id) {
            Some(ShotReply::Rows(table)) => Ok(table.clone()),
            Some(ShotReply::Fail(status)) => Err(ProviderError::Status {
                status: *status,
                url: format!("shotchartdetail?PlayerID={player_id}"),
            }),
            None => Ok(Table::default()),
        }
    }
}

/// A player directory listing `ids` as active, in order.
pub fn directory(ids: &[PlayerId]) -> Table {
    use nba_shot_prob::table::Cell;
    let mut t = Table::new(vec!["PERSON_ID".to_string(), "ROSTERSTATUS".to_string()]);
    for id in ids {
        t.push_row(vec![Cell::Int(*id), Cell::Int(1)]);
    }
    t
}

/// A season stats table naming each `(id, name)` with 70 games played.
pub fn season_stats(players: &[(PlayerId, &str)]) -> Table {
    use nba_shot_prob::table::Cell;
    let mut t = Table::new(vec![
        "PLAYER_ID".to_string(),
        "PLAYER_NAME".to_string(),
        "GP".to_string(),
    ]);
    for (id, name) in players {
        t.push_row(vec![Cell::Int(*id), Cell::Text(name.to_string()), Cell::Int(70)]);
    }
    t
}

/// `n` shot rows for `player_id`, shaped like a shot chart response.
pub fn shot_rows(player_id: PlayerId, n: usize) -> Table {
    use nba_shot_prob::table::Cell;
    let mut t = Table::new(
        [
            "GRID_TYPE",
            "GAME_ID",
            "GAME_EVENT_ID",
            "PLAYER_ID",
            "PLAYER_NAME",
            "LOC_X",
            "LOC_Y",
            "SHOT_DISTANCE",
            "SHOT_ZONE_BASIC",
            "SHOT_MADE_FLAG",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    );
    for i in 0..n {
        let i = i as i64;
        t.push_row(vec![
            Cell::Text("Shot Chart Detail".to_string()),
            Cell::Text(format!("00223{:05}", i / 3)),
            Cell::Int(i * 10 + 1),
            Cell::Int(player_id),
            Cell::Text("Provider Name".to_string()),
            Cell::Int(i * 7 - 20),
            Cell::Int(i * 11),
            Cell::Int(i % 28),
            Cell::Text("Mid-Range".to_string()),
            Cell::Int(i % 2),
        ]);
    }
    t
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a debug-level fmt subscriber on this thread and returns the
/// formatted log output next to its result.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let bytes = buf.0.lock().expect("log buffer lock").clone();
    (out, String::from_utf8(bytes).expect("logs are utf-8"))
}

pub struct StubServer {
    /// Base URL to hand to `NbaStatsClient::with_base_url`.
    pub url: String,
    pub hits: Arc<AtomicUsize>,
}

impl StubServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Local HTTP server answering one connection per scripted `(status, body)`,
/// in order. Stops accepting once the script runs out.
pub fn stub_server(replies: Vec<(u16, &'static str)>) -> StubServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    thread::spawn(move || {
        for (status, body) in replies {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&chunk[..n]),
                }
            }
            counter.fetch_add(1, Ordering::SeqCst);
            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                429 => "Too Many Requests",
                503 => "Service Unavailable",
                _ => "Status",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    StubServer {
        url: format!("http://{addr}/stats"),
        hits,
    }
}
