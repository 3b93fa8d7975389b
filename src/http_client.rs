use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER};
use tracing::debug;

use crate::error::ProviderError;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

static CLIENT: OnceCell<(Client, Duration)> = OnceCell::new();

/// Process-wide client. The timeout of the first caller wins; later callers
/// asking for another one get a debug line and the shared client.
pub fn http_client(timeout: Duration) -> Result<&'static Client, ProviderError> {
    let (client, active) = CLIENT.get_or_try_init(|| build_client(timeout).map(|c| (c, timeout)))?;
    if *active != timeout {
        debug!(requested = ?timeout, active = ?active, "shared http client keeps its first timeout");
    }
    Ok(client)
}

/// The stats API drops requests that don't look like they came from the site.
pub fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.nba.com"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
    headers.insert("x-nba-stats-origin", HeaderValue::from_static("stats"));
    headers.insert("x-nba-stats-token", HeaderValue::from_static("true"));

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}
