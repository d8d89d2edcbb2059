use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use reqwest::{header, Client, Method, Response};
use serde::{Deserialize, Serialize};

use crate::logging;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

#[derive(Serialize, Deserialize)]
/// An empty struct to represent an empty request or response.
pub struct Empty {}

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
///
/// The client carries no overall timeout of its own; callers apply the
/// per-run timeout on each request.
fn get_client() -> Result<&'static Client, reqwest::Error> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .brotli(true)
            .gzip(true)
            .connect_timeout(Duration::from_secs(8))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
    })
}

/// Sends a single HTTP POST with a JSON body and the specified headers,
/// bounded by `timeout` for the whole request.
///
/// Exactly one attempt is made; the caller classifies the outcome. The
/// error type stays `reqwest::Error` so callers can distinguish a timeout
/// from other transport faults.
///
/// # Arguments
///
/// * `url`: The URL to send the POST request to.
/// * `headers`: Headers to include with the request.
/// * `body`: The value serialized as the JSON request body.
/// * `timeout`: Upper bound on the whole request.
///
/// # Returns
///
/// * `Result<Response, reqwest::Error>`: The HTTP response regardless of
///   status code, or the transport-level error.
pub async fn post_json<REQ>(
    url: &str,
    headers: header::HeaderMap,
    body: &REQ,
    timeout: Duration,
) -> Result<Response, reqwest::Error>
where
    REQ: Serialize,
{
    let visit_log = format!("{}:{}", Method::POST, url);
    let client = get_client()?;

    let start = Instant::now();
    let res = client
        .request(Method::POST, url)
        .headers(headers)
        .json(body)
        .timeout(timeout)
        .send()
        .await;
    let elapsed = start.elapsed().as_millis();

    match &res {
        Ok(_) => logging::info(format!("{} {} ms", visit_log, elapsed)),
        Err(why) => logging::error(format!(
            "{} failed because {:?}. {} ms",
            visit_log, why, elapsed
        )),
    }

    res
}
