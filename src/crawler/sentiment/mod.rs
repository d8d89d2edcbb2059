use std::time::Duration;

use anyhow::{anyhow, Result};
use concat_string::concat_string;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{config::Config, logging, util};

const ENDPOINT_PATH: &str = "/api/cron/sentiment-data";

/// 端點回應的統計摘要，欄位皆為選填
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct SentimentSummary {
    #[serde(rename = "dataPoints")]
    pub data_points: Option<i64>,
    #[serde(rename = "topPosts")]
    pub top_posts: Option<i64>,
    pub timestamp: Option<String>,
}

/// Triggers the remote sentiment-analysis job with a single authenticated
/// POST and classifies the outcome.
///
/// Exactly one attempt is made. Every failure classification (non-200
/// status, timeout, transport fault, unparseable body) is logged here and
/// surfaced as an `Err`; on success the summary fields from the response
/// are logged and returned.
pub async fn visit(config: &Config) -> Result<SentimentSummary> {
    let url = target_url(&config.base_url);
    let headers = build_headers(&config.cron_secret)?;
    let timeout = Duration::from_secs(config.request_timeout);

    logging::info(format!("Starting sentiment data fetch from {}", url));

    let response = match util::http::post_json(&url, headers, &util::http::Empty {}, timeout).await
    {
        Ok(response) => response,
        Err(why) if why.is_timeout() => {
            logging::error(format!(
                "Request timed out after {} seconds",
                config.request_timeout
            ));
            return Err(anyhow!(
                "request timed out after {} seconds",
                config.request_timeout
            ));
        }
        Err(why) => {
            logging::error(format!("Request failed: {}", why));
            return Err(anyhow!("request failed: {:?}", why));
        }
    };

    let status = response.status();
    logging::info(format!("Response status: {}", status.as_u16()));

    if status != StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        logging::error(format!("Request failed with status {}", status.as_u16()));
        logging::error(format!("Response: {}", body));
        return Err(anyhow!("request failed with status {}", status.as_u16()));
    }

    let body = response
        .text()
        .await
        .map_err(|why| anyhow!("Error reading response body: {:?}", why))?;

    let summary = match parse_summary(&body) {
        Ok(summary) => summary,
        Err(why) => {
            logging::error(format!("Failed to parse JSON response: {}", why));
            return Err(why);
        }
    };

    logging::info("Sentiment data fetch successful!".to_string());
    logging::info(format!("Data points: {}", or_na(&summary.data_points)));
    logging::info(format!("Top posts: {}", or_na(&summary.top_posts)));
    logging::info(format!("Timestamp: {}", or_na(&summary.timestamp)));

    Ok(summary)
}

/// 組出目標網址，base_url 已於設定載入時去除尾端斜線
fn target_url(base_url: &str) -> String {
    concat_string!(base_url, ENDPOINT_PATH)
}

fn build_headers(cron_secret: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&concat_string!("Bearer ", cron_secret))?,
    );
    Ok(headers)
}

fn parse_summary(body: &str) -> Result<SentimentSummary> {
    serde_json::from_str::<SentimentSummary>(body)
        .map_err(|why| anyhow!("invalid JSON response body: {:?}", why))
}

fn or_na<T: ToString>(field: &Option<T>) -> String {
    field
        .as_ref()
        .map_or_else(|| "N/A".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        sync::oneshot,
    };

    use super::*;

    fn test_config(base_url: String, timeout: u64) -> Config {
        Config {
            base_url,
            cron_secret: "test-secret".to_string(),
            request_timeout: timeout,
        }
    }

    /// 回應一次固定內容後關閉連線的本機伺服器，並回傳收到的請求位元組
    async fn serve_once(raw_response: String) -> (String, oneshot::Receiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (request_tx, request_rx) = oneshot::channel::<Vec<u8>>();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                if request_complete(&received) {
                    break;
                }
            }
            socket.write_all(raw_response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            let _ = request_tx.send(received);
        });

        (format!("http://{}", addr), request_rx)
    }

    /// 已收到完整的標頭與 Content-Length 指示的本文時回傳 true
    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..split]
            .lines()
            .find_map(|line| {
                line.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .and_then(|v| v.trim().parse::<usize>().ok())
            })
            .unwrap_or(0);

        received.len() - split - 4 >= content_length
    }

    fn raw_response(status_line: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            content_type,
            body.len(),
            body
        )
    }

    #[test]
    fn test_target_url() {
        assert_eq!(
            target_url("http://example.com"),
            "http://example.com/api/cron/sentiment-data"
        );
    }

    #[test]
    fn test_parse_summary() {
        let summary =
            parse_summary(r#"{"dataPoints":120,"topPosts":5,"timestamp":"2024-01-01T09:00:00Z"}"#)
                .unwrap();
        assert_eq!(summary.data_points, Some(120));
        assert_eq!(summary.top_posts, Some(5));
        assert_eq!(summary.timestamp.as_deref(), Some("2024-01-01T09:00:00Z"));

        let empty = parse_summary("{}").unwrap();
        assert_eq!(empty.data_points, None);
        assert_eq!(or_na(&empty.data_points), "N/A");

        assert!(parse_summary("server error").is_err());
    }

    #[test]
    fn test_build_headers() {
        let headers = build_headers("s3cret").unwrap();
        assert_eq!(
            headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        assert_eq!(
            headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer s3cret")
        );
    }

    #[tokio::test]
    async fn test_visit_success() {
        let body = r#"{"dataPoints":42,"topPosts":3,"timestamp":"2024-01-01T09:00:00Z"}"#;
        let (base_url, _) = serve_once(raw_response("200 OK", "application/json", body)).await;

        let summary = visit(&test_config(base_url, 30)).await.unwrap();
        assert_eq!(summary.data_points, Some(42));
        assert_eq!(summary.top_posts, Some(3));
    }

    #[tokio::test]
    async fn test_visit_sends_expected_request() {
        let (base_url, request_rx) =
            serve_once(raw_response("200 OK", "application/json", "{}")).await;

        visit(&test_config(base_url, 30)).await.unwrap();

        let request = request_rx.await.unwrap();
        let request = String::from_utf8_lossy(&request);
        let lowered = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /api/cron/sentiment-data HTTP/1.1\r\n"));
        assert!(lowered.contains("content-type: application/json"));
        assert!(lowered.contains("authorization: bearer test-secret"));
        assert!(request.ends_with("\r\n\r\n{}"));
    }

    #[tokio::test]
    async fn test_visit_http_failure() {
        let (base_url, _) = serve_once(raw_response(
            "500 Internal Server Error",
            "text/plain",
            "server error",
        ))
        .await;

        let why = visit(&test_config(base_url, 30)).await.unwrap_err();
        assert!(why.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_visit_malformed_body() {
        let (base_url, _) =
            serve_once(raw_response("200 OK", "text/plain", "this is not json")).await;

        let why = visit(&test_config(base_url, 30)).await.unwrap_err();
        assert!(why.to_string().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn test_visit_timeout() {
        // 伺服器收下請求後不回應
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let why = visit(&test_config(format!("http://{}", addr), 1))
            .await
            .unwrap_err();
        assert!(why.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_visit_transport_failure() {
        // 無人監聽的埠號
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let why = visit(&test_config(format!("http://{}", addr), 5))
            .await
            .unwrap_err();
        assert!(why.to_string().contains("request failed"));
    }
}
