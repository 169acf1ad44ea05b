// SPDX-License-Identifier: MIT OR Apache-2.0
use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::time::Duration;

/// Thin `reqwest` wrapper over a running `titan-http` instance's REST and
/// SSE surface. Holds no state of its own beyond the base URL and an HTTP
/// client.
pub struct TitanClient {
    base_url: String,
    http: reqwest::Client,
}

impl TitanClient {
    pub fn new(base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds with static config");
        Self { base_url, http }
    }

    /// Percent-encode a plain identifier the way `titan-http` expects it in
    /// a path segment.
    pub fn encode_id(&self, id: &str) -> Result<String> {
        titan_idcodec::encode(id).context("encoding identifier")
    }

    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        self.get_json_query(path, &[]).await
    }

    pub async fn get_json_query(&self, path: &str, query: &[(String, String)]) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).query(query).send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        let body = response.text().await.with_context(|| format!("reading response body from {url}"))?;
        if !status.is_success() {
            bail!("{url} returned {status}: {body}");
        }
        serde_json::from_str(&body).with_context(|| format!("parsing JSON response from {url}"))
    }

    pub async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await.with_context(|| format!("GET {url}"))?;
        let status = response.status();
        let body = response.text().await.with_context(|| format!("reading response body from {url}"))?;
        if !status.is_success() {
            bail!("{url} returned {status}: {body}");
        }
        Ok(body)
    }

    /// Tail `/events`, printing one JSON object per received `change` event
    /// until the connection ends or the process is interrupted.
    pub async fn watch_events(&self, query: &[(String, String)]) -> Result<()> {
        let url = format!("{}/events", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(query)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{url} returned {status}: {body}");
        }

        let mut buf = String::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("reading event stream from {url}"))?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buf.find("\n\n") {
                let frame = buf[..pos].to_string();
                buf.drain(..pos + 2);
                if let Some(data) = parse_sse_data(&frame) {
                    println!("{data}");
                }
            }
        }
        Ok(())
    }
}

/// Pull the `data:` line(s) out of one SSE frame, ignoring `event:`/`id:`.
fn parse_sse_data(frame: &str) -> Option<String> {
    let data: Vec<&str> = frame.lines().filter_map(|line| line.strip_prefix("data:")).map(str::trim).collect();
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_data_line_and_ignores_event_line() {
        let frame = "event: change\ndata: {\"entityId\":\"urn:ex:1\"}";
        assert_eq!(parse_sse_data(frame), Some("{\"entityId\":\"urn:ex:1\"}".to_string()));
    }

    #[test]
    fn joins_multiple_data_lines() {
        let frame = "data: line one\ndata: line two";
        assert_eq!(parse_sse_data(frame), Some("line one\nline two".to_string()));
    }

    #[test]
    fn frame_with_no_data_line_is_none() {
        let frame = "event: lagged\nid: 7";
        assert_eq!(parse_sse_data(frame), None);
    }

    #[test]
    fn new_client_trims_trailing_slash_from_base_url() {
        let client = TitanClient::new("http://localhost:8080/".to_string());
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
