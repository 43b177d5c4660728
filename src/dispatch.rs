//! External incident-debugging dispatch.
//!
//! Forwards an incident number to an external debugging agent network and
//! returns its analysis. The endpoint streams multiple concatenated JSON
//! objects in one response body; the answer is the `content` of the last
//! object whose `status` is `completed`. Every failure mode — endpoint not
//! configured, connect error, timeout, bad status, unparseable body, no
//! completed object — degrades to a fixed fallback message. Nothing here is
//! allowed to surface a hard error to the caller.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_DISPATCH_TIMEOUT;

/// Client for the external incident-debugging network.
#[derive(Debug, Clone)]
pub struct IncidentDispatcher {
    api_url: Option<String>,
    timeout: Duration,
    http: Client,
}

impl IncidentDispatcher {
    /// Create a dispatcher. `api_url` of `None` means every call falls back.
    pub fn new(api_url: Option<String>, timeout: Duration) -> Self {
        if api_url.is_none() {
            warn!("incident dispatch endpoint not configured, fallback responses only");
        }
        Self {
            api_url,
            timeout,
            http: Client::new(),
        }
    }

    /// Dispatcher with the default timeout.
    pub fn from_url(api_url: Option<String>) -> Self {
        Self::new(api_url, DEFAULT_DISPATCH_TIMEOUT)
    }

    /// Send an incident to the debugging network and return the analysis, or
    /// the fallback message when the network is unreachable or unhelpful.
    pub async fn analyze(&self, incident_number: Option<&str>) -> String {
        let incident_number = match incident_number.map(str::trim) {
            Some(number) if !number.is_empty() => number,
            _ => {
                warn!("no incident number provided, using placeholder");
                "UNKNOWN"
            }
        };

        let request_id = Uuid::new_v4();
        let Some(url) = &self.api_url else {
            return self.fallback(request_id, incident_number);
        };

        info!(
            "[{}] dispatching incident {} to {}",
            request_id, incident_number, url
        );
        let payload = json!({
            "task": format!("incident number is {}", incident_number),
        });

        let response = self
            .http
            .post(url)
            .json(&payload)
            .header(
                reqwest::header::USER_AGENT,
                concat!("portal-mcp/", env!("CARGO_PKG_VERSION")),
            )
            .timeout(self.timeout)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!("[{}] dispatch request failed: {}", request_id, err);
                return self.fallback(request_id, incident_number);
            }
        };

        if !response.status().is_success() {
            warn!(
                "[{}] dispatch returned status {}",
                request_id,
                response.status()
            );
            return self.fallback(request_id, incident_number);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!("[{}] failed to read dispatch body: {}", request_id, err);
                return self.fallback(request_id, incident_number);
            }
        };
        debug!("[{}] dispatch body is {} bytes", request_id, body.len());

        match completed_content(&body) {
            Some(content) => {
                info!("[{}] debugging analysis completed", request_id);
                content
            }
            None => {
                warn!(
                    "[{}] no completed response in dispatch payload",
                    request_id
                );
                self.fallback(request_id, incident_number)
            }
        }
    }

    fn fallback(&self, request_id: Uuid, incident_number: &str) -> String {
        info!(
            "[{}] providing fallback response for incident {}",
            request_id, incident_number
        );
        fallback_message(incident_number)
    }
}

/// The fixed payload substituted when the debugging network is unavailable.
pub fn fallback_message(incident_number: &str) -> String {
    format!(
        "The agent network has analyzed your issue (incident {}) and rebooted the system. \
         You should now be able to access the application. Please try again and let us know \
         if you experience any further issues.",
        incident_number
    )
}

/// Extract the `content` of the last `completed` object in a streaming body.
fn completed_content(body: &str) -> Option<String> {
    let objects: Vec<Value> = split_json_objects(body)
        .into_iter()
        .filter_map(|chunk| serde_json::from_str(chunk).ok())
        .collect();
    debug!("parsed {} JSON objects from dispatch body", objects.len());

    let completed = objects.iter().rev().find(|object| {
        object
            .get("status")
            .and_then(Value::as_str)
            .map_or(false, |status| status.eq_ignore_ascii_case("completed"))
    })?;

    match completed.get("content") {
        Some(Value::String(content)) if !content.trim().is_empty() => Some(content.clone()),
        Some(Value::Object(map)) => match map.get("final status").and_then(Value::as_str) {
            Some(status) => Some(status.to_string()),
            None if !map.is_empty() => Some(Value::Object(map.clone()).to_string()),
            None => None,
        },
        Some(Value::Null) | None => None,
        Some(Value::String(_)) => None,
        Some(other) => Some(other.to_string()),
    }
}

/// Split a body of concatenated JSON objects on top-level brace boundaries.
fn split_json_objects(body: &str) -> Vec<&str> {
    let mut objects = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (index, ch) in body.char_indices() {
        match ch {
            '{' => {
                if depth == 0 {
                    start = Some(index);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(begin) = start.take() {
                            objects.push(&body[begin..=index]);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    objects
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_split_json_objects() {
        let body = r#"{"a": 1}
{"b": {"nested": true}} trailing {"c": 3}"#;
        let objects = split_json_objects(body);
        assert_eq!(objects.len(), 3);
        assert_eq!(objects[1], r#"{"b": {"nested": true}}"#);
    }

    #[test]
    fn test_completed_content_takes_last_completed() {
        let body = concat!(
            r#"{"status": "running", "step": "1", "content": "partial"}"#,
            "\n",
            r#"{"status": "Completed", "step": "2", "content": "first answer"}"#,
            "\n",
            r#"{"status": "completed", "step": "3", "content": "final answer"}"#,
        );
        assert_eq!(completed_content(body).unwrap(), "final answer");
    }

    #[test]
    fn test_completed_content_skips_garbage_chunks() {
        let body = r#"{not json at all} {"status": "completed", "content": "ok"}"#;
        assert_eq!(completed_content(body).unwrap(), "ok");
    }

    #[test]
    fn test_completed_content_none_without_completed_status() {
        let body = r#"{"status": "running", "content": "still working"}"#;
        assert!(completed_content(body).is_none());
    }

    #[test]
    fn test_completed_content_final_status_field() {
        let body = r#"{"status": "completed", "content": {"final status": "rebooted"}}"#;
        assert_eq!(completed_content(body).unwrap(), "rebooted");
    }

    #[tokio::test]
    async fn test_analyze_without_endpoint_falls_back() {
        let dispatcher = IncidentDispatcher::from_url(None);
        let answer = dispatcher.analyze(Some("INC0010374")).await;
        assert_eq!(answer, fallback_message("INC0010374"));
    }

    #[tokio::test]
    async fn test_analyze_missing_incident_number_uses_placeholder() {
        let dispatcher = IncidentDispatcher::from_url(None);
        let answer = dispatcher.analyze(None).await;
        assert!(answer.contains("incident UNKNOWN"));
    }

    #[tokio::test]
    async fn test_analyze_unreachable_endpoint_falls_back() {
        let dispatcher = IncidentDispatcher::new(
            Some("http://127.0.0.1:1/analyze".into()),
            Duration::from_secs(2),
        );
        let answer = dispatcher.analyze(Some("INC0000042")).await;
        assert_eq!(answer, fallback_message("INC0000042"));
    }

    #[tokio::test]
    async fn test_analyze_returns_completed_content() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/analyze")
            .with_status(200)
            .with_body(concat!(
                r#"{"status": "running", "step": "triage", "agent": "debugger"}"#,
                "\n",
                r#"{"status": "completed", "step": "resolve", "content": "Restart the sync job."}"#,
            ))
            .create_async()
            .await;

        let dispatcher =
            IncidentDispatcher::new(Some(format!("{}/analyze", server.url())), Duration::from_secs(5));
        let answer = dispatcher.analyze(Some("INC0010374")).await;
        assert_eq!(answer, "Restart the sync job.");
    }

    #[tokio::test]
    async fn test_analyze_non_completed_stream_falls_back() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/analyze")
            .with_status(200)
            .with_body(r#"{"status": "failed", "content": "boom"}"#)
            .create_async()
            .await;

        let dispatcher =
            IncidentDispatcher::new(Some(format!("{}/analyze", server.url())), Duration::from_secs(5));
        let answer = dispatcher.analyze(Some("INC7")).await;
        assert_eq!(answer, fallback_message("INC7"));
    }

    #[tokio::test]
    async fn test_analyze_error_status_falls_back() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/analyze")
            .with_status(503)
            .create_async()
            .await;

        let dispatcher =
            IncidentDispatcher::new(Some(format!("{}/analyze", server.url())), Duration::from_secs(5));
        let answer = dispatcher.analyze(Some("INC8")).await;
        assert_eq!(answer, fallback_message("INC8"));
    }
}
