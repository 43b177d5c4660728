//! ServiceNow incident ticket creation and verification.
//!
//! Runs in one of two modes. Mock mode fabricates incident numbers and
//! accepts any plausibly-formatted number without contacting anything; it is
//! selected by configuration, not hardcoded, so a real instance can be
//! substituted behind the same tool contract. ServiceNow mode talks to the
//! `api/now/table/incident` REST endpoint with basic auth.
//!
//! Tickets are never persisted here; a created ticket exists only in the
//! returned record. Uniqueness of generated mock numbers is best-effort.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServiceNowConfig;
use crate::error::{Error, Result};

const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields for a new incident. Defaults mirror what the portal files when the
/// orchestrator supplies nothing.
#[derive(Debug, Clone, Serialize)]
pub struct TicketRequest {
    pub short_description: String,
    pub description: String,
    pub urgency: String,
    pub impact: String,
    pub category: String,
}

impl Default for TicketRequest {
    fn default() -> Self {
        Self {
            short_description: "Incident created via automation".into(),
            description: "This incident was created via automated workflow".into(),
            urgency: "3".into(),
            impact: "3".into(),
            category: "inquiry".into(),
        }
    }
}

/// A created or verified incident.
#[derive(Debug, Clone, Serialize)]
pub struct TicketRecord {
    /// Incident number, e.g. `INC0010374`.
    pub number: String,
    /// ServiceNow sys_id, absent in mock mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sys_id: Option<String>,
    /// Incident state.
    pub state: String,
    /// Short description.
    pub short_description: String,
    /// When the incident was opened, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
}

/// Outcome of a verification lookup.
#[derive(Debug, Clone, Serialize)]
pub struct TicketVerification {
    /// Whether the incident exists.
    pub exists: bool,
    /// The incident record, when found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<TicketRecord>,
}

/// Client for the incident ticket system.
#[derive(Debug, Clone)]
pub struct TicketClient {
    servicenow: Option<ServiceNowConfig>,
    http: Client,
}

impl TicketClient {
    /// Mock-mode client: fabricated numbers, no remote calls.
    pub fn mock() -> Self {
        Self {
            servicenow: None,
            http: Client::new(),
        }
    }

    /// ServiceNow-backed client. TLS verification is disabled because the
    /// target instances sit behind internal certificates.
    pub fn servicenow(config: ServiceNowConfig) -> Result<Self> {
        let http = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            servicenow: Some(config),
            http,
        })
    }

    /// Whether this client fabricates responses.
    pub fn is_mock(&self) -> bool {
        self.servicenow.is_none()
    }

    /// Create an incident and return its record.
    pub async fn create(&self, request: TicketRequest) -> Result<TicketRecord> {
        match &self.servicenow {
            None => {
                let number = mock_ticket_number();
                info!("mock mode, generated ticket {}", number);
                Ok(TicketRecord {
                    number,
                    sys_id: None,
                    state: "New".into(),
                    short_description: request.short_description,
                    opened_at: Some(Utc::now()),
                })
            }
            Some(config) => self.create_remote(config, request).await,
        }
    }

    /// Verify that an incident exists.
    ///
    /// An empty number is invalid input; a number not matching the
    /// `INC<digits>` format is a negative result. In mock mode any
    /// well-formed number verifies.
    pub async fn verify(&self, ticket_number: &str) -> Result<TicketVerification> {
        let ticket_number = ticket_number.trim();
        if ticket_number.is_empty() {
            return Err(Error::InvalidParams("empty ticket number".into()));
        }
        if !is_plausible_number(ticket_number) {
            warn!(
                "invalid ticket format, expected INC<digits>, got {}",
                ticket_number
            );
            return Ok(TicketVerification {
                exists: false,
                record: None,
            });
        }

        match &self.servicenow {
            None => {
                info!("mock mode, verifying ticket {}", ticket_number);
                Ok(TicketVerification {
                    exists: true,
                    record: Some(TicketRecord {
                        number: ticket_number.into(),
                        sys_id: None,
                        state: "New".into(),
                        short_description: "Access request incident".into(),
                        opened_at: None,
                    }),
                })
            }
            Some(config) => self.verify_remote(config, ticket_number).await,
        }
    }

    async fn create_remote(
        &self,
        config: &ServiceNowConfig,
        request: TicketRequest,
    ) -> Result<TicketRecord> {
        info!(
            "creating incident, short_description={}",
            request.short_description
        );

        let body = json!({
            "short_description": request.short_description,
            "description": request.description,
            "urgency": request.urgency,
            "impact": request.impact,
            "category": request.category,
            "caller_id": config.caller_id,
        });

        let response = self
            .http
            .post(incident_url(config))
            .query(&[
                ("sysparm_fields", "number,sys_id,short_description,state"),
                ("sysparm_display_value", "true"),
            ])
            .basic_auth(&config.username, Some(&config.password))
            .json(&body)
            .timeout(REMOTE_TIMEOUT)
            .send()
            .await?;

        match response.status().as_u16() {
            201 => {
                let payload: Value = response.json().await?;
                let incident = payload.get("result").ok_or_else(|| {
                    Error::Upstream("unexpected response format from servicenow".into())
                })?;
                let record = record_from_value(incident);
                info!(
                    "created incident {} (sys_id={})",
                    record.number,
                    record.sys_id.as_deref().unwrap_or("unknown")
                );
                Ok(record)
            }
            401 => Err(Error::Upstream(
                "authentication failed, check servicenow credentials".into(),
            )),
            status => Err(Error::Upstream(format!(
                "failed to create incident, status {}",
                status
            ))),
        }
    }

    async fn verify_remote(
        &self,
        config: &ServiceNowConfig,
        ticket_number: &str,
    ) -> Result<TicketVerification> {
        let query = format!("number={}", ticket_number);
        let response = self
            .http
            .get(incident_url(config))
            .query(&[
                ("sysparm_query", query.as_str()),
                ("sysparm_limit", "1"),
                ("sysparm_display_value", "true"),
                (
                    "sysparm_fields",
                    "number,sys_id,short_description,state,urgency,impact,opened_at,caller_id",
                ),
            ])
            .basic_auth(&config.username, Some(&config.password))
            .timeout(REMOTE_TIMEOUT)
            .send()
            .await?;

        if response.status().as_u16() == 401 {
            return Err(Error::Upstream(
                "authentication failed, check servicenow credentials".into(),
            ));
        }
        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "failed to verify incident, status {}",
                response.status().as_u16()
            )));
        }

        let payload: Value = response.json().await?;
        let results = payload
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Upstream("unexpected response format from servicenow".into()))?;

        match results.first() {
            Some(incident) => {
                let record = record_from_value(incident);
                info!("incident {} found, state {}", record.number, record.state);
                Ok(TicketVerification {
                    exists: true,
                    record: Some(record),
                })
            }
            None => {
                info!("incident {} not found", ticket_number);
                Ok(TicketVerification {
                    exists: false,
                    record: None,
                })
            }
        }
    }
}

fn incident_url(config: &ServiceNowConfig) -> String {
    format!(
        "{}/api/now/table/incident",
        config.instance.trim_end_matches('/')
    )
}

fn record_from_value(incident: &Value) -> TicketRecord {
    let field = |name: &str| {
        incident
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    TicketRecord {
        number: field("number"),
        sys_id: incident
            .get("sys_id")
            .and_then(Value::as_str)
            .map(String::from),
        state: field("state"),
        short_description: field("short_description"),
        opened_at: None,
    }
}

/// Generate a mock incident number: `INC` plus seven decimal digits.
fn mock_ticket_number() -> String {
    format!("INC{:07}", Uuid::new_v4().as_u128() % 10_000_000)
}

/// `INC` followed by at least one decimal digit.
fn is_plausible_number(number: &str) -> bool {
    number
        .strip_prefix("INC")
        .map_or(false, |rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn snow_config(instance: String) -> ServiceNowConfig {
        ServiceNowConfig {
            instance,
            username: "svc-portal".into(),
            password: "hunter2".into(),
            caller_id: "abc123".into(),
        }
    }

    #[test]
    fn test_mock_number_format() {
        let number = mock_ticket_number();
        assert!(number.starts_with("INC"));
        assert_eq!(number.len(), 10);
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_mock_create_returns_distinct_numbers() {
        let client = TicketClient::mock();
        let first = client.create(TicketRequest::default()).await.unwrap();
        let second = client.create(TicketRequest::default()).await.unwrap();
        assert_ne!(first.number, second.number);
        assert_eq!(first.state, "New");
    }

    #[tokio::test]
    async fn test_mock_verify_accepts_plausible_number() {
        let client = TicketClient::mock();
        let verification = client.verify("INC0010374").await.unwrap();
        assert!(verification.exists);
        assert_eq!(verification.record.unwrap().number, "INC0010374");
    }

    #[tokio::test]
    async fn test_mock_verify_rejects_malformed_number() {
        let client = TicketClient::mock();
        assert!(!client.verify("TICKET-42").await.unwrap().exists);
        assert!(!client.verify("INCx123").await.unwrap().exists);
    }

    #[tokio::test]
    async fn test_verify_empty_number_is_invalid() {
        let client = TicketClient::mock();
        assert!(matches!(
            client.verify("  ").await,
            Err(Error::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_create_parses_result() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/now/table/incident")
            .match_query(Matcher::Any)
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "result": {
                        "number": "INC0010374",
                        "sys_id": "deadbeef",
                        "short_description": "Dataiku PROD access",
                        "state": "New"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = TicketClient::servicenow(snow_config(server.url())).unwrap();
        let record = client.create(TicketRequest::default()).await.unwrap();
        assert_eq!(record.number, "INC0010374");
        assert_eq!(record.sys_id.as_deref(), Some("deadbeef"));
    }

    #[tokio::test]
    async fn test_remote_create_unauthorized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/now/table/incident")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let client = TicketClient::servicenow(snow_config(server.url())).unwrap();
        assert!(matches!(
            client.create(TicketRequest::default()).await,
            Err(Error::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_verify_not_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/now/table/incident")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"result": []}"#)
            .create_async()
            .await;

        let client = TicketClient::servicenow(snow_config(server.url())).unwrap();
        let verification = client.verify("INC0000001").await.unwrap();
        assert!(!verification.exists);
        assert!(verification.record.is_none());
    }

    #[tokio::test]
    async fn test_remote_verify_found() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/now/table/incident")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "result": [{
                        "number": "INC0010374",
                        "sys_id": "deadbeef",
                        "short_description": "Dataiku PROD access",
                        "state": "In Progress"
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = TicketClient::servicenow(snow_config(server.url())).unwrap();
        let verification = client.verify("INC0010374").await.unwrap();
        assert!(verification.exists);
        assert_eq!(verification.record.unwrap().state, "In Progress");
    }
}
