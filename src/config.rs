//! Runtime configuration for the portal server.
//!
//! ServiceNow credentials and the incident dispatch endpoint come from the
//! environment, matching the deployment the portal runs in:
//! `SNOW_INSTANCE`, `SNOW_USERNAME`, `SNOW_PASSWORD`, `SNOW_CALLER_ID` and
//! `INCIDENT_DEBUG_API_URL`. Ticket mock mode is an explicit setting; it is
//! forced on when credentials are incomplete.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default timeout for the incident dispatch call.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Directory holding the knowledge tables.
    pub knowdocs_dir: PathBuf,
    /// Whether ticket tools run in mock mode.
    pub mock_tickets: bool,
    /// ServiceNow connection settings, when configured.
    pub servicenow: Option<ServiceNowConfig>,
    /// External incident debugging endpoint, when configured.
    pub incident_debug_url: Option<String>,
    /// Timeout for the incident dispatch call.
    pub dispatch_timeout: Duration,
}

impl PortalConfig {
    /// Build the configuration from the environment.
    ///
    /// `force_mock` turns ticket mock mode on regardless of credentials;
    /// otherwise mock mode is on exactly when ServiceNow credentials are
    /// incomplete.
    pub fn from_env(knowdocs_dir: PathBuf, force_mock: bool) -> Self {
        let servicenow = ServiceNowConfig::from_env();
        let mock_tickets = force_mock || servicenow.is_none();
        if mock_tickets && !force_mock {
            warn!("ServiceNow credentials not configured, ticket tools run in mock mode");
        }

        let incident_debug_url = env_var("INCIDENT_DEBUG_API_URL");
        if incident_debug_url.is_none() {
            warn!("INCIDENT_DEBUG_API_URL not configured, incident dispatch will use fallback responses");
        }

        Self {
            knowdocs_dir,
            mock_tickets,
            servicenow,
            incident_debug_url,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
        }
    }
}

/// ServiceNow connection settings.
#[derive(Debug, Clone)]
pub struct ServiceNowConfig {
    /// Instance base URL, e.g. `https://example.service-now.com`.
    pub instance: String,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Caller sys_id stamped onto created incidents.
    pub caller_id: String,
}

impl ServiceNowConfig {
    /// Read the full credential set from the environment. Returns `None`
    /// unless every variable is present and non-empty.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            instance: env_var("SNOW_INSTANCE")?,
            username: env_var("SNOW_USERNAME")?,
            password: env_var("SNOW_PASSWORD")?,
            caller_id: env_var("SNOW_CALLER_ID")?,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
