//! Provider-level settings used to build the API client.

use std::time::Duration;

use crate::error::{ApiError, Result};

const API_PREFIX: &str = "/api/2.0";

/// Upper bound on a single HTTP request, connect through body.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Endpoint and credential for one Databricks workspace.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Workspace URL, e.g. `https://dbc-1234.cloud.databricks.com`.
    pub host: String,
    /// Personal access token sent as a bearer credential.
    pub token: String,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: token.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base path all API calls are issued against.
    pub fn base_path(&self) -> Result<String> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(ApiError::InvalidConfig("host is required".to_string()));
        }
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(ApiError::InvalidConfig(format!(
                "host must start with http:// or https://: {}",
                host
            )));
        }
        Ok(format!("{}{}", host, API_PREFIX))
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(ApiError::InvalidConfig("token is required".to_string()));
        }
        self.base_path().map(|_| ())
    }
}

// Keep the token out of debug output.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
