//! Gateway configuration.

use postmind_core::{Error, Result};

/// Upstream service URLs and shared secrets.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub auth_url: String,
    pub core_url: String,
    pub collector_url: String,
    pub analyzer_url: String,
    pub internal_token: String,
    pub server_port: u16,
}

impl GatewayConfig {
    /// Load from environment variables.
    ///
    /// | Variable | Required | Default |
    /// |----------|----------|---------|
    /// | `INTERNAL_API_TOKEN` | **yes** | -- |
    /// | `AUTH_SERVICE_URL` | no | `http://localhost:8081` |
    /// | `CORE_SERVICE_URL` | no | `http://localhost:8082` |
    /// | `ANALYZER_SERVICE_URL` | no | `http://localhost:8083` |
    /// | `COLLECTOR_SERVICE_URL` | no | `http://localhost:8084` |
    /// | `SERVER_PORT` | no | `8080` |
    pub fn from_env() -> Result<Self> {
        let internal_token = std::env::var("INTERNAL_API_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("INTERNAL_API_TOKEN must be set".into()))?;

        let url = |var: &str, default: &str| {
            std::env::var(var)
                .unwrap_or_else(|_| default.to_string())
                .trim_end_matches('/')
                .to_string()
        };

        Ok(Self {
            auth_url: url("AUTH_SERVICE_URL", "http://localhost:8081"),
            core_url: url("CORE_SERVICE_URL", "http://localhost:8082"),
            analyzer_url: url("ANALYZER_SERVICE_URL", "http://localhost:8083"),
            collector_url: url("COLLECTOR_SERVICE_URL", "http://localhost:8084"),
            internal_token,
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(8080),
        })
    }
}
