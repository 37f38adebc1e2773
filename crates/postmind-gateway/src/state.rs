//! Shared gateway state.

use std::time::Duration;

use crate::config::GatewayConfig;

/// Config plus the outbound HTTP client, cloned into every handler.
#[derive(Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub client: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }
}
