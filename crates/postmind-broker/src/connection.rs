//! Broker connection with bounded exponential backoff.

use std::time::{Duration, Instant};

use lapin::{Connection, ConnectionProperties};
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};

/// Connect attempts before giving up.
const CONNECT_MAX_RETRIES: u32 = 5;

/// First retry delay.
const CONNECT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Overall budget across all attempts.
const CONNECT_MAX_ELAPSED: Duration = Duration::from_secs(10);

/// Connect to the broker, retrying with exponential backoff.
///
/// Gives up after [`CONNECT_MAX_RETRIES`] attempts or once
/// [`CONNECT_MAX_ELAPSED`] has passed, whichever comes first.
pub async fn connect(config: &BrokerConfig) -> BrokerResult<Connection> {
    let started = Instant::now();
    let mut delay = CONNECT_INITIAL_DELAY;
    let mut last_err = BrokerError::Connect("no attempts made".into());

    for attempt in 1..=CONNECT_MAX_RETRIES {
        match Connection::connect(&config.url, ConnectionProperties::default()).await {
            Ok(conn) => {
                info!(
                    subsystem = "broker",
                    component = "connection",
                    attempt,
                    "Connected to message broker"
                );
                return Ok(conn);
            }
            Err(e) => {
                warn!(
                    subsystem = "broker",
                    component = "connection",
                    attempt,
                    error = %e,
                    "Broker connection attempt failed"
                );
                last_err = e.into();
            }
        }

        if attempt < CONNECT_MAX_RETRIES && started.elapsed() + delay < CONNECT_MAX_ELAPSED {
            tokio::time::sleep(delay).await;
            delay *= 2;
        } else {
            break;
        }
    }

    Err(last_err)
}
