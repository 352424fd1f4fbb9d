//! Client execution logic with reconnection support.

use std::time::Duration;

use tokio::sync::mpsc;

use super::{error::ClientError, session::run_client_session, ui::spawn_line_reader};

const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_INTERVAL_SECS: u64 = 5;

/// How often and how fast the client retries a lost connection
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    /// Consecutive failed connection attempts before giving up
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            interval: Duration::from_secs(RECONNECT_INTERVAL_SECS),
        }
    }
}

/// Run the client against `url`, reading messages from the terminal
pub async fn run_client(url: String) -> Result<(), ClientError> {
    let input = spawn_line_reader();
    run_with_policy(&url, ReconnectPolicy::default(), input).await
}

/// Run sessions until the user leaves or the policy gives up.
///
/// A connection that was established and later lost resets the failure
/// count; only consecutive failed handshakes count towards the limit.
pub async fn run_with_policy(
    url: &str,
    policy: ReconnectPolicy,
    mut input: mpsc::UnboundedReceiver<String>,
) -> Result<(), ClientError> {
    let mut failures = 0;

    loop {
        tracing::info!(
            "Attempting to connect to {} (attempt {}/{})",
            url,
            failures + 1,
            policy.max_attempts
        );

        match run_client_session(url, &mut input).await {
            Ok(()) => {
                tracing::info!("Client session ended normally");
                return Ok(());
            }
            Err(ClientError::Disconnected(reason)) => {
                tracing::warn!("Connection lost: {}", reason);
                failures = 0;
            }
            Err(e) => {
                tracing::warn!("{}", e);
                failures += 1;
                if failures >= policy.max_attempts {
                    return Err(ClientError::ReconnectFailed { attempts: failures });
                }
            }
        }

        tracing::info!("Reconnecting in {:?}...", policy.interval);
        tokio::time::sleep(policy.interval).await;
    }
}
