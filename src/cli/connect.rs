//! Connecting to a daemon that may still be starting
//!
//! The client never retries by itself; this loop is the caller-side policy:
//! a fixed delay between attempts and a bounded number of attempts.

use std::time::Duration;

use crate::common::{Error, Result};
use crate::ipc::Client;

/// Reconnect and probe with `version` until the daemon answers
///
/// Refused or closed connections are retried after `delay`; anything else is
/// returned immediately. Returns the daemon's protocol version. After
/// `attempts` failures the error is `CouldNotConnect`, carrying the last
/// transport error.
pub async fn connect_with_retry(
    client: &mut Client,
    attempts: u32,
    delay: Duration,
) -> Result<u32> {
    let attempts = attempts.max(1);
    let mut last = Error::ConnectionClosed;

    for attempt in 1..=attempts {
        let probe = match client.reset_conn().await {
            Ok(()) => client.version().await,
            Err(e) => Err(e),
        };

        match probe {
            Ok(version) => {
                tracing::debug!(attempt, "Connected to daemon");
                return Ok(version);
            }
            Err(e) if e.is_retryable() => {
                tracing::trace!(attempt, "Daemon not reachable yet: {}", e);
                last = e;
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    client.close();
    Err(Error::CouldNotConnect {
        path: client.sock_path().to_path_buf(),
        attempts,
        last: Box::new(last),
    })
}
