/*!
 * Readiness
 *
 * Supervised servers give no ready signal of their own. The default strategy
 * is a fixed head start, which is only a guess: a slow server may still be
 * binding its port when the UI connects. The TCP probe replaces the guess with
 * an actual connection attempt, bounded by a timeout.
 */

use crate::core::limits::READINESS_PROBE_INTERVAL;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// How readiness was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// A connection to the server succeeded
    Confirmed,
    /// Readiness was presumed after a delay or a probe timeout
    Assumed,
}

/// Fixed head start; always `Assumed`
pub async fn head_start(delay: Duration) -> Readiness {
    tokio::time::sleep(delay).await;
    debug!(delay_ms = delay.as_millis() as u64, "Startup head start elapsed");
    Readiness::Assumed
}

/// Try to connect to `addr` until it accepts or `timeout` elapses
pub async fn probe_tcp(addr: SocketAddr, timeout: Duration) -> Readiness {
    let attempts = async {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match TcpStream::connect(addr).await {
                Ok(_) => return attempt,
                Err(e) => {
                    debug!(%addr, attempt, error = %e, "Server not accepting yet");
                    tokio::time::sleep(READINESS_PROBE_INTERVAL).await;
                }
            }
        }
    };

    match tokio::time::timeout(timeout, attempts).await {
        Ok(attempt) => {
            info!(%addr, attempt, "Server accepted readiness probe");
            Readiness::Confirmed
        }
        Err(_) => {
            warn!(
                %addr,
                timeout_ms = timeout.as_millis() as u64,
                "Readiness probe timed out, continuing anyway"
            );
            Readiness::Assumed
        }
    }
}
