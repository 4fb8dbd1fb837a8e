//! Local port probing and cancellable condition polling

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-attempt connect timeout for [`is_port_in_use`]
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Bounded waits never give up sooner than this
const MIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Smallest sleep between two checks
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a [`wait_for_condition`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held
    Satisfied,
    /// The time budget ran out first
    TimedOut,
    /// The cancellation token fired first
    Cancelled,
}

impl WaitOutcome {
    /// Whether the condition held
    pub fn is_satisfied(self) -> bool {
        self == WaitOutcome::Satisfied
    }
}

/// Check whether something accepts TCP connections on `localhost:port`.
///
/// Any error, including the per-attempt timeout, counts as "not in use".
pub async fn is_port_in_use(port: u16) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(("localhost", port))).await,
        Ok(Ok(_))
    )
}

/// Poll `condition` until it holds, the timeout elapses, or `cancel` fires.
///
/// The sleep between checks starts at `interval` and shrinks as the
/// deadline approaches, never exceeding the remaining budget. A `None`
/// timeout waits indefinitely.
pub async fn wait_for_condition<F, Fut>(
    mut condition: F,
    interval: Duration,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let timeout = timeout.map(|t| t.max(MIN_TIMEOUT));
    let mut checks: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return WaitOutcome::Cancelled;
        }
        if condition().await {
            return WaitOutcome::Satisfied;
        }

        checks = checks.saturating_add(1);
        let elapsed = start.elapsed();

        let next = match timeout {
            Some(limit) => {
                if elapsed >= limit {
                    return WaitOutcome::TimedOut;
                }
                let remaining = limit - elapsed;
                interval
                    .min(remaining / checks.saturating_add(1))
                    .max(MIN_POLL_INTERVAL)
                    .min(remaining)
            }
            None => interval.max(MIN_POLL_INTERVAL),
        };

        tokio::select! {
            _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            _ = tokio::time::sleep(next) => {}
        }
    }
}

/// Block until `localhost:port` accepts connections or `cancel` fires
pub async fn wait_for_port(
    port: u16,
    interval: Duration,
    cancel: &CancellationToken,
) -> WaitOutcome {
    tracing::debug!("Waiting for local port {}", port);
    wait_for_condition(|| is_port_in_use(port), interval, None, cancel).await
}
