//! Transport-level readiness detection
//!
//! Readiness here only means the listening socket accepts a TCP connection.
//! Whether the server is ready to speak the protocol is the session's
//! concern (see the connect retries in `session`).

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;

use crate::common::config::ReadinessConfig;

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Condition met, stop polling
    Ready,
    /// Not yet, try again after the interval
    Pending,
    /// Condition can never be met, stop polling
    Abort,
}

/// Poll `probe` every `interval` until it reports ready or `timeout` elapses
///
/// Returns true only if a probe reported [`Probe::Ready`]. Never errors.
pub async fn poll_until<F, Fut>(interval: Duration, timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match probe().await {
            Probe::Ready => return true,
            Probe::Abort => return false,
            Probe::Pending => {}
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Attempt one TCP connection to `addr`
///
/// The attempt itself is bounded by `limit` so a black-holed address cannot
/// stall the poll loop.
pub async fn probe_connect(addr: &str, limit: Duration) -> Probe {
    match tokio::time::timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Probe::Ready,
        Ok(Err(e)) => {
            tracing::trace!(addr, error = %e, "Readiness probe refused");
            Probe::Pending
        }
        Err(_) => Probe::Pending,
    }
}

/// Wait until `addr` accepts TCP connections
///
/// `exited` is checked before every attempt; once it reports true the wait
/// gives up without waiting out the timeout.
pub async fn wait_for_ready<F>(addr: &str, config: &ReadinessConfig, mut exited: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    let interval = config.poll_interval();
    let exited = &mut exited;

    let ready = poll_until(interval, config.timeout(), move || {
        let gone = exited();
        async move {
            if gone {
                Probe::Abort
            } else {
                probe_connect(addr, interval).await
            }
        }
    })
    .await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    if ready {
        tracing::debug!(addr, elapsed_ms, "Server is accepting connections");
    } else {
        tracing::debug!(addr, elapsed_ms, "Readiness poll gave up");
    }
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_poll_ready_after_some_attempts() {
        let calls = Cell::new(0);
        let ready = poll_until(Duration::from_millis(10), Duration::from_secs(2), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n >= 3 {
                    Probe::Ready
                } else {
                    Probe::Pending
                }
            }
        })
        .await;

        assert!(ready);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let started = Instant::now();
        let ready = poll_until(Duration::from_millis(20), Duration::from_millis(100), || async {
            Probe::Pending
        })
        .await;

        assert!(!ready);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_poll_abort_stops_immediately() {
        let calls = Cell::new(0);
        let ready = poll_until(Duration::from_millis(10), Duration::from_secs(5), || {
            calls.set(calls.get() + 1);
            async { Probe::Abort }
        })
        .await;

        assert!(!ready);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_ready_with_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let config = ReadinessConfig {
            poll_interval_ms: 50,
            timeout_secs: 2,
        };
        assert!(wait_for_ready(&addr, &config, || false).await);
    }

    #[tokio::test]
    async fn test_wait_for_ready_without_listener() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ReadinessConfig {
            poll_interval_ms: 50,
            timeout_secs: 1,
        };
        assert!(!wait_for_ready(&format!("127.0.0.1:{}", port), &config, || false).await);
    }

    #[tokio::test]
    async fn test_wait_for_ready_stops_when_exited() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ReadinessConfig {
            poll_interval_ms: 50,
            timeout_secs: 10,
        };

        let checks = Cell::new(0);
        let started = Instant::now();
        let ready = wait_for_ready(&format!("127.0.0.1:{}", port), &config, || {
            checks.set(checks.get() + 1);
            checks.get() >= 3
        })
        .await;

        assert!(!ready);
        assert_eq!(checks.get(), 3);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
