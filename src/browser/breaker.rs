// Circuit breaker around browser launches.
//
// After FAILURE_THRESHOLD consecutive launch failures the breaker opens and
// every request fails fast for RECOVERY_TIMEOUT. The first request after that
// window is let through as a probe; its result closes or re-opens the breaker.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::BrowserError;

const FAILURE_THRESHOLD: u32 = 3;
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct LaunchBreaker {
    inner: Mutex<Inner>,
    recovery: Duration,
}

impl Default for LaunchBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl LaunchBreaker {
    pub fn new() -> Self {
        Self::with_recovery(RECOVERY_TIMEOUT)
    }

    pub fn with_recovery(recovery: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            recovery,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn check(&self) -> Result<(), BrowserError> {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open { since } => {
                let elapsed = since.elapsed();
                if elapsed >= self.recovery {
                    inner.state = BreakerState::HalfOpen;
                    tracing::info!("browser breaker: OPEN -> HALF_OPEN (probing launch)");
                    Ok(())
                } else {
                    let remaining = self.recovery.saturating_sub(elapsed).as_secs();
                    Err(BrowserError::Unavailable(format!(
                        "browser failed to launch {} times in a row, retry in ~{}s",
                        inner.consecutive_failures, remaining
                    )))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != BreakerState::Closed {
            tracing::info!("browser breaker: closed after successful launch");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        let trip = inner.state == BreakerState::HalfOpen
            || inner.consecutive_failures >= FAILURE_THRESHOLD;
        if trip && !matches!(inner.state, BreakerState::Open { .. }) {
            tracing::warn!(
                "browser breaker: TRIPPED after {} consecutive launch failures, failing fast for {}s",
                inner.consecutive_failures,
                self.recovery.as_secs()
            );
            inner.state = BreakerState::Open {
                since: Instant::now(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_after_threshold_and_recovers() {
        let breaker = LaunchBreaker::with_recovery(Duration::ZERO);
        for _ in 0..FAILURE_THRESHOLD - 1 {
            breaker.record_failure();
            assert!(breaker.check().is_ok());
        }
        breaker.record_failure();
        // Zero recovery window: the next check is the half-open probe.
        assert!(breaker.check().is_ok());
        breaker.record_success();
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn open_breaker_fails_fast() {
        let breaker = LaunchBreaker::with_recovery(Duration::from_secs(600));
        for _ in 0..FAILURE_THRESHOLD {
            breaker.record_failure();
        }
        assert!(matches!(breaker.check(), Err(BrowserError::Unavailable(_))));
    }

    #[test]
    fn failed_probe_reopens() {
        let breaker = LaunchBreaker::with_recovery(Duration::ZERO);
        for _ in 0..FAILURE_THRESHOLD {
            breaker.record_failure();
        }
        assert!(breaker.check().is_ok());
        breaker.record_failure();
        assert!(matches!(breaker.lock().state, BreakerState::Open { .. }));
    }
}
