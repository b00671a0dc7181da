//! Poll-until engine
//!
//! Turns an asynchronously progressing condition into a single decision within a
//! bounded time budget. The check is re-evaluated at a fixed cadence until it
//! reports success, the budget runs out, or the owning run is cancelled.
//!
//! A check that returns an error stops the poll at once: a missing precondition
//! will not appear by waiting for it.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Level, event};

use crate::domain::{constant::poll, error::IssuanceError};

/// Shortest wait between two checks
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Time budget and cadence of a poll
///
/// A timeout too large to be added to the current instant means no deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub timeout:  Duration,
    pub interval: Duration
}

impl PollOptions {
    /// Intervals below [`MIN_INTERVAL`] are raised to it
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval: interval.max(MIN_INTERVAL) }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), interval: Duration::from_millis(500) }
    }
}

/// Poll `check` until it yields a value
///
/// The first successful check returns immediately. Once the elapsed time reaches
/// `options.timeout` the poll fails with [`IssuanceError::Timeout`] carrying
/// `failure_message`; the last wait is shortened so the failure is reported less
/// than one interval after the deadline.
pub async fn poll_for<T, F>(
    mut check: F,
    options: PollOptions,
    failure_message: &str,
    cancel: &CancellationToken
) -> Result<T, IssuanceError>
where
    F: FnMut() -> Result<Option<T>, IssuanceError>
{
    let started = Instant::now();
    let deadline = started.checked_add(options.timeout);
    let interval = options.interval.max(MIN_INTERVAL);
    let mut attempts: u32 = 0;

    event!(Level::TRACE, event = poll::STARTED, timeout_ms = options.timeout.as_millis() as u64,
           interval_ms = options.interval.as_millis() as u64);

    loop {
        attempts += 1;

        match check() {
            Ok(Some(found)) => {
                event!(Level::DEBUG, event = poll::SATISFIED, attempts = attempts,
                       elapsed_ms = started.elapsed().as_millis() as u64);
                return Ok(found);
            }
            Ok(None) => {}
            Err(e) => {
                event!(Level::DEBUG, event = poll::CHECK_FAILED, attempts = attempts, error = %e);
                return Err(e);
            }
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    event!(Level::WARN, event = poll::TIMED_OUT, attempts = attempts,
                           elapsed_ms = started.elapsed().as_millis() as u64, message = %failure_message);
                    return Err(IssuanceError::Timeout(failure_message.to_string()));
                }
                interval.min(deadline - now)
            }
            None => interval
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                event!(Level::DEBUG, event = poll::CANCELLED, attempts = attempts);
                return Err(IssuanceError::Cancelled(format!("poll cancelled: {}", failure_message)));
            }
            () = tokio::time::sleep(pause) => {}
        }
    }
}

/// Poll `predicate` until it holds
pub async fn poll_until<F>(
    mut predicate: F,
    options: PollOptions,
    failure_message: &str,
    cancel: &CancellationToken
) -> Result<(), IssuanceError>
where
    F: FnMut() -> Result<bool, IssuanceError>
{
    poll_for(|| predicate().map(|holds| holds.then_some(())), options, failure_message, cancel).await
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering}
    };

    use super::*;

    fn options() -> PollOptions {
        PollOptions::new(Duration::from_secs(5), Duration::from_millis(200))
    }

    #[tokio::test(start_paused = true)]
    async fn test_true_predicate_returns_without_waiting() {
        let started = Instant::now();
        let mut calls = 0;

        poll_until(
            || {
                calls += 1;
                Ok(true)
            },
            options(),
            "never shown",
            &CancellationToken::new()
        )
        .await
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_true_times_out_within_one_interval_of_deadline() {
        let started = Instant::now();
        let options = options();

        let err = poll_until(|| Ok(false), options, "Holder bob: OFFER_RECEIVED not reached", &CancellationToken::new())
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert_eq!(err, IssuanceError::Timeout("Holder bob: OFFER_RECEIVED not reached".to_string()));
        assert!(elapsed >= options.timeout);
        assert!(elapsed < options.timeout + options.interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uneven_interval_still_stops_before_next_interval() {
        let options = PollOptions::new(Duration::from_millis(1_050), Duration::from_millis(300));
        let started = Instant::now();

        let err = poll_until(|| Ok(false), options, "late", &CancellationToken::new()).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() >= options.timeout);
        assert!(started.elapsed() < options.timeout + options.interval);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_interval_until_true() {
        let started = Instant::now();
        let mut calls = 0;

        let value = poll_for(
            || {
                calls += 1;
                Ok((calls == 4).then_some("ready"))
            },
            options(),
            "not ready",
            &CancellationToken::new()
        )
        .await
        .unwrap();

        assert_eq!(value, "ready");
        assert_eq!(calls, 4);
        assert!(started.elapsed() >= Duration::from_millis(600));
        assert!(started.elapsed() < Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_propagates_immediately() {
        let mut calls = 0;

        let err = poll_until(
            || {
                calls += 1;
                Err(IssuanceError::precondition("bob", "thid"))
            },
            options(),
            "unused",
            &CancellationToken::new()
        )
        .await
        .unwrap_err();

        assert!(err.is_precondition());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_the_poll() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = poll_until(|| Ok(false), options(), "aborted", &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < options().timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_polls_are_independent() {
        let flag = Arc::new(AtomicBool::new(false));
        let checks = Arc::new(AtomicU32::new(0));
        let setter = flag.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            setter.store(true, Ordering::SeqCst);
        });

        let cancel = CancellationToken::new();
        let waiting = {
            let flag = flag.clone();
            let checks = checks.clone();
            let cancel = cancel.clone();
            async move {
                poll_until(
                    move || {
                        checks.fetch_add(1, Ordering::SeqCst);
                        Ok(flag.load(Ordering::SeqCst))
                    },
                    options(),
                    "flag",
                    &cancel
                )
                .await
            }
        };
        let short = PollOptions::new(Duration::from_secs(1), Duration::from_millis(100));
        let failing = async { poll_until(|| Ok(false), short, "never", &cancel).await };

        let (waited, failed) = tokio::join!(waiting, failing);

        assert!(waited.is_ok());
        assert!(failed.unwrap_err().is_timeout());
        assert!(checks.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_has_no_deadline() {
        let forever = PollOptions::new(Duration::MAX, Duration::from_millis(10));

        poll_until(|| Ok(true), forever, "ready", &CancellationToken::new()).await.unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = poll_until(|| Ok(false), forever, "waiting", &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        assert_eq!(PollOptions::new(Duration::from_secs(1), Duration::ZERO).interval, MIN_INTERVAL);

        // Options built directly still wait between checks
        let options = PollOptions { timeout: Duration::from_secs(1), interval: Duration::ZERO };
        let started = Instant::now();
        let mut calls = 0;

        poll_until(
            || {
                calls += 1;
                Ok(calls == 5)
            },
            options,
            "spinning",
            &CancellationToken::new()
        )
        .await
        .unwrap();

        assert_eq!(calls, 5);
        assert!(started.elapsed() >= MIN_INTERVAL * 4);
    }
}
