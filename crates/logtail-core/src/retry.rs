// ── Reconnect backoff ──
//
// `RetryPolicy` decides how long to wait before each reconnect attempt.
// `RetryScheduler` is the seam that turns a delay into a later
// `handle_retry_due` call: `TokioRetryScheduler` in production, a
// recording fake in tests.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default cap on consecutive reconnect attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff step; attempt `n` waits `n * step`.
pub const DEFAULT_RETRY_STEP: Duration = Duration::from_millis(5_000);

/// Linear reconnect backoff with a hard attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            step: DEFAULT_RETRY_STEP,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (1-based): 5s, 10s, 15s with the defaults.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }

    /// Whether another attempt may follow `attempts_so_far` failed ones.
    pub fn allows(&self, attempts_so_far: u32) -> bool {
        attempts_so_far < self.max_retries
    }
}

// ── Tickets ──────────────────────────────────────────────────────────

/// Identifies one scheduled retry. A due notice is honoured only if its
/// ticket still matches the manager's pending retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryTicket(u64);

impl RetryTicket {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RetryTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry-{}", self.0)
    }
}

/// A retry that has been handed to a scheduler and not yet fired.
#[derive(Debug)]
pub struct ScheduledRetry {
    pub ticket: RetryTicket,
    pub attempt: u32,
    pub delay: Duration,
    cancel: CancellationToken,
}

impl ScheduledRetry {
    pub fn new(
        ticket: RetryTicket,
        attempt: u32,
        delay: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ticket,
            attempt,
            delay,
            cancel,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ── Scheduler seam ───────────────────────────────────────────────────

/// Arranges for a retry ticket to come back after a delay.
///
/// The returned token cancels the pending wake-up; a scheduler must not
/// deliver a ticket whose token has been cancelled.
pub trait RetryScheduler {
    fn schedule(&mut self, ticket: RetryTicket, delay: Duration) -> CancellationToken;
}

/// Schedules retries as sleeping tokio tasks that post the ticket back on
/// a channel when the delay elapses.
#[derive(Debug, Clone)]
pub struct TokioRetryScheduler {
    due: mpsc::UnboundedSender<RetryTicket>,
}

impl TokioRetryScheduler {
    pub fn new(due: mpsc::UnboundedSender<RetryTicket>) -> Self {
        Self { due }
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&mut self, ticket: RetryTicket, delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let due = self.due.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(%ticket, "retry timer cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    if due.send(ticket).is_err() {
                        tracing::debug!(%ticket, "retry fired after the client stopped");
                    }
                }
            }
        });

        cancel
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_is_linear() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..=3).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![5_000, 10_000, 15_000]);
    }

    #[test]
    fn cap_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.allows(0));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_scheduler_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioRetryScheduler::new(tx);

        let _token = scheduler.schedule(RetryTicket::new(1), Duration::from_secs(5));

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await.unwrap(), RetryTicket::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioRetryScheduler::new(tx);

        let token = scheduler.schedule(RetryTicket::new(7), Duration::from_secs(5));
        token.cancel();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(rx.try_recv().is_err());
    }
}
