//! Convergence polling: wait for observed state to match a desired state.
//!
//! A check is evaluated at a fixed interval until it reports convergence,
//! the timeout elapses, or the caller cancels. Waiting suspends on a tokio
//! timer; nothing but the check closure (and the ids it captures) is held
//! between polls.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// How a convergence wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The check observed the desired state before the deadline.
    Converged,
    /// The deadline passed first.
    TimedOut,
    /// The caller asked to stop.
    Cancelled,
}

/// Caller-side abort for a convergence wait.
///
/// Wraps the receiving half of a `watch` channel; sending `true` on the
/// sender cancels every wait holding a clone of this signal. A signal whose
/// sender is dropped can no longer fire.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// A new signal plus the sender used to fire it.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self { rx: Some(rx) })
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the signal fires. Pends forever if it never can.
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
            if !closed {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

/// Poll `check` every `interval` until it returns `Ok(true)`, `timeout`
/// elapses, or `cancel` fires.
///
/// The check only counts if it runs before the deadline, so a zero timeout
/// never converges. A timeout too large to represent as an instant means no
/// deadline at all. Check errors end the wait and are returned as-is.
pub async fn poll_until<F, Fut, E>(
    interval: Duration,
    timeout: Duration,
    cancel: &mut CancelSignal,
    mut check: F,
) -> Result<PollOutcome, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let deadline = Instant::now().checked_add(timeout);

    loop {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Ok(PollOutcome::TimedOut);
        }
        if check().await? {
            return Ok(PollOutcome::Converged);
        }

        let nap = deadline.map_or(interval, |d| {
            interval.min(d.saturating_duration_since(Instant::now()))
        });
        tokio::select! {
            _ = tokio::time::sleep(nap) => {}
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
        }
    }
}
