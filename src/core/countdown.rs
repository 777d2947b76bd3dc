//! # Pausable per-attempt timeout clock.
//!
//! ```text
//! arm()    ──► deadline = now + budget
//! pause()  ──► deadline = None        (while blocked in require)
//! arm()    ──► deadline = now + budget (full budget again)
//! expired() resolves when the current deadline passes
//! ```
//!
//! The deadline lives in a `watch` channel so a waiting [`Countdown::expired`]
//! observes re-arming and pausing without being recreated. A countdown without
//! a budget never expires.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

#[derive(Debug)]
pub(crate) struct Countdown {
    budget: Option<Duration>,
    deadline: watch::Sender<Option<Instant>>,
}

impl Countdown {
    pub(crate) fn new(budget: Option<Duration>) -> Self {
        let (deadline, _rx) = watch::channel(None);
        Self { budget, deadline }
    }

    pub(crate) fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Starts (or restarts) the clock with the full budget.
    pub(crate) fn arm(&self) {
        if let Some(budget) = self.budget {
            self.deadline.send_replace(Some(Instant::now() + budget));
        }
    }

    /// Stops the clock until the next [`arm`](Self::arm).
    pub(crate) fn pause(&self) {
        self.deadline.send_replace(None);
    }

    /// Clears the deadline `at` once it has been handled.
    ///
    /// A deadline re-armed in the meantime is left untouched.
    pub(crate) fn consume(&self, at: Instant) {
        self.deadline.send_if_modified(|d| {
            if *d == Some(at) {
                *d = None;
                true
            } else {
                false
            }
        });
    }

    /// Resolves with the deadline that passed.
    pub(crate) async fn expired(&self) -> Instant {
        if self.budget.is_none() {
            return std::future::pending().await;
        }
        let mut rx = self.deadline.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            match current {
                Some(at) => {
                    tokio::select! {
                        _ = sleep_until(at) => return at,
                        res = rx.changed() => {
                            if res.is_err() {
                                return std::future::pending().await;
                            }
                        }
                    }
                }
                None => {
                    if rx.changed().await.is_err() {
                        return std::future::pending().await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expires_after_budget() {
        let cd = Countdown::new(Some(Duration::from_millis(50)));
        let start = Instant::now();
        cd.arm();
        let at = cd.expired().await;
        assert_eq!(at - start, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_and_rearm_restores_full_budget() {
        let cd = std::sync::Arc::new(Countdown::new(Some(Duration::from_millis(50))));
        let start = Instant::now();
        cd.arm();

        let ctl = std::sync::Arc::clone(&cd);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            ctl.pause();
            tokio::time::sleep(Duration::from_millis(100)).await;
            ctl.arm();
        });

        cd.expired().await;
        assert_eq!(start.elapsed(), Duration::from_millis(190));
    }

    #[tokio::test(start_paused = true)]
    async fn no_budget_never_expires() {
        let cd = Countdown::new(None);
        cd.arm();
        let res = tokio::time::timeout(Duration::from_secs(3600), cd.expired()).await;
        assert!(res.is_err());
    }
}
