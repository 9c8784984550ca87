//! Countdown for the active session code.
//!
//! One task per code decrements a seconds counter every second and
//! publishes it on a watch channel. When the counter reaches zero the code
//! is marked expired exactly once and the task ends. Cancelling (explicitly,
//! or by dropping the handle) stops the task without firing expiry.
//!
//! The countdown is display-only; the backend enforces the real window.

use crate::codec::SessionCode;
use crate::observability::metrics;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Default countdown length in seconds.
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 300;

/// Tick period.
const TICK: Duration = Duration::from_secs(1);

/// Published countdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Running { remaining: u32 },
    Expired,
    Cancelled,
}

impl CountdownState {
    /// Seconds left; zero once the countdown has ended either way.
    #[must_use]
    pub fn remaining(self) -> u32 {
        match self {
            CountdownState::Running { remaining } => remaining,
            CountdownState::Expired | CountdownState::Cancelled => 0,
        }
    }

    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, CountdownState::Running { .. })
    }
}

/// Format seconds as `m:ss`, e.g. `4:05`.
#[must_use]
pub fn format_remaining(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Callback fired once when a countdown expires.
pub type ExpiryCallback = Box<dyn FnOnce(&SessionCode) + Send + 'static>;

/// Handle to a running countdown.
///
/// Dropping the handle cancels the countdown.
#[derive(Debug)]
pub struct CountdownHandle {
    code: SessionCode,
    total_seconds: u32,
    state_rx: watch::Receiver<CountdownState>,
    expired_rx: Option<oneshot::Receiver<()>>,
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    /// Start a countdown of `total_seconds` for `code`.
    #[must_use]
    pub fn start(code: SessionCode, total_seconds: u32) -> Self {
        Self::start_with(code, total_seconds, None)
    }

    /// Start a countdown that calls `on_expire` when it runs out.
    #[must_use]
    pub fn start_with(
        code: SessionCode,
        total_seconds: u32,
        on_expire: Option<ExpiryCallback>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(CountdownState::Running {
            remaining: total_seconds,
        });
        let (expired_tx, expired_rx) = oneshot::channel();

        let actor = CountdownActor {
            code: code.clone(),
            remaining: total_seconds,
            state_tx,
            expired_tx: Some(expired_tx),
            on_expire,
            cancel_token: cancel_token.clone(),
        };
        let task = tokio::spawn(actor.run());

        Self {
            code,
            total_seconds,
            state_rx,
            expired_rx: Some(expired_rx),
            cancel_token,
            task,
        }
    }

    #[must_use]
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    #[must_use]
    pub fn total_seconds(&self) -> u32 {
        self.total_seconds
    }

    #[must_use]
    pub fn state(&self) -> CountdownState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.state().remaining()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state() == CountdownState::Expired
    }

    /// Remaining time formatted for display.
    #[must_use]
    pub fn display(&self) -> String {
        format_remaining(self.remaining())
    }

    /// Watch every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.state_rx.clone()
    }

    /// Wait for the countdown to end.
    ///
    /// Returns `true` if it expired and `false` if it was cancelled.
    pub async fn finished(&mut self) -> bool {
        match self.expired_rx.take() {
            Some(rx) => rx.await.is_ok(),
            None => self.is_expired(),
        }
    }

    /// Stop the countdown without firing expiry. No-op once it has ended.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the countdown task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

struct CountdownActor {
    code: SessionCode,
    remaining: u32,
    state_tx: watch::Sender<CountdownState>,
    expired_tx: Option<oneshot::Sender<()>>,
    on_expire: Option<ExpiryCallback>,
    cancel_token: CancellationToken,
}

impl CountdownActor {
    #[instrument(skip_all, name = "attendance.countdown", fields(session_code = %self.code))]
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        debug!(target: "attendance.countdown", seconds = self.remaining, "Countdown started");

        loop {
            if self.remaining == 0 {
                self.expire();
                break;
            }

            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "attendance.countdown",
                        remaining = self.remaining,
                        "Countdown cancelled"
                    );
                    self.state_tx.send_replace(CountdownState::Cancelled);
                    break;
                }

                _ = ticker.tick() => {
                    self.remaining = self.remaining.saturating_sub(1);
                    if self.remaining > 0 {
                        self.state_tx.send_replace(CountdownState::Running {
                            remaining: self.remaining,
                        });
                    }
                }
            }
        }
    }

    fn expire(&mut self) {
        self.state_tx.send_replace(CountdownState::Expired);
        if let Some(tx) = self.expired_tx.take() {
            let _ = tx.send(());
        }
        if let Some(callback) = self.on_expire.take() {
            callback(&self.code);
        }
        metrics::record_countdown_expired();
        info!(target: "attendance.countdown", "Session code expired");
    }
}
