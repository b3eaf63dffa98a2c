//! Run state and cancellation.
//!
//! Every pause a harvest makes (page delay, element retry, human-assist
//! wait) goes through [`HarvestControl::wait`], so callers can watch what a
//! run is doing and cut any wait short.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// What the harvest is currently doing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HarvestState {
    /// No search running
    Idle,
    /// Fetching the result page at this offset
    Fetching { offset: usize },
    /// Loading a page through the browser
    BrowserFallback { url: String },
    /// Waiting for a human to clear a challenge in the browser window
    AwaitingHuman { url: String, wait: Duration },
    /// Rate-limit pause between pages
    Pausing { wait: Duration },
    /// Last search returned this many records
    Finished { count: usize },
}

/// Shared handle for observing and cancelling a harvest session.
#[derive(Debug, Clone)]
pub struct HarvestControl {
    state: Arc<watch::Sender<HarvestState>>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Default for HarvestControl {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestControl {
    /// Create an idle, uncancelled control.
    pub fn new() -> Self {
        let (state, _) = watch::channel(HarvestState::Idle);
        let (cancel, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
            cancel: Arc::new(cancel),
        }
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<HarvestState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> HarvestState {
        self.state.borrow().clone()
    }

    /// Interrupt any running wait and stop the current search.
    ///
    /// Stays in effect until [`reset`](Self::reset).
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Clear a previous cancellation.
    pub fn reset(&self) {
        self.cancel.send_replace(false);
    }

    /// Whether the session has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    pub(crate) fn set(&self, state: HarvestState) {
        self.state.send_replace(state);
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` when the full wait elapsed, `false` when cancelled.
    pub async fn wait(&self, duration: Duration) -> bool {
        let mut cancelled = self.cancel.subscribe();
        if *cancelled.borrow_and_update() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = cancelled.wait_for(|c| *c) => {
                debug!(wait_ms = duration.as_millis() as u64, "Wait cancelled");
                false
            }
        }
    }
}
