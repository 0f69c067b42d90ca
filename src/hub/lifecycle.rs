//! Hub lifecycle state machine and shutdown coordination.
//!
//! A hub moves through `idle → running → draining → stopped`. The state
//! lives in a [`tokio::sync::watch`] channel, which gives us both halves of
//! the shutdown handshake: the transition to [`HubState::Draining`] is the
//! close signal the dispatch loop waits on, and the transition to
//! [`HubState::Stopped`] is the done signal a shutdown caller waits on.
//! Transitions are compare-and-set under the channel's lock, so the close
//! signal fires exactly once no matter how many callers request shutdown.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::RealtimeError;

/// Lifecycle state of a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HubState {
    /// Constructed, dispatch loop not started yet.
    Idle,
    /// Dispatch loop is processing events.
    Running,
    /// Shutdown requested; the loop is notifying and closing clients.
    Draining,
    /// Terminal: the dispatch loop has exited.
    Stopped,
}

impl HubState {
    /// Returns the state name as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Shutdown coordinator shared by the dispatch loop and its callers.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<HubState>,
}

impl Lifecycle {
    /// Creates a coordinator in the [`HubState::Idle`] state.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(HubState::Idle);
        Self { state }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> HubState {
        *self.state.borrow()
    }

    /// Returns `true` while the dispatch loop accepts new work.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == HubState::Running
    }

    /// Moves `idle → running`.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::HubAlreadyStarted`] if the hub has already
    /// been started or shut down.
    pub fn start(&self) -> Result<(), RealtimeError> {
        let started = self.state.send_if_modified(|state| {
            if *state == HubState::Idle {
                *state = HubState::Running;
                true
            } else {
                false
            }
        });
        if started {
            Ok(())
        } else {
            Err(RealtimeError::HubAlreadyStarted)
        }
    }

    /// Raises the close signal. Idempotent.
    ///
    /// A running hub moves to draining; a hub that was never started has
    /// nothing to drain and stops immediately. Returns `true` only for the
    /// call that performed the transition.
    pub fn request_shutdown(&self) -> bool {
        self.state.send_if_modified(|state| match *state {
            HubState::Idle => {
                *state = HubState::Stopped;
                true
            }
            HubState::Running => {
                *state = HubState::Draining;
                true
            }
            HubState::Draining | HubState::Stopped => false,
        })
    }

    /// Raises the done signal.
    pub fn mark_stopped(&self) {
        self.state.send_replace(HubState::Stopped);
    }

    /// Returns a receiver observing every state transition.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<HubState> {
        self.state.subscribe()
    }

    /// Resolves once shutdown has been requested.
    pub async fn draining(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|state| *state >= HubState::Draining).await;
    }

    /// Resolves once the dispatch loop has exited.
    pub async fn stopped(&self) {
        let mut rx = self.watch();
        let _ = rx.wait_for(|state| *state == HubState::Stopped).await;
    }

    /// Requests shutdown and waits up to `deadline` for the done signal.
    ///
    /// The drain keeps going in the background when the deadline elapses.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::ShutdownTimeout`] if the dispatch loop has
    /// not finished draining within `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), RealtimeError> {
        self.request_shutdown();
        tokio::time::timeout(deadline, self.stopped())
            .await
            .map_err(|_| RealtimeError::ShutdownTimeout {
                waited_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            })
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
