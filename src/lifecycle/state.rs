//! Process-wide server lifecycle state.
//!
//! The state is owned by a single [`Lifecycle`] held by the server
//! orchestration code. Request handlers never see it; other components can
//! only observe it through a [`watch::Receiver`].

use strum::Display;
use tokio::sync::watch;
use tracing::debug;

use crate::error::LifecycleError;

/// Server lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LifecycleState {
    /// Process started, socket not yet bound.
    Starting,
    /// Socket bound and accepting connections.
    Listening,
    /// No longer accepting; draining in-flight requests.
    ShuttingDown,
    /// Drain finished or grace period expired.
    Terminated,
}

impl LifecycleState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Starting, Listening)
                | (Starting, Terminated)
                | (Listening, ShuttingDown)
                | (ShuttingDown, Terminated)
        )
    }
}

/// Owner of the lifecycle state.
#[derive(Debug)]
pub struct Lifecycle {
    sender: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    /// Create a lifecycle in the `Starting` state.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(LifecycleState::Starting);
        Self { sender }
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.sender.borrow()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.sender.subscribe()
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&self, next: LifecycleState) -> Result<(), LifecycleError> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition { from, to: next });
        }
        self.sender.send_replace(next);
        debug!(%from, to = %next, "Lifecycle transition");
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_starting() {
        assert_eq!(Lifecycle::new().state(), LifecycleState::Starting);
    }

    #[test]
    fn follows_happy_path() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Listening).unwrap();
        lifecycle.transition(LifecycleState::ShuttingDown).unwrap();
        lifecycle.transition(LifecycleState::Terminated).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    }

    #[test]
    fn rejects_skipping_shutdown() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Listening).unwrap();

        let err = lifecycle.transition(LifecycleState::Terminated).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: LifecycleState::Listening,
                to: LifecycleState::Terminated,
            }
        );
        assert_eq!(lifecycle.state(), LifecycleState::Listening);
    }

    #[test]
    fn rejects_double_shutdown() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Listening).unwrap();
        lifecycle.transition(LifecycleState::ShuttingDown).unwrap();
        assert!(lifecycle.transition(LifecycleState::ShuttingDown).is_err());
    }

    #[test]
    fn terminated_is_final() {
        let lifecycle = Lifecycle::new();
        lifecycle.transition(LifecycleState::Terminated).unwrap();
        for next in [
            LifecycleState::Starting,
            LifecycleState::Listening,
            LifecycleState::ShuttingDown,
        ] {
            assert!(lifecycle.transition(next).is_err());
        }
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.subscribe();

        lifecycle.transition(LifecycleState::Listening).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Listening);
    }
}
