//! Status badge fed by the last-load outcome.
//!
//! A single current value plus subscribers notified on change, built on
//! `tokio::sync::watch`.

use tokio::sync::watch;

use crate::api::LoadOutcome;

/// Holds the current [`LoadOutcome`] and fans changes out to subscribers.
#[derive(Clone)]
pub struct OutcomeBadge {
    tx: watch::Sender<LoadOutcome>,
}

impl OutcomeBadge {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LoadOutcome::Success);
        Self { tx }
    }

    pub fn current(&self) -> LoadOutcome {
        *self.tx.borrow()
    }

    /// Publish a new outcome. Subscribers are only woken when the value
    /// actually changed.
    pub fn publish(&self, outcome: LoadOutcome) {
        self.tx.send_if_modified(|current| {
            if *current == outcome {
                false
            } else {
                *current = outcome;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadOutcome> {
        self.tx.subscribe()
    }
}

impl Default for OutcomeBadge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_updates_the_current_value() {
        let badge = OutcomeBadge::new();
        assert_eq!(badge.current(), LoadOutcome::Success);

        badge.publish(LoadOutcome::Failed);
        assert_eq!(badge.current(), LoadOutcome::Failed);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let badge = OutcomeBadge::new();
        let mut rx = badge.subscribe();

        badge.publish(LoadOutcome::Error);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LoadOutcome::Error);
    }

    #[tokio::test]
    async fn republishing_the_same_value_does_not_notify() {
        let badge = OutcomeBadge::new();
        let mut rx = badge.subscribe();

        badge.publish(LoadOutcome::Success);
        assert!(!rx.has_changed().unwrap());
    }
}
