//! Online/offline signal consumed by the network repository.

use std::sync::Arc;

use tokio::sync::watch;

/// Source of connectivity transitions. Subscribers receive `true` for
/// online and `false` for offline; dropping the receiver unsubscribes.
pub trait ConnectivityWatcher: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity state driven by the host application.
///
/// Clones share the same state, so one handle can be given to the
/// repository while another reports transitions.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publishes a new state. Subscribers are only woken on an actual change.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityWatcher for ConnectivityMonitor {
    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_sees_transition() {
        let monitor = ConnectivityMonitor::new(true);
        let mut rx = monitor.subscribe();

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_same_state_does_not_notify() {
        let monitor = ConnectivityMonitor::new(true);
        let rx = monitor.subscribe();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_clones_share_state() {
        let monitor = ConnectivityMonitor::default();
        let handle = monitor.clone();
        handle.set_online(false);
        assert!(!monitor.is_online());
    }
}
