use std::sync::Arc;

use tokio::sync::watch;

use shared_database::Subscription;
use shared_models::auth::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LoggedOut,
    LoggedIn(Session),
}

/// Single source of truth for "is a user logged in", published as a stream of events.
#[derive(Clone)]
pub struct SessionObserver {
    sender: Arc<watch::Sender<SessionEvent>>,
}

impl Default for SessionObserver {
    fn default() -> Self {
        let (sender, _) = watch::channel(SessionEvent::LoggedOut);
        Self {
            sender: Arc::new(sender),
        }
    }
}

impl SessionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: SessionEvent) {
        self.sender.send_replace(event);
    }

    pub fn current(&self) -> SessionEvent {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription<SessionEvent> {
        Subscription::new(self.sender.subscribe())
    }
}
