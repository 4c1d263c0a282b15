use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated { token: String },
    /// The backend answered 401; the auth layer must log in again.
    Invalidated,
}

/// Bearer-token holder shared by every request of one client.
///
/// Cloning is cheap and all clones observe the same state. Watchers are
/// notified when a 401 invalidates the session.
#[derive(Clone)]
pub struct Session {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for Session {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Anonymous);
        Self { state: Arc::new(tx) }
    }
}

impl Session {
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::default();
        session.set_token(token);
        session
    }

    pub fn set_token(&self, token: impl Into<String>) {
        self.state.send_replace(SessionState::Authenticated {
            token: token.into(),
        });
    }

    pub fn token(&self) -> Option<String> {
        match &*self.state.borrow() {
            SessionState::Authenticated { token } => Some(token.clone()),
            _ => None,
        }
    }

    pub fn invalidate(&self) {
        self.state.send_replace(SessionState::Invalidated);
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}
