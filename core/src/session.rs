//! Locally cached identity of the logged-in user.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::UserProfile;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub is_authenticated: bool,
}

/// Shared handle to the session state. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().is_authenticated
    }

    pub fn set_user(&self, user: UserProfile) {
        let mut state = self.lock();
        state.user = Some(user);
        state.is_authenticated = true;
    }

    pub fn clear(&self) {
        *self.lock() = SessionState::default();
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
