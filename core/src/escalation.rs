//! Session-lost escalation.
//!
//! # Design
//! The renewal coordinator calls `on_renewal_failure` from inside the
//! renewal task, so it fires once per failed renewal no matter how
//! many requests were waiting. How the application navigates to the login
//! route is up to the registered listener.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::error::RenewalError;
use crate::session::SessionStore;

/// Emitted once per failed renewal.
#[derive(Debug, Clone)]
pub struct SessionLost {
    /// Route the application should navigate to.
    pub redirect_to: String,
    pub error: RenewalError,
}

pub type SessionLostListener = Arc<dyn Fn(&SessionLost) + Send + Sync>;

pub struct EscalationHandler {
    session: SessionStore,
    login_route: String,
    listener: Option<SessionLostListener>,
    escalations: AtomicU64,
}

impl EscalationHandler {
    pub fn new(session: SessionStore, login_route: impl Into<String>) -> Self {
        Self {
            session,
            login_route: login_route.into(),
            listener: None,
            escalations: AtomicU64::new(0),
        }
    }

    pub fn with_listener(mut self, listener: SessionLostListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn on_renewal_failure(&self, error: &RenewalError) {
        let count = self.escalations.fetch_add(1, Ordering::Relaxed) + 1;
        self.session.clear();
        warn!(%error, redirect_to = %self.login_route, escalations = count, "session lost");

        if let Some(listener) = &self.listener {
            listener(&SessionLost {
                redirect_to: self.login_route.clone(),
                error: error.clone(),
            });
        }
    }

    /// Number of times the session has been declared lost.
    pub fn escalations(&self) -> u64 {
        self.escalations.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EscalationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EscalationHandler")
            .field("login_route", &self.login_route)
            .field("has_listener", &self.listener.is_some())
            .field("escalations", &self.escalations())
            .finish()
    }
}
