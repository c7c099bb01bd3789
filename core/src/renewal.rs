//! Single-flight session renewal.
//!
//! # Design
//! The coordinator state is `Idle` or `InProgress(pending)`, behind one
//! mutex. `pending` is a `Shared` future: every caller that finds a renewal
//! in progress clones it and awaits the same outcome, so N concurrent expiry
//! failures produce exactly one call to the refresh endpoint.
//!
//! The check and the `Idle -> InProgress` transition happen under a single
//! lock acquisition, and the lock is never held across an await.
//!
//! The refresh call runs on its own tokio task; `pending` only awaits that
//! task's handle. Resetting the state to `Idle` and escalating a failure both
//! happen inside the task, so escalation runs once per renewal, and a renewal
//! whose waiters were all dropped (a caller timeout, a lost `select!` branch)
//! still finishes and returns the coordinator to `Idle` on its own. Must be
//! called from within a tokio runtime.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::error::RenewalError;
use crate::escalation::EscalationHandler;
use crate::http::HttpRequest;
use crate::transport::Transport;

type PendingRenewal = Shared<BoxFuture<'static, Result<(), RenewalError>>>;

enum RenewalState {
    Idle,
    InProgress(PendingRenewal),
}

pub struct RenewalCoordinator<T> {
    transport: Arc<T>,
    refresh_path: String,
    escalation: Arc<EscalationHandler>,
    state: Arc<Mutex<RenewalState>>,
    started: AtomicU64,
}

impl<T: Transport> RenewalCoordinator<T> {
    pub fn new(transport: Arc<T>, refresh_path: impl Into<String>, escalation: Arc<EscalationHandler>) -> Self {
        Self {
            transport,
            refresh_path: refresh_path.into(),
            escalation,
            state: Arc::new(Mutex::new(RenewalState::Idle)),
            started: AtomicU64::new(0),
        }
    }

    /// Renew the session, or wait for the renewal already in flight.
    pub async fn ensure_renewed(&self) -> Result<(), RenewalError> {
        let pending = {
            let mut state = lock(&self.state);
            let in_flight = match &*state {
                RenewalState::InProgress(pending) => Some(pending.clone()),
                RenewalState::Idle => None,
            };
            match in_flight {
                Some(pending) => {
                    debug!("joining in-flight session renewal");
                    pending
                }
                None => {
                    let pending = self.start_renewal();
                    *state = RenewalState::InProgress(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    pub fn is_renewing(&self) -> bool {
        matches!(*lock(&self.state), RenewalState::InProgress(_))
    }

    /// Number of renewal calls started over the coordinator's lifetime.
    pub fn renewals_started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    fn start_renewal(&self) -> PendingRenewal {
        let generation = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        let transport = Arc::clone(&self.transport);
        let escalation = Arc::clone(&self.escalation);
        let state = Arc::clone(&self.state);
        let request = HttpRequest::post(self.refresh_path.clone());

        let renewal = async move {
            let idle = IdleOnDrop(state);
            info!(generation, path = %request.path, "renewing session");
            let outcome = match transport.send(&request).await {
                Ok(response) if response.is_success() => Ok(()),
                Ok(response) => Err(RenewalError::Rejected {
                    status: response.status,
                    body: response.body,
                }),
                Err(err) => Err(RenewalError::Transport(err)),
            };

            drop(idle);

            match &outcome {
                Ok(()) => info!(generation, "session renewed"),
                Err(error) => {
                    warn!(generation, %error, "session renewal failed");
                    escalation.on_renewal_failure(error);
                }
            }
            outcome
        };

        let task = tokio::spawn(renewal);
        async move {
            task.await.unwrap_or_else(|err| {
                warn!(generation, %err, "session renewal task ended early");
                Err(RenewalError::Interrupted(err.to_string()))
            })
        }
        .boxed()
        .shared()
    }
}

/// Puts the coordinator back to `Idle` when the renewal task finishes or unwinds.
struct IdleOnDrop(Arc<Mutex<RenewalState>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        *lock(&self.0) = RenewalState::Idle;
    }
}

impl<T> fmt::Debug for RenewalCoordinator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenewalCoordinator")
            .field("refresh_path", &self.refresh_path)
            .field("renewing", &matches!(*lock(&self.state), RenewalState::InProgress(_)))
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

fn lock(state: &Mutex<RenewalState>) -> MutexGuard<'_, RenewalState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
