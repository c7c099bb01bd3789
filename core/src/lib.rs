//! Session-renewing HTTP client core.
//!
//! # Overview
//! The remote service authenticates every call with a short-lived access
//! token kept in a cookie, and offers a refresh endpoint that renews it.
//! `SessionClient::dispatch` sends requests through a `Transport`; when one
//! fails because the session expired, the client renews the session once,
//! shared by every request that failed at the same time, and replays each of
//! those requests exactly once. If renewal fails, the session is declared
//! lost: the local `SessionStore` is cleared, a single `SessionLost` event is
//! emitted, and every waiting request fails with `ApiError::Renewal`.
//!
//! # Design
//! - `SessionClient` is the only entry point; CRUD callers build an
//!   `HttpRequest` and dispatch it, or use `get_json`/`send_json`.
//! - `RenewalCoordinator` is owned per client: no global state.
//! - Login, refresh and logout requests are never renewed or replayed.
//! - `Transport` is the I/O boundary; `ReqwestTransport` is the network
//!   implementation, tests use in-memory transports.

pub mod classify;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod escalation;
pub mod http;
pub mod renewal;
pub mod retry;
pub mod session;
pub mod transport;
pub mod types;

pub use classify::{classify, FailureKind};
pub use client::AuthClient;
pub use config::{AuthPaths, ClientConfig, ConfigError};
pub use dispatcher::{SessionClient, SessionClientBuilder};
pub use error::{ApiError, RenewalError, TransportError};
pub use escalation::{EscalationHandler, SessionLost, SessionLostListener};
pub use http::{Body, FormPart, HttpMethod, HttpRequest, HttpResponse};
pub use renewal::RenewalCoordinator;
pub use retry::retry_once;
pub use session::{SessionState, SessionStore};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Credentials, LoginResponse, UserProfile};
