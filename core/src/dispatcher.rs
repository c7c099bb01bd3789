//! The public entry point: dispatch with transparent session renewal.
//!
//! # Design
//! `SessionClient` owns its transport, its configuration and its own
//! `RenewalCoordinator`; nothing is process-global, so independent clients
//! (and independent tests) never share renewal state.
//!
//! A failed request goes through renewal only when all of these hold:
//! - it has not been replayed before (`retried` is false);
//! - its target is not login, refresh or logout;
//! - the failure is an expired-session status.
//!
//! Every other failure is returned to the caller untouched.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::classify::{classify, FailureKind};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::escalation::{EscalationHandler, SessionLost, SessionLostListener};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::renewal::RenewalCoordinator;
use crate::retry::retry_once;
use crate::session::SessionStore;
use crate::transport::{send_checked, Transport};

pub struct SessionClient<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    session: SessionStore,
    escalation: Arc<EscalationHandler>,
    coordinator: RenewalCoordinator<T>,
}

impl<T: Transport> SessionClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self::builder(transport, config).build()
    }

    pub fn builder(transport: T, config: ClientConfig) -> SessionClientBuilder<T> {
        SessionClientBuilder {
            transport,
            config,
            session: SessionStore::new(),
            listener: None,
        }
    }

    /// Send `request`, renewing the session and replaying once if it failed
    /// because the session expired.
    pub async fn dispatch(&self, mut request: HttpRequest) -> Result<HttpResponse, ApiError> {
        request.prepare();
        debug!(method = %request.method, path = %request.path, "API request");

        let error = match send_checked(&*self.transport, &request).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };
        if request.retried {
            return Err(error);
        }
        match classify(&error, &request, &self.config) {
            FailureKind::SessionExpired => {}
            FailureKind::RenewalEndpointFailure | FailureKind::OtherFailure => return Err(error),
        }

        debug!(method = %request.method, path = %request.path, "session expired");
        self.coordinator.ensure_renewed().await?;

        request.retried = true;
        retry_once(&*self.transport, &request).await
    }

    /// `GET path` and decode the JSON response.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.dispatch(HttpRequest::get(path)).await?.json()
    }

    /// Send `body` as JSON with `method` and decode the JSON response.
    pub async fn send_json<B, R>(&self, method: HttpMethod, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = HttpRequest::new(method, path).json(body)?;
        self.dispatch(request).await?.json()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn coordinator(&self) -> &RenewalCoordinator<T> {
        &self.coordinator
    }

    /// Number of times this client has declared the session lost.
    pub fn escalations(&self) -> u64 {
        self.escalation.escalations()
    }
}

pub struct SessionClientBuilder<T: Transport> {
    transport: T,
    config: ClientConfig,
    session: SessionStore,
    listener: Option<SessionLostListener>,
}

impl<T: Transport> SessionClientBuilder<T> {
    /// Share an existing session store instead of creating a fresh one.
    pub fn session(mut self, session: SessionStore) -> Self {
        self.session = session;
        self
    }

    /// Register the callback that receives "session lost" events.
    pub fn on_session_lost<F>(mut self, listener: F) -> Self
    where
        F: Fn(&SessionLost) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn build(self) -> SessionClient<T> {
        let transport = Arc::new(self.transport);
        let mut escalation = EscalationHandler::new(self.session.clone(), self.config.login_route.clone());
        if let Some(listener) = self.listener {
            escalation = escalation.with_listener(listener);
        }
        let escalation = Arc::new(escalation);
        let coordinator = RenewalCoordinator::new(
            Arc::clone(&transport),
            self.config.auth_paths.refresh.clone(),
            Arc::clone(&escalation),
        );
        SessionClient {
            transport,
            config: self.config,
            session: self.session,
            escalation,
            coordinator,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::{RenewalError, TransportError};
    use crate::http::{FormPart, APPLICATION_JSON, CONTENT_TYPE, MULTIPART_FORM_DATA};
    use crate::transport::testing::StubTransport;

    const REFRESH: &str = "/auth/token/refresh/";
    const COURSES: &str = "/courses/courses/";

    fn client() -> SessionClient<StubTransport> {
        SessionClient::new(StubTransport::new(), ClientConfig::default())
    }

    #[tokio::test]
    async fn success_is_returned_unchanged() {
        let client = client();
        client.transport().reply(COURSES, 200, r#"{"count":1}"#);

        let response = client.dispatch(HttpRequest::get(COURSES)).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"count":1}"#);
        assert_eq!(client.transport().calls_to(REFRESH), 0);
    }

    #[tokio::test]
    async fn other_failures_propagate_without_renewal() {
        let client = client();
        client.transport().reply(COURSES, 400, r#"{"course_code":["This field is required."]}"#);
        client.transport().fail(COURSES, TransportError::Connect("refused".to_string()));

        let err = client.dispatch(HttpRequest::post(COURSES)).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        let err = client.dispatch(HttpRequest::get(COURSES)).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));

        assert_eq!(client.transport().calls_to(REFRESH), 0);
        assert_eq!(client.transport().requests().len(), 2);
    }

    #[tokio::test]
    async fn expired_session_renews_and_replays_once() {
        let client = client();
        client.transport().reply(COURSES, 401, "").reply(COURSES, 200, "[]");

        let response = client.dispatch(HttpRequest::get(COURSES)).await.unwrap();

        assert_eq!(response.body, "[]");
        let sent = client.transport().requests();
        let targets: Vec<&str> = sent.iter().map(HttpRequest::target).collect();
        assert_eq!(targets, vec![COURSES, REFRESH, COURSES]);
        assert!(!sent[0].retried);
        assert!(sent[2].retried);
    }

    #[tokio::test]
    async fn replay_failure_is_final() {
        let client = client();
        client
            .transport()
            .reply(COURSES, 401, "")
            .reply(COURSES, 401, r#"{"detail":"still expired"}"#);

        let err = client.dispatch(HttpRequest::get(COURSES)).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.detail().as_deref(), Some("still expired"));
        assert_eq!(client.transport().calls_to(REFRESH), 1);
        assert_eq!(client.transport().calls_to(COURSES), 2);
    }

    #[tokio::test]
    async fn already_retried_descriptor_is_not_renewed() {
        let client = client();
        client.transport().reply(COURSES, 401, "");
        let mut request = HttpRequest::get(COURSES);
        request.retried = true;

        let err = client.dispatch(request).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(client.transport().calls_to(REFRESH), 0);
    }

    #[tokio::test]
    async fn auth_endpoints_are_never_renewed() {
        let client = client();
        let paths = ClientConfig::default().auth_paths;
        for path in [&paths.login, &paths.refresh, &paths.logout] {
            client.transport().reply(path, 401, "");
            let err = client.dispatch(HttpRequest::post(path.as_str())).await.unwrap_err();
            assert_eq!(err.status(), Some(401), "{path}");
        }
        // Only the explicit refresh dispatch above reached the refresh path.
        assert_eq!(client.transport().calls_to(REFRESH), 1);
        assert_eq!(client.coordinator().renewals_started(), 0);
    }

    #[tokio::test]
    async fn renewal_failure_escalates_and_fails_request() {
        let lost = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&lost);
        let client = SessionClient::builder(StubTransport::new(), ClientConfig::default())
            .on_session_lost(move |event| {
                assert_eq!(event.redirect_to, "/login");
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        client.transport().reply(COURSES, 401, "").reply(REFRESH, 401, "");

        let err = client.dispatch(HttpRequest::get(COURSES)).await.unwrap_err();

        assert!(matches!(err, ApiError::Renewal(RenewalError::Rejected { status: 401, .. })));
        assert_eq!(lost.load(Ordering::SeqCst), 1);
        assert_eq!(client.escalations(), 1);
        assert_eq!(client.transport().calls_to(COURSES), 1);
    }

    #[tokio::test]
    async fn json_helpers_decode_and_set_content_type() {
        let client = client();
        client.transport().reply(COURSES, 201, r#"{"course_code":"CS101"}"#);

        let created: serde_json::Value = client
            .send_json(HttpMethod::Post, COURSES, &serde_json::json!({"course_code": "CS101"}))
            .await
            .unwrap();

        assert_eq!(created["course_code"], "CS101");
        let sent = client.transport().requests();
        assert_eq!(sent[0].header_value(CONTENT_TYPE), Some(APPLICATION_JSON));
    }

    #[tokio::test]
    async fn multipart_uploads_keep_their_content_type_on_replay() {
        let client = client();
        client.transport().reply("/auth/me/", 401, "");
        let request = HttpRequest::put("/auth/me/").multipart(vec![FormPart::file("profile_picture", "me.png", vec![1, 2, 3])]);

        client.dispatch(request).await.unwrap();

        let sent = client.transport().requests();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].header_value(CONTENT_TYPE), Some(MULTIPART_FORM_DATA));
        assert_eq!(sent[0].body, sent[2].body);
    }

    #[tokio::test]
    async fn get_json_reports_decode_errors() {
        let client = client();
        client.transport().reply(COURSES, 200, "not json");

        let err = client.get_json::<Vec<String>>(COURSES).await.unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
