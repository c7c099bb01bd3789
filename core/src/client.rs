//! Authentication operations on top of `SessionClient`.
//!
//! # Design
//! Like the rest of the API surface, each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`; the async methods glue the two together
//! through `dispatch` and keep the `SessionStore` in sync with the outcome.
//! The profile call is not in the excluded set, so an expired access token
//! there is renewed transparently like any other request.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::dispatcher::SessionClient;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;
use crate::types::{Credentials, LoginResponse, UserProfile};

pub struct AuthClient<T: Transport> {
    client: Arc<SessionClient<T>>,
}

impl<T: Transport> Clone for AuthClient<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<T: Transport> AuthClient<T> {
    pub fn new(client: Arc<SessionClient<T>>) -> Self {
        Self { client }
    }

    pub fn session_client(&self) -> &Arc<SessionClient<T>> {
        &self.client
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<HttpRequest, ApiError> {
        HttpRequest::post(self.client.config().auth_paths.login.as_str()).json(credentials)
    }

    pub fn build_logout(&self) -> HttpRequest {
        HttpRequest::post(self.client.config().auth_paths.logout.as_str())
    }

    pub fn build_fetch_profile(&self) -> HttpRequest {
        HttpRequest::get(self.client.config().auth_paths.profile.as_str())
    }

    pub fn parse_login(&self, response: HttpResponse) -> Result<LoginResponse, ApiError> {
        response.json()
    }

    pub fn parse_profile(&self, response: HttpResponse) -> Result<UserProfile, ApiError> {
        response.json()
    }

    /// Log in and remember the returned user.
    pub async fn login(&self, credentials: &Credentials) -> Result<UserProfile, ApiError> {
        let request = self.build_login(credentials)?;
        let login = match self.client.dispatch(request).await {
            Ok(response) => self.parse_login(response)?,
            Err(error) => {
                warn!(%error, "login failed");
                return Err(error);
            }
        };
        debug!(email = %login.user.email, "logged in");
        self.client.session().set_user(login.user.clone());
        Ok(login.user)
    }

    /// Log out. The local session is cleared whether or not the server call
    /// succeeds; the server error, if any, is still returned.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let outcome = self.client.dispatch(self.build_logout()).await;
        self.client.session().clear();
        match outcome {
            Ok(_) => Ok(()),
            Err(error) => {
                warn!(%error, "logout failed; local session cleared anyway");
                Err(error)
            }
        }
    }

    /// Fetch the current user's profile, updating the session either way.
    pub async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let outcome = self
            .client
            .dispatch(self.build_fetch_profile())
            .await
            .and_then(|response| self.parse_profile(response));
        match outcome {
            Ok(user) => {
                self.client.session().set_user(user.clone());
                Ok(user)
            }
            Err(error) => {
                warn!(%error, "fetch profile failed");
                self.client.session().clear();
                Err(error)
            }
        }
    }

    /// Whether the session is still valid. Never fails.
    pub async fn check_auth(&self) -> bool {
        match self.fetch_profile().await {
            Ok(_) => true,
            Err(error) => {
                debug!(%error, "auth check failed");
                false
            }
        }
    }
}
