//! The network boundary.
//!
//! # Design
//! `Transport` is the only thing the dispatcher and the renewal coordinator
//! know about the network: it takes a descriptor and returns whatever the
//! server answered, any status included. Turning a non-2xx status into an
//! error is the dispatcher's job (`send_checked`), so a transport stays a thin
//! adapter. `ReqwestTransport` is the production adapter; it keeps a cookie
//! jar so the session cookies set by login and refresh ride along on every
//! later call.

use std::future::Future;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Method;

use crate::config::ClientConfig;
use crate::error::{ApiError, TransportError};
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse, CONTENT_TYPE};

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: &HttpRequest) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Send through `transport` and map non-2xx statuses to `ApiError::Status`.
pub(crate) async fn send_checked<T: Transport>(transport: &T, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
    let response = transport.send(request).await?;
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status: response.status,
            body: response.body,
        })
    }
}

/// `Transport` over a cookie-keeping `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{path}", self.base_url)
        }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };
        let mut builder = self.client.request(method, self.url(&request.path));

        let multipart = matches!(request.body, Body::Multipart(_));
        for (name, value) in &request.headers {
            // reqwest writes the multipart content type itself, boundary included.
            if multipart && name.eq_ignore_ascii_case(CONTENT_TYPE) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(json) => builder.body(json.clone()),
            Body::Multipart(parts) => {
                let form = parts.iter().fold(Form::new(), |form, part| {
                    let mut field = Part::bytes(part.data.clone());
                    if let Some(file_name) = &part.file_name {
                        field = field.file_name(file_name.clone());
                    }
                    form.part(part.name.clone(), field)
                });
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.text().await.map_err(transport_error)?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
