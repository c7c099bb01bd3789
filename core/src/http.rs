//! HTTP request descriptors and responses.
//!
//! # Design
//! Requests and responses are plain owned data. The dispatcher owns an
//! `HttpRequest` for the whole lifetime of a call, which is what lets it
//! replay the exact same descriptor after a session renewal without asking
//! the caller to rebuild it. The only field the dispatcher ever mutates is
//! `retried`, plus the content-type adjustment applied once by `prepare`.
//!
//! `path` is relative to the transport's base URL (for example
//! `/courses/courses/?page=2`); exclusion matching compares only the part
//! before the query string.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;

pub const CONTENT_TYPE: &str = "content-type";
pub const APPLICATION_JSON: &str = "application/json";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Pre-serialized JSON text.
    Json(String),
    /// Form upload, e.g. a profile picture. The transport encodes the parts
    /// and appends the boundary to the content type.
    Multipart(Vec<FormPart>),
}

/// One field of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: value.into().into_bytes(),
            file_name: None,
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            file_name: Some(file_name.into()),
        }
    }
}

/// An outbound call described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
    /// Set once, when the dispatcher replays this descriptor after a renewal.
    pub retried: bool,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: Body::Empty,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Serialize `value` as the JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, value: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_string(value).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        self.body = Body::Json(body);
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = Body::Multipart(parts);
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value.into());
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The request path without its query string.
    pub fn target(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(target, _)| target)
    }

    /// Apply the content-type rules every outbound request goes through:
    /// JSON bodies default to `application/json`, multipart bodies always
    /// carry `multipart/form-data`.
    pub(crate) fn prepare(&mut self) {
        match &self.body {
            Body::Empty => {}
            Body::Json(_) => {
                if self.header_value(CONTENT_TYPE).is_none() {
                    self.set_header(CONTENT_TYPE, APPLICATION_JSON.to_string());
                }
            }
            Body::Multipart(_) => self.set_header(CONTENT_TYPE, MULTIPART_FORM_DATA.to_string()),
        }
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value));
    }
}

/// A response as returned by the transport, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_not_retried() {
        let req = HttpRequest::get("/courses/courses/");
        assert_eq!(req.method, HttpMethod::Get);
        assert!(!req.retried);
        assert_eq!(req.body, Body::Empty);
        assert!(req.headers.is_empty());
    }

    #[test]
    fn prepare_defaults_json_content_type() {
        let mut req = HttpRequest::post("/courses/courses/")
            .json(&serde_json::json!({"course_code": "CS101"}))
            .unwrap();
        req.prepare();
        assert_eq!(req.header_value("Content-Type"), Some(APPLICATION_JSON));
    }

    #[test]
    fn prepare_keeps_explicit_json_content_type() {
        let mut req = HttpRequest::post("/x/")
            .json(&1)
            .unwrap()
            .header("Content-Type", "application/vnd.api+json");
        req.prepare();
        assert_eq!(req.header_value(CONTENT_TYPE), Some("application/vnd.api+json"));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn prepare_forces_multipart_content_type() {
        let mut req = HttpRequest::put("/auth/me/")
            .header("content-type", APPLICATION_JSON)
            .multipart(vec![
                FormPart::text("first_name", "Ada"),
                FormPart::file("profile_picture", "me.png", vec![0x89, 0x50]),
            ]);
        req.prepare();
        assert_eq!(req.header_value(CONTENT_TYPE), Some(MULTIPART_FORM_DATA));
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn prepare_leaves_empty_body_alone() {
        let mut req = HttpRequest::delete("/courses/courses/CS101/");
        req.prepare();
        assert!(req.headers.is_empty());
    }

    #[test]
    fn target_strips_query_string() {
        let req = HttpRequest::get("/courses/courses/?page=2&limit=10");
        assert_eq!(req.target(), "/courses/courses/");
        assert_eq!(HttpRequest::get("/auth/me/").target(), "/auth/me/");
    }

    #[test]
    fn response_success_range() {
        let ok = HttpResponse { status: 204, headers: Vec::new(), body: String::new() };
        let redirect = HttpResponse { status: 302, headers: Vec::new(), body: String::new() };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let resp = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: String::new(),
        };
        assert_eq!(resp.header("content-type"), Some("text/plain"));
    }
}
