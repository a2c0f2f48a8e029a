//! Outbound response value.
//!
//! # Responsibilities
//! - Carry status, protocol version, headers and a buffered body
//! - Strip body and entity headers for `304 Not Modified`
//! - Normalize headers and body for the request being answered (`prepare`)
//!
//! # Design Decisions
//! - Bodies are fully buffered `Bytes`; handlers produce whole payloads
//! - `prepare` is idempotent, so it can run after every normalization step

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Version};
use axum::response::IntoResponse;
use serde_json::Value;

use crate::http::Request;

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// Headers that describe an entity body and are dropped by `304` responses.
const NOT_MODIFIED_STRIPPED: [&str; 7] = [
    "allow",
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "last-modified",
];

/// One HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// `200 OK` with the given body and no content type yet.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// Plain text body.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=UTF-8"),
            )
            .with_body(body.into())
    }

    /// `200 OK` JSON body.
    pub fn json(value: &Value) -> Self {
        Self::new(StatusCode::OK)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(value.to_string())
    }

    /// Redirect to `location` with the given 3xx status.
    ///
    /// A location that is not a valid header value yields a `500`.
    pub fn redirect(location: &str, status: StatusCode) -> Self {
        match HeaderValue::from_str(location) {
            Ok(value) => Self::new(status)
                .with_header(header::LOCATION, value)
                .with_body(format!("Redirecting to {location}.")),
            Err(_) => {
                tracing::error!(location = %location, "redirect target is not a valid header value");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Body decoded as UTF-8, lossy.
    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn this into a bodiless `304 Not Modified`.
    pub fn set_not_modified(&mut self) {
        self.status = StatusCode::NOT_MODIFIED;
        self.body = Bytes::new();
        for name in NOT_MODIFIED_STRIPPED {
            self.headers.remove(name);
        }
    }

    /// Normalize headers and body for the request being answered.
    pub fn prepare(mut self, request: &Request) -> Self {
        if self.status.is_informational()
            || self.status == StatusCode::NO_CONTENT
            || self.status == StatusCode::NOT_MODIFIED
        {
            self.body = Bytes::new();
            self.headers.remove(header::CONTENT_TYPE);
            self.headers.remove(header::CONTENT_LENGTH);
        } else {
            self.fix_content_type();
            self.fix_content_length(request);
        }

        self.version = if request.version() == Version::HTTP_10 {
            Version::HTTP_10
        } else {
            Version::HTTP_11
        };

        if self.version == Version::HTTP_10 {
            let no_cache = self
                .header(header::CACHE_CONTROL.as_str())
                .is_some_and(|v| v.contains("no-cache"));
            if no_cache {
                self.headers
                    .insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
                self.headers.insert(header::EXPIRES, HeaderValue::from_static("-1"));
            }
        }

        self
    }

    fn fix_content_type(&mut self) {
        let current = self.header(header::CONTENT_TYPE.as_str()).map(str::to_string);
        match current {
            None => {
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
                );
            }
            Some(ct) => {
                let lower = ct.to_ascii_lowercase();
                if lower.starts_with("text/") && !lower.contains("charset") {
                    if let Ok(value) = HeaderValue::from_str(&format!("{ct}; charset=UTF-8")) {
                        self.headers.insert(header::CONTENT_TYPE, value);
                    }
                }
            }
        }
    }

    fn fix_content_length(&mut self, request: &Request) {
        let is_head = request.method() == Method::HEAD;

        if self.headers.contains_key(header::TRANSFER_ENCODING) {
            self.headers.remove(header::CONTENT_LENGTH);
        } else if !is_head || !self.body.is_empty() || !self.headers.contains_key(header::CONTENT_LENGTH) {
            // A HEAD response already emptied by an earlier pass keeps its length.
            self.headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        }

        if is_head {
            self.body = Bytes::new();
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Uri;
    use serde_json::json;

    fn get() -> Request {
        Request::new(Method::GET, Uri::from_static("/"))
    }

    #[test]
    fn test_prepare_defaults() {
        let response = Response::ok("hello").prepare(&get());
        assert_eq!(response.header("content-type"), Some(DEFAULT_CONTENT_TYPE));
        assert_eq!(response.header("content-length"), Some("5"));
        assert_eq!(response.version(), Version::HTTP_11);
        assert_eq!(response.body().as_ref(), b"hello");
    }

    #[test]
    fn test_prepare_adds_charset_to_text() {
        let response = Response::ok("x")
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .prepare(&get());
        assert_eq!(response.header("content-type"), Some("text/plain; charset=UTF-8"));

        let response = Response::json(&json!({"a": 1})).prepare(&get());
        assert_eq!(response.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_prepare_head_keeps_length() {
        let head = Request::new(Method::HEAD, Uri::from_static("/"));
        let response = Response::ok("hello").prepare(&head);
        assert!(response.body().is_empty());
        assert_eq!(response.header("content-length"), Some("5"));
    }

    #[test]
    fn test_prepare_empty_statuses() {
        let response = Response::ok("ignored")
            .with_status(StatusCode::NO_CONTENT)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .prepare(&get());
        assert!(response.body().is_empty());
        assert!(response.header("content-type").is_none());
        assert!(response.header("content-length").is_none());
    }

    #[test]
    fn test_prepare_transfer_encoding_drops_length() {
        let response = Response::ok("chunk")
            .with_header(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"))
            .with_header(header::CONTENT_LENGTH, HeaderValue::from_static("5"))
            .prepare(&get());
        assert!(response.header("content-length").is_none());
    }

    #[test]
    fn test_prepare_http10() {
        let req = get().with_version(Version::HTTP_10);
        let response = Response::ok("x")
            .with_header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .prepare(&req);
        assert_eq!(response.version(), Version::HTTP_10);
        assert_eq!(response.header("pragma"), Some("no-cache"));
        assert_eq!(response.header("expires"), Some("-1"));
    }

    #[test]
    fn test_set_not_modified() {
        let mut response = Response::json(&json!({"a": 1}))
            .with_header(header::ETAG, HeaderValue::from_static("\"v1\""))
            .with_header(header::LAST_MODIFIED, HeaderValue::from_static("yesterday"));
        response.set_not_modified();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(response.body().is_empty());
        assert!(response.header("content-type").is_none());
        assert!(response.header("last-modified").is_none());
        assert_eq!(response.header("etag"), Some("\"v1\""));
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/login", StatusCode::FOUND);
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.header("location"), Some("/login"));
    }
}
