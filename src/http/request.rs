//! Inbound request value.
//!
//! # Responsibilities
//! - Carry method, URI, headers and the buffered body of one request
//! - Apply the `_method` override convention for POST forms when enabled
//! - Expose the decoded route path and host used for matching
//! - Hold the route parameters and a slot shared by every clone of the
//!   request (resolved route, lifecycle state)
//!
//! # Design Decisions
//! - Clones share the slot, so the route recorded during dispatch is still
//!   visible to the kernel when it runs terminate hooks
//! - Parameters are per clone: middleware that rewrites a parameter passes
//!   the change downstream only

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use axum::body::Bytes;
use axum::http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, Uri, Version};
use uuid::Uuid;

use crate::http::kernel::KernelState;
use crate::routing::{Parameters, Route};

/// Header name for the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";
const METHOD_OVERRIDE_FIELD: &str = "_method";

#[derive(Debug, Default)]
struct RequestSlot {
    route: ArcSwapOption<Route>,
    state: AtomicU8,
}

/// One HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    method_override: bool,
    parameters: Parameters,
    slot: Arc<RequestSlot>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            method_override: false,
            parameters: Parameters::new(),
            slot: Arc::new(RequestSlot::default()),
        }
    }

    /// Build from `http` request parts and a buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let mut request = Self::new(parts.method, parts.uri);
        request.version = parts.version;
        request.headers = parts.headers;
        request.body = body;
        request
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Honor `_method` (form body or query string) on POST requests.
    pub fn enable_method_override(&mut self) {
        self.method_override = true;
    }

    /// Method as seen by routing, after any override.
    ///
    /// For POST requests the `X-HTTP-Method-Override` header always applies;
    /// the `_method` field only once [`enable_method_override`] was called.
    ///
    /// [`enable_method_override`]: Request::enable_method_override
    pub fn method(&self) -> Method {
        if self.method != Method::POST {
            return self.method.clone();
        }

        let header = self
            .headers
            .get(METHOD_OVERRIDE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let field = || {
            if !self.method_override {
                return None;
            }
            self.form_value(METHOD_OVERRIDE_FIELD)
                .or_else(|| self.query(METHOD_OVERRIDE_FIELD))
        };

        header
            .or_else(field)
            .and_then(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
            .unwrap_or(Method::POST)
    }

    /// Method as received on the wire.
    pub fn real_method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
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

    /// Path without surrounding slashes, or `/` for the root.
    pub fn path(&self) -> String {
        let trimmed = self.uri.path().trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    }

    /// Percent-decoded path with one leading slash, as routes match it.
    pub fn route_path(&self) -> String {
        let path = self.path();
        if path == "/" {
            return path;
        }
        let decoded = urlencoding::decode(&path)
            .map(|d| d.into_owned())
            .unwrap_or(path);
        format!("/{decoded}")
    }

    /// Lowercase host without port, from the URI authority or `Host` header.
    pub fn host(&self) -> String {
        let raw = self
            .uri
            .host()
            .map(str::to_string)
            .or_else(|| self.header(header::HOST.as_str()).map(str::to_string))
            .unwrap_or_default();

        let host = if raw.starts_with('[') {
            // IPv6 literal: keep the brackets, drop the port.
            raw.split_inclusive(']').next().unwrap_or_default().to_string()
        } else {
            raw.split(':').next().unwrap_or_default().to_string()
        };
        host.to_ascii_lowercase()
    }

    /// Query string value.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Value from a urlencoded form body.
    pub fn form_value(&self, key: &str) -> Option<String> {
        let is_form = self
            .header(header::CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if !is_form {
            return None;
        }
        url::form_urlencoded::parse(&self.body)
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Form body value, falling back to the query string.
    pub fn input(&self, key: &str) -> Option<String> {
        self.form_value(key).or_else(|| self.query(key))
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Whether the client asked for a JSON answer.
    pub fn expects_json(&self) -> bool {
        let ajax = self
            .header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
        let wants_json = self
            .header(header::ACCEPT.as_str())
            .and_then(|accept| accept.split(',').next())
            .is_some_and(|first| first.contains("/json") || first.contains("+json"));
        ajax || wants_json
    }

    /// The request ID header, if one was assigned.
    pub fn request_id(&self) -> Option<Uuid> {
        self.header(X_REQUEST_ID).and_then(|v| Uuid::parse_str(v).ok())
    }

    /// Route parameter value.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name)
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    pub(crate) fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    /// Route resolved for this request, once dispatch has matched one.
    pub fn route(&self) -> Option<Arc<Route>> {
        self.slot.route.load_full()
    }

    pub fn set_route(&self, route: Arc<Route>) {
        self.slot.route.store(Some(route));
    }

    /// Current position in the kernel lifecycle.
    pub fn lifecycle(&self) -> KernelState {
        KernelState::from(self.slot.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_lifecycle(&self, state: KernelState) {
        self.slot.state.store(state as u8, Ordering::Release);
    }
}

impl From<axum::http::Request<Bytes>> for Request {
    fn from(request: axum::http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_form(uri: &'static str, body: &'static str) -> Request {
        Request::new(Method::POST, Uri::from_static(uri))
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .with_body(body)
    }

    #[test]
    fn test_paths() {
        let req = Request::new(Method::GET, Uri::from_static("/users/7/"));
        assert_eq!(req.path(), "users/7");
        assert_eq!(req.route_path(), "/users/7");

        let root = Request::new(Method::GET, Uri::from_static("/"));
        assert_eq!(root.path(), "/");
        assert_eq!(root.route_path(), "/");

        let encoded = Request::new(Method::GET, Uri::from_static("/files/a%20b"));
        assert_eq!(encoded.route_path(), "/files/a b");
    }

    #[test]
    fn test_host_from_authority_or_header() {
        let req = Request::new(Method::GET, Uri::from_static("http://API.Example.com:8080/x"));
        assert_eq!(req.host(), "api.example.com");

        let req = Request::new(Method::GET, Uri::from_static("/x"))
            .with_header(header::HOST, HeaderValue::from_static("shop.test:3000"));
        assert_eq!(req.host(), "shop.test");

        let req = Request::new(Method::GET, Uri::from_static("/x"))
            .with_header(header::HOST, HeaderValue::from_static("[::1]:8080"));
        assert_eq!(req.host(), "[::1]");
    }

    #[test]
    fn test_method_override_requires_opt_in() {
        let mut req = post_form("/users/1", "_method=put&name=x");
        assert_eq!(req.method(), Method::POST);

        req.enable_method_override();
        assert_eq!(req.method(), Method::PUT);
        assert_eq!(req.real_method(), &Method::POST);
    }

    #[test]
    fn test_method_override_sources() {
        let mut req = Request::new(Method::POST, Uri::from_static("/users/1?_method=DELETE"));
        req.enable_method_override();
        assert_eq!(req.method(), Method::DELETE);

        let req = Request::new(Method::POST, Uri::from_static("/users/1"))
            .with_header(
                HeaderName::from_static(METHOD_OVERRIDE_HEADER),
                HeaderValue::from_static("patch"),
            );
        assert_eq!(req.method(), Method::PATCH);

        let mut get = Request::new(Method::GET, Uri::from_static("/x?_method=DELETE"));
        get.enable_method_override();
        assert_eq!(get.method(), Method::GET);
    }

    #[test]
    fn test_expects_json() {
        let req = Request::new(Method::GET, Uri::from_static("/"))
            .with_header(header::ACCEPT, HeaderValue::from_static("application/json, text/plain"));
        assert!(req.expects_json());

        let req = Request::new(Method::GET, Uri::from_static("/"))
            .with_header(header::ACCEPT, HeaderValue::from_static("text/html"));
        assert!(!req.expects_json());
    }

    #[test]
    fn test_query_and_input() {
        let req = post_form("/search?q=rust&page=2", "page=3");
        assert_eq!(req.query("q").as_deref(), Some("rust"));
        assert_eq!(req.input("page").as_deref(), Some("3"));
        assert_eq!(req.input("q").as_deref(), Some("rust"));
        assert_eq!(req.input("missing"), None);
    }

    #[test]
    fn test_slot_shared_between_clones() {
        let req = Request::new(Method::GET, Uri::from_static("/"));
        let clone = req.clone();
        clone.set_lifecycle(KernelState::RouteDispatching);
        assert_eq!(req.lifecycle(), KernelState::RouteDispatching);
        assert!(req.route().is_none());
    }
}
