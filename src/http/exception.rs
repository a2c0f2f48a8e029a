//! Error reporting and rendering at the kernel boundary.

use axum::http::{header, HeaderValue, StatusCode};
use serde_json::json;

use crate::error::{join_methods, Error};
use crate::http::{Request, Response};

/// Turns failures that reached the kernel into log records and responses.
pub trait ExceptionHandler: Send + Sync {
    fn report(&self, error: &Error);

    fn render(&self, request: &Request, error: &Error) -> Response;
}

/// Logs server errors at `error` and client errors at `debug`, renders JSON
/// for clients that ask for it and plain text otherwise.
///
/// Without `debug`, server error messages are replaced by a generic one.
#[derive(Debug, Clone, Default)]
pub struct DefaultExceptionHandler {
    debug: bool,
}

impl DefaultExceptionHandler {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn message(&self, error: &Error, status: StatusCode) -> String {
        if status.is_server_error() && !self.debug {
            return status
                .canonical_reason()
                .unwrap_or("Server Error")
                .to_string();
        }
        match error {
            Error::RouteNotFound { .. } | Error::Binding { .. } => "Not Found".to_string(),
            Error::MethodNotAllowed { .. } => "Method Not Allowed".to_string(),
            other => other.to_string(),
        }
    }
}

impl ExceptionHandler for DefaultExceptionHandler {
    fn report(&self, error: &Error) {
        if error.is_client_error() {
            tracing::debug!(error = %error, status = error.status_code().as_u16(), "client error");
        } else {
            tracing::error!(error = %error, status = error.status_code().as_u16(), "unhandled error");
        }
    }

    fn render(&self, request: &Request, error: &Error) -> Response {
        let status = error.status_code();
        let message = self.message(error, status);

        let mut response = if request.expects_json() {
            let mut body = json!({ "message": message });
            if self.debug {
                body["error"] = json!(format!("{error:?}"));
            }
            Response::json(&body).with_status(status)
        } else {
            Response::text(status, message)
        };

        if let Some(allowed) = error.allowed_methods() {
            if let Ok(value) = HeaderValue::from_str(&join_methods(allowed)) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Uri};

    fn json_request() -> Request {
        Request::new(Method::GET, Uri::from_static("/api/x"))
            .with_header(header::ACCEPT, HeaderValue::from_static("application/json"))
    }

    #[test]
    fn test_renders_json_for_json_clients() {
        let handler = DefaultExceptionHandler::default();
        let err = Error::http(StatusCode::FORBIDDEN, "This action is unauthorized.");
        let response = handler.render(&json_request(), &err);

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["message"], "This action is unauthorized.");
    }

    #[test]
    fn test_hides_server_error_details() {
        let err = Error::Panic("secret".into());
        let request = Request::new(Method::GET, Uri::from_static("/"));

        let response = DefaultExceptionHandler::default().render(&request, &err);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text_body(), "Internal Server Error");

        let response = DefaultExceptionHandler::new(true).render(&request, &err);
        assert!(response.text_body().contains("secret"));
    }

    #[test]
    fn test_method_not_allowed_sets_allow() {
        let err = Error::MethodNotAllowed {
            method: Method::POST,
            path: "/users".into(),
            allowed: vec![Method::GET, Method::HEAD],
        };
        let request = Request::new(Method::POST, Uri::from_static("/users"));
        let response = DefaultExceptionHandler::default().render(&request, &err);

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.header("allow"), Some("GET,HEAD"));
        assert_eq!(response.text_body(), "Method Not Allowed");
    }
}
