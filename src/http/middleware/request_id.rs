//! Request ID middleware.
//!
//! # Responsibilities
//! - Assign a UUID v4 `x-request-id` to requests that arrive without one
//! - Echo the ID on the response
//!
//! # Design Decisions
//! - An incoming ID is kept as sent, even when it is not a UUID, so IDs
//!   from upstream proxies survive end to end

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::http::middleware::{HttpNext, Middleware};
use crate::http::request::X_REQUEST_ID;
use crate::http::{Request, Response};
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(&self, mut request: Request, next: HttpNext, _parameters: &[String]) -> Result<Response> {
        let name = HeaderName::from_static(X_REQUEST_ID);

        let id = match request.headers().get(&name) {
            Some(existing) => existing.clone(),
            None => {
                let generated = Uuid::new_v4().to_string();
                match HeaderValue::from_str(&generated) {
                    Ok(value) => {
                        request.headers_mut().insert(name.clone(), value.clone());
                        value
                    }
                    Err(_) => return next.run(request).await,
                }
            }
        };

        let mut response = next.run(request).await?;
        response.headers_mut().entry(name).or_insert(id);
        Ok(response)
    }
}
