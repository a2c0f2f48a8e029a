//! Route-model binding as a middleware stage.

use std::sync::Arc;

use async_trait::async_trait;

use crate::http::middleware::{HttpNext, Middleware};
use crate::http::{Request, Response};
use crate::routing::BindingRegistry;
use crate::Result;

/// Replaces route parameters with their bound objects before the action
/// runs. Does nothing for requests without a matched route.
#[derive(Debug, Clone)]
pub struct SubstituteBindings {
    bindings: Arc<BindingRegistry>,
}

impl SubstituteBindings {
    pub fn new(bindings: Arc<BindingRegistry>) -> Self {
        Self { bindings }
    }
}

#[async_trait]
impl Middleware for SubstituteBindings {
    async fn handle(&self, mut request: Request, next: HttpNext, _parameters: &[String]) -> Result<Response> {
        if let Some(route) = request.route() {
            self.bindings.substitute(&route, request.parameters_mut()).await?;
        }
        next.run(request).await
    }
}
