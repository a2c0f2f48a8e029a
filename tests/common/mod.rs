//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::{Method, Uri};
use serde_json::Value;

use switchyard::http::{HttpNext, Middleware, Request, Response};
use switchyard::lifecycle::DefaultApplication;
use switchyard::{Kernel, Router};

/// Ordered record of what ran, shared between middleware and the test.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn request(method: Method, uri: &str) -> Request {
    Request::new(method, uri.parse::<Uri>().unwrap())
}

pub fn kernel(router: Router) -> Kernel {
    Kernel::new(Arc::new(DefaultApplication::default()), Arc::new(router))
}

pub fn json_body(response: &Response) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

/// Middleware that records `name:before`, `name:after` and `name:terminate`.
pub struct Recorder {
    name: String,
    log: Log,
}

impl Recorder {
    pub fn new(name: &str, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
        })
    }

    fn push(&self, event: &str) {
        self.log.lock().unwrap().push(format!("{}:{event}", self.name));
    }
}

#[async_trait]
impl Middleware for Recorder {
    async fn handle(&self, request: Request, next: HttpNext, _parameters: &[String]) -> switchyard::Result<Response> {
        self.push("before");
        let response = next.run(request).await;
        self.push("after");
        response
    }

    async fn terminate(&self, _request: &Request, _response: &Response) {
        self.push("terminate");
    }
}
