//! Handler return values and their normalization into responses.

use std::fmt;

use axum::body::Bytes;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::{Request, Response};
use crate::Result;

/// A value that knows how to turn itself into a reply for a request.
pub trait Responsable: Send {
    fn to_response(self: Box<Self>, request: &Request) -> Result<Reply>;
}

/// Anything a route action may return.
pub enum Reply {
    /// Converted through [`Responsable::to_response`] first.
    Responsable(Box<dyn Responsable>),
    /// Already a response; passed through.
    Response(Response),
    /// Serialized as a `200` JSON response.
    Json(Value),
    /// Sent as a `200` body with the default content type.
    Body(Bytes),
}

impl Reply {
    /// Serialize any value into a JSON reply.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    pub fn responsable(value: impl Responsable + 'static) -> Self {
        Self::Responsable(Box::new(value))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Responsable(_) => f.write_str("Reply::Responsable(..)"),
            Reply::Response(r) => f.debug_tuple("Reply::Response").field(r).finish(),
            Reply::Json(v) => f.debug_tuple("Reply::Json").field(v).finish(),
            Reply::Body(b) => f.debug_tuple("Reply::Body").field(b).finish(),
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<Map<String, Value>> for Reply {
    fn from(map: Map<String, Value>) -> Self {
        Reply::Json(Value::Object(map))
    }
}

impl From<String> for Reply {
    fn from(body: String) -> Self {
        Reply::Body(body.into())
    }
}

impl From<&'static str> for Reply {
    fn from(body: &'static str) -> Self {
        Reply::Body(Bytes::from_static(body.as_bytes()))
    }
}

impl From<Bytes> for Reply {
    fn from(body: Bytes) -> Self {
        Reply::Body(body)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Body(Bytes::new())
    }
}

impl From<StatusCode> for Reply {
    fn from(status: StatusCode) -> Self {
        Reply::Response(Response::new(status))
    }
}

/// Normalize a reply into a prepared response.
pub fn to_response(request: &Request, reply: Reply) -> Result<Response> {
    let mut response = match reply {
        Reply::Responsable(value) => return to_response(request, value.to_response(request)?),
        Reply::Response(response) => response,
        Reply::Json(value) => Response::json(&value),
        Reply::Body(body) => Response::ok(body),
    };

    if response.status() == StatusCode::NOT_MODIFIED {
        response.set_not_modified();
    }

    Ok(response.prepare(request))
}
