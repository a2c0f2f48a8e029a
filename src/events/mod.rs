//! Lifecycle events.
//!
//! # Responsibilities
//! - Name the points where the router, kernel and console notify observers
//! - Deliver events synchronously to every registered listener
//!
//! # Design Decisions
//! - Listeners are held in an `ArcSwap` snapshot: dispatch never locks, and
//!   listeners can be added through a shared reference
//! - Listener panics are not caught here; they surface at the caller's
//!   boundary (the kernel for HTTP events)

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::http::{Request, Response};
use crate::routing::Route;

/// Something observable happened.
#[derive(Debug)]
pub enum Event<'a> {
    /// The console application is about to run bootstrappers.
    ConsoleStarting { application: &'a str, version: &'a str },
    CommandStarting {
        command: &'a str,
        arguments: &'a [String],
    },
    CommandFinished { command: &'a str, exit_code: i32 },
    /// A route was matched and is about to run.
    RouteMatched { route: &'a Route, request: &'a Request },
    /// The kernel produced a response.
    RequestHandled {
        request: &'a Request,
        response: &'a Response,
    },
}

impl Event<'_> {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ConsoleStarting { .. } => "console_starting",
            Event::CommandStarting { .. } => "command_starting",
            Event::CommandFinished { .. } => "command_finished",
            Event::RouteMatched { .. } => "route_matched",
            Event::RequestHandled { .. } => "request_handled",
        }
    }
}

pub trait Listener: Send + Sync {
    fn handle(&self, event: &Event<'_>);
}

impl<F> Listener for F
where
    F: Fn(&Event<'_>) + Send + Sync,
{
    fn handle(&self, event: &Event<'_>) {
        self(event)
    }
}

#[derive(Default)]
pub struct EventDispatcher {
    listeners: ArcSwap<Vec<Arc<dyn Listener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every event.
    pub fn listen(&self, listener: impl Listener + 'static) {
        let listener: Arc<dyn Listener> = Arc::new(listener);
        self.listeners.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(listener.clone());
            next
        });
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.load().is_empty()
    }

    pub fn dispatch(&self, event: &Event<'_>) {
        let listeners = self.listeners.load();
        tracing::trace!(event = event.name(), listeners = listeners.len(), "dispatching event");
        for listener in listeners.iter() {
            listener.handle(event);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.load().len())
            .finish()
    }
}
