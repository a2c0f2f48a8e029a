//! Pipeline stages and the continuation handed to each of them.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

/// A single stage of a [`Pipeline`](super::Pipeline).
///
/// A stage either calls `next.run(passable)` to continue, or returns its own
/// output, which short-circuits every later stage and the destination.
#[async_trait]
pub trait Stage<T, O>: Send + Sync
where
    T: Send + 'static,
    O: Send + 'static,
{
    async fn handle(&self, passable: T, next: Next<T, O>) -> O;
}

/// Shared handle to a type-erased stage.
pub type BoxedStage<T, O> = Arc<dyn Stage<T, O>>;

pub(crate) type Destination<T, O> = Box<dyn FnOnce(T) -> BoxFuture<'static, O> + Send>;

/// Continuation into the rest of the pipeline.
///
/// `run` consumes the continuation, so the remaining stages (and the
/// destination) can be entered at most once.
pub struct Next<T, O> {
    remaining: std::vec::IntoIter<BoxedStage<T, O>>,
    destination: Destination<T, O>,
}

impl<T, O> Next<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
{
    pub(crate) fn new(stages: Vec<BoxedStage<T, O>>, destination: Destination<T, O>) -> Self {
        Self {
            remaining: stages.into_iter(),
            destination,
        }
    }

    /// Number of stages still ahead of the destination.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Hand the passable to the next stage, or to the destination once every
    /// stage has run.
    pub async fn run(mut self, passable: T) -> O {
        match self.remaining.next() {
            Some(stage) => stage.handle(passable, self).await,
            None => (self.destination)(passable).await,
        }
    }
}

impl<T, O> std::fmt::Debug for Next<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.remaining.len())
            .finish()
    }
}

/// Stage backed by an async closure.
pub struct FnStage<F> {
    f: F,
}

#[async_trait]
impl<T, O, F, Fut> Stage<T, O> for FnStage<F>
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(T, Next<T, O>) -> Fut + Send + Sync,
    Fut: Future<Output = O> + Send,
{
    async fn handle(&self, passable: T, next: Next<T, O>) -> O {
        (self.f)(passable, next).await
    }
}

/// Build a stage from an async closure.
///
/// ```rust,ignore
/// let stage = from_fn(|value: u32, next: Next<u32, u32>| async move {
///     next.run(value + 1).await
/// });
/// ```
pub fn from_fn<T, O, F, Fut>(f: F) -> BoxedStage<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
    F: Fn(T, Next<T, O>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = O> + Send + 'static,
{
    Arc::new(FnStage { f })
}
