//! Generic onion pipeline.
//!
//! # Data Flow
//! ```text
//! passable
//!     → stage 1 ──next──▶ stage 2 ──next──▶ ... ──next──▶ destination
//!     ◀──────────────────── output flows back through every stage
//! ```
//!
//! # Design Decisions
//! - Stages run strictly in the order given, one at a time
//! - A stage that returns without calling `next` short-circuits the rest
//! - The destination runs at most once, and only if every stage continued
//! - Global and per-route middleware both run through this one type

mod stage;

pub use stage::{from_fn, BoxedStage, FnStage, Next, Stage};

use std::future::Future;

use futures_util::FutureExt;

/// Builder for one pass of a passable through a list of stages.
pub struct Pipeline<T, O> {
    passable: T,
    stages: Vec<BoxedStage<T, O>>,
}

impl<T, O> Pipeline<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
{
    /// Start a pipeline carrying `passable`.
    pub fn send(passable: T) -> Self {
        Self {
            passable,
            stages: Vec::new(),
        }
    }

    /// Set the stages, replacing any previously given.
    pub fn through<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = BoxedStage<T, O>>,
    {
        self.stages = stages.into_iter().collect();
        self
    }

    /// Append one stage.
    pub fn pipe(mut self, stage: BoxedStage<T, O>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Run every stage, then `destination`.
    pub async fn then<F, Fut>(self, destination: F) -> O
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        let destination = Box::new(move |passable: T| destination(passable).boxed());
        Next::new(self.stages, destination).run(self.passable).await
    }

    /// Run every stage and hand back the passable unchanged by a destination.
    pub async fn then_return(self) -> O
    where
        T: Into<O>,
    {
        self.then(|passable| async move { passable.into() }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn recorder(log: Arc<Mutex<Vec<String>>>, name: &'static str) -> BoxedStage<Vec<String>, Vec<String>> {
        from_fn(move |mut passable: Vec<String>, next: Next<Vec<String>, Vec<String>>| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("before {name}"));
                passable.push(name.to_string());
                let out = next.run(passable).await;
                log.lock().unwrap().push(format!("after {name}"));
                out
            }
        })
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let out = Pipeline::send(Vec::new())
            .through(vec![recorder(log.clone(), "a"), recorder(log.clone(), "b")])
            .pipe(recorder(log.clone(), "c"))
            .then(|mut passable: Vec<String>| async move {
                passable.push("destination".into());
                passable
            })
            .await;

        assert_eq!(out, vec!["a", "b", "c", "destination"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before a", "before b", "before c", "after c", "after b", "after a"]
        );
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let later = Arc::new(AtomicUsize::new(0));
        let destination_calls = Arc::new(AtomicUsize::new(0));

        let counting = {
            let later = later.clone();
            from_fn(move |p: u32, next: Next<u32, u32>| {
                let later = later.clone();
                async move {
                    later.fetch_add(1, Ordering::SeqCst);
                    next.run(p).await
                }
            })
        };
        let stop = from_fn(|_p: u32, _next: Next<u32, u32>| async move { 99 });
        let pass = from_fn(|p: u32, next: Next<u32, u32>| async move { next.run(p + 1).await });

        let calls = destination_calls.clone();
        let out = Pipeline::send(1u32)
            .through(vec![pass, stop, counting])
            .then(move |p| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                p
            })
            .await;

        assert_eq!(out, 99);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(destination_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_pipeline_runs_destination_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let out = Pipeline::<u32, u32>::send(5)
            .then(move |p| async move {
                c.fetch_add(1, Ordering::SeqCst);
                p * 2
            })
            .await;
        assert_eq!(out, 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_then_return() {
        let double = from_fn(|p: u64, next: Next<u64, u64>| async move { next.run(p * 2).await });
        let out = Pipeline::send(21u64).pipe(double).then_return().await;
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn test_next_reports_remaining() {
        let probe = from_fn(|_: (), next: Next<(), usize>| async move { next.remaining() });
        let filler = from_fn(|p: (), next: Next<(), usize>| async move { next.run(p).await });
        let out = Pipeline::send(())
            .through(vec![probe, filler.clone(), filler])
            .then(|_| async { usize::MAX })
            .await;
        assert_eq!(out, 2);
    }
}
