//! Application lifecycle collaborator.
//!
//! # Responsibilities
//! - Run bootstrappers once per application
//! - Run terminating callbacks at the end of every request
//!
//! # Design Decisions
//! - Bootstrapping is serialized; the bootstrapped flag is only set after
//!   every bootstrapper succeeded, so a failed bootstrap is retried by the
//!   next request
//! - The flag is readable without the bootstrap lock, so bootstrappers may
//!   query the application they run against

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::error::Result;

/// One bootstrapping step.
pub trait Bootstrapper: Send + Sync {
    fn name(&self) -> &str;
    fn bootstrap(&self, app: &dyn Application) -> Result<()>;
}

struct FnBootstrapper<F> {
    name: String,
    f: F,
}

impl<F> Bootstrapper for FnBootstrapper<F>
where
    F: Fn(&dyn Application) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn bootstrap(&self, app: &dyn Application) -> Result<()> {
        (self.f)(app)
    }
}

/// Build a bootstrapper from a closure.
pub fn bootstrapper_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Bootstrapper>
where
    F: Fn(&dyn Application) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(FnBootstrapper { name: name.into(), f })
}

pub trait Application: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn has_been_bootstrapped(&self) -> bool;

    /// Run `bootstrappers` in order unless already bootstrapped.
    fn bootstrap_with(&self, bootstrappers: &[Arc<dyn Bootstrapper>]) -> Result<()>;

    /// End-of-request hook.
    fn terminate(&self);
}

type TerminatingCallback = Arc<dyn Fn() + Send + Sync>;

pub struct DefaultApplication {
    name: String,
    version: String,
    bootstrapped: AtomicBool,
    bootstrapping: Mutex<()>,
    terminating: ArcSwap<Vec<TerminatingCallback>>,
}

impl DefaultApplication {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            bootstrapped: AtomicBool::new(false),
            bootstrapping: Mutex::new(()),
            terminating: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Register a callback run by every `terminate`.
    pub fn terminating<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: TerminatingCallback = Arc::new(callback);
        self.terminating.rcu(|current| {
            let mut next = current.as_ref().clone();
            next.push(callback.clone());
            next
        });
    }
}

impl Default for DefaultApplication {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }
}

impl Application for DefaultApplication {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn has_been_bootstrapped(&self) -> bool {
        self.bootstrapped.load(Ordering::Acquire)
    }

    fn bootstrap_with(&self, bootstrappers: &[Arc<dyn Bootstrapper>]) -> Result<()> {
        let _guard = self
            .bootstrapping
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.has_been_bootstrapped() {
            return Ok(());
        }

        for bootstrapper in bootstrappers {
            tracing::debug!(bootstrapper = bootstrapper.name(), "bootstrapping");
            bootstrapper.bootstrap(self)?;
        }

        self.bootstrapped.store(true, Ordering::Release);
        tracing::info!(application = %self.name, count = bootstrappers.len(), "application bootstrapped");
        Ok(())
    }

    fn terminate(&self) {
        for callback in self.terminating.load().iter() {
            callback();
        }
    }
}

impl std::fmt::Debug for DefaultApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultApplication")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("bootstrapped", &self.has_been_bootstrapped())
            .finish()
    }
}
