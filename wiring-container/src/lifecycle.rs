//! Container lifecycle: initialize and shutdown hooks.
//!
//! ```text
//!   Built ──try_initialize()──> Initialized
//!     │                              │
//!     └──────try_shutdown()──────────┴──> Shutdown
//! ```
//!
//! Each transition happens at most once. Once shut down, the container
//! refuses every further resolution.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::binding::recover;
use crate::container::Container;
use crate::error::{BoxError, Error, LifecycleViolation, Result};
use crate::key::{DependencyKey, TypeKey};

/// A value with setup work to run once the graph is wired.
pub trait Initializable: Send + Sync {
    /// # Errors
    /// Any error aborts [`Container::try_initialize`].
    fn initialize(&self) -> std::result::Result<(), BoxError>;
}

/// A value holding resources to release when the container goes away.
pub trait Shutdownable: Send + Sync {
    /// # Errors
    /// Any error aborts [`Container::try_shutdown`].
    fn shutdown(&self) -> std::result::Result<(), BoxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Built,
    Initialized,
    Shutdown,
}

impl LifecycleState {
    fn advance(&mut self, to: LifecycleState) -> Result<()> {
        match (*self, to) {
            (LifecycleState::Shutdown, _) => Err(Error::Lifecycle(LifecycleViolation::AlreadyShutdown)),
            (LifecycleState::Initialized, LifecycleState::Initialized | LifecycleState::Built) => {
                Err(Error::Lifecycle(LifecycleViolation::AlreadyInitialized))
            }
            _ => {
                *self = to;
                Ok(())
            }
        }
    }
}

impl Container {
    /// Resolves every value registered with
    /// [`initializable`](crate::container::Bind::initializable) and runs
    /// its hook, in registration order.
    ///
    /// The container counts as initialized from the start of the call, even
    /// when a hook fails.
    ///
    /// # Errors
    /// - [`Error::Lifecycle`] if already initialized or shut down.
    /// - Any resolution error for a hook's value.
    /// - [`Error::Initialization`] for the first hook that fails.
    #[instrument(skip(self), name = "container_initialize")]
    pub fn try_initialize(&self) -> Result<()> {
        self.inner().state.lock().advance(LifecycleState::Initialized)?;

        let hooks = self.resolver().resolve_all::<dyn Initializable>()?;
        info!(hooks = hooks.len(), "Initializing container");

        let catch = self.settings().catch_panics;
        for (provides, hook) in hooks {
            recover(catch, || hook.initialize()).map_err(|source| {
                warn!(ty = %provides, error = %source, "Initialize hook failed");
                Error::Initialization {
                    key: DependencyKey::from_type(provides),
                    source,
                }
            })?;
        }

        info!("Container initialized");
        Ok(())
    }

    /// Runs the hook of every value registered with
    /// [`shutdownable`](crate::container::Bind::shutdownable) that has been
    /// created, in registration order. Nothing is constructed.
    ///
    /// # Errors
    /// - [`Error::Lifecycle`] if already shut down.
    /// - [`Error::Shutdown`] for the first hook that fails; later hooks do
    ///   not run.
    #[instrument(skip(self), name = "container_shutdown")]
    pub fn try_shutdown(&self) -> Result<()> {
        self.inner().state.lock().advance(LifecycleState::Shutdown)?;

        let catch = self.settings().catch_panics;
        let mut ran = 0usize;
        for entry in self.inner().registry.by_type(TypeKey::of::<dyn Shutdownable>()) {
            let hook = entry
                .binding
                .instance()
                .and_then(|instance| entry.exposure.apply(instance))
                .and_then(|boxed| boxed.downcast::<Arc<dyn Shutdownable>>().ok());
            let Some(hook) = hook else {
                continue;
            };

            recover(catch, || hook.shutdown()).map_err(|source| {
                warn!(ty = %entry.binding.provides(), error = %source, "Shutdown hook failed");
                Error::Shutdown {
                    key: entry.provides_key(),
                    source,
                }
            })?;
            ran += 1;
        }

        info!(hooks = ran, "Container shut down");
        Ok(())
    }

    /// # Panics
    /// With the rendered error if [`try_initialize`](Container::try_initialize) fails.
    pub fn initialize(&self) {
        self.try_initialize().unwrap_or_else(|err| panic!("{err}"));
    }

    /// # Panics
    /// With the rendered error if [`try_shutdown`](Container::try_shutdown) fails.
    pub fn shutdown(&self) {
        self.try_shutdown().unwrap_or_else(|err| panic!("{err}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions() {
        let mut state = LifecycleState::Built;
        state.advance(LifecycleState::Initialized).unwrap();
        assert_eq!(state, LifecycleState::Initialized);

        let err = state.advance(LifecycleState::Initialized).unwrap_err();
        assert_eq!(err.to_string(), "container lifecycle error: container already initialized");

        state.advance(LifecycleState::Shutdown).unwrap();
        let err = state.advance(LifecycleState::Initialized).unwrap_err();
        assert!(matches!(err, Error::Lifecycle(LifecycleViolation::AlreadyShutdown)));
        assert!(state.advance(LifecycleState::Shutdown).is_err());
    }

    #[test]
    fn shutdown_without_initialize() {
        let mut state = LifecycleState::Built;
        state.advance(LifecycleState::Shutdown).unwrap();
        assert_eq!(state, LifecycleState::Shutdown);
    }
}
