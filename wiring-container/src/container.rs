//! # The Container
//!
//! Registration happens on a [`ContainerBuilder`]; resolution on the
//! [`Container`] it builds, and on the [`Resolver`] handed to constructors.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container ──get()──> Resolver (path: [])
//!   add(Bind)                                          │
//!                                     constructor(Arc<A>, Vec<Arc<B>>, Resolver)
//!                                                      │
//!                                               Resolver (path: [X])
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wiring_container::prelude::*;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Config {
//!     name: String,
//! }
//!
//! struct English {
//!     config: Arc<Config>,
//! }
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         format!("hello {}", self.config.name)
//!     }
//! }
//!
//! fn english(config: Arc<Config>) -> Result<English> {
//!     Ok(English { config })
//! }
//!
//! let container = Container::builder()
//!     .add(Bind::value(Config { name: "world".into() }))
//!     .add(Bind::lazy(english).exposed_as(|e: Arc<English>| e as Arc<dyn Greeter>))
//!     .build();
//!
//! let greeter: Arc<dyn Greeter> = container.get();
//! assert_eq!(greeter.greet(), "hello world");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace};
use wiring_support::rendering::{suggest_similar_names, suggest_similar_types};

use crate::binding::{Binding, ConstructError, Exposure, Identity};
use crate::error::{Error, LifecycleViolation, Result};
use crate::inject::Constructor;
use crate::key::{DependencyKey, TypeKey};
use crate::lifecycle::{Initializable, LifecycleState, Shutdownable};
use crate::path::ResolutionPath;
use crate::provider::Provider;
use crate::registry::{Entry, Registry};
use crate::settings::Settings;

// ============================================================
// Bind
// ============================================================

/// Registration options for a value of concrete type `C`.
///
/// Pick a source ([`lazy`](Bind::lazy), [`value`](Bind::value),
/// [`shared`](Bind::shared) or [`binding`](Bind::binding)), then
/// optionally a name, the type it is exposed as, and lifecycle hooks.
#[must_use]
pub struct Bind<C> {
    identity: Option<Identity>,
    binding: Result<Binding>,
    name: Option<Cow<'static, str>>,
    exposure: Exposure,
    capabilities: Vec<Exposure>,
    _concrete: PhantomData<fn() -> C>,
}

impl<C: Send + Sync + 'static> Bind<C> {
    fn from_binding(identity: Option<Identity>, binding: Result<Binding>) -> Self {
        Self {
            identity,
            binding,
            name: None,
            exposure: Exposure::identity::<C>(),
            capabilities: Vec::new(),
            _concrete: PhantomData,
        }
    }

    /// Constructed on first demand.
    ///
    /// Adding the same fn item (or non-capturing closure) again reuses the
    /// first binding, so all its registrations share one instance.
    ///
    /// Only zero-sized constructors are recognized that way. A fn pointer
    /// (`provide as fn() -> _`) or a capturing closure makes a new binding
    /// each time; to alias one of those, add a shared [`Binding`] handle with
    /// [`Bind::binding`] instead.
    pub fn lazy<Args, F>(ctor: F) -> Self
    where
        Args: 'static,
        F: Constructor<Args, Output = C>,
    {
        Self::from_binding(Identity::of_constructor::<F>(), Binding::lazy(ctor))
    }

    /// An already built value. Every `value` call is a distinct binding.
    pub fn value(value: C) -> Self {
        Self::from_binding(None, Binding::value(value))
    }

    /// An already built, shared value. Adding the same `Arc` again reuses
    /// the first binding.
    pub fn shared(value: Arc<C>) -> Self {
        Self::from_binding(Some(Identity::of_shared(&value)), Binding::shared(value))
    }

    /// An existing binding handle, aliased once more.
    ///
    /// The handle must provide `C`, or registration fails with
    /// [`Error::InvalidType`].
    pub fn binding(binding: &Binding) -> Self {
        Self::from_binding(None, Ok(binding.clone()))
    }

    /// Also registers the binding under a logical name.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Exposes the value as `T` instead of `C`.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use wiring_container::prelude::*;
    /// trait Repo: Send + Sync {}
    /// struct Postgres;
    /// impl Repo for Postgres {}
    ///
    /// let container = Container::builder()
    ///     .add(Bind::value(Postgres).exposed_as(|pg: Arc<Postgres>| pg as Arc<dyn Repo>))
    ///     .build();
    ///
    /// assert!(container.try_get::<dyn Repo>().is_ok());
    /// assert!(container.try_get::<Postgres>().is_err());
    /// ```
    pub fn exposed_as<T>(mut self, cast: impl Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.exposure = Exposure::new(cast);
        self
    }

    /// Runs [`Initializable::initialize`] on
    /// [`Container::try_initialize`].
    pub fn initializable(mut self) -> Self
    where
        C: Initializable,
    {
        self.capabilities
            .push(Exposure::new(|value: Arc<C>| value as Arc<dyn Initializable>));
        self
    }

    /// Runs [`Shutdownable::shutdown`] on [`Container::try_shutdown`], if
    /// the value was created by then.
    pub fn shutdownable(mut self) -> Self
    where
        C: Shutdownable,
    {
        self.capabilities
            .push(Exposure::new(|value: Arc<C>| value as Arc<dyn Shutdownable>));
        self
    }
}

// ============================================================
// ContainerBuilder
// ============================================================

/// Collects registrations for a [`Container`].
///
/// Use [`try_add`](ContainerBuilder::try_add) to handle registration
/// errors, or the fluent [`add`](ContainerBuilder::add), which panics on
/// them.
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    registry: Registry,
    settings: Settings,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Shorthand for toggling [`Settings::catch_panics`].
    pub fn catch_panics(mut self, catch: bool) -> Self {
        self.settings.catch_panics = catch;
        self
    }

    /// Registers a binding under its exposed type, and under its name if
    /// it has one.
    ///
    /// # Errors
    /// - [`Error::InvalidConstructor`] for a constructor producing `()`.
    /// - [`Error::InvalidType`] if a [`Bind::binding`] handle does not
    ///   provide the bound type.
    /// - [`Error::DuplicatedName`] if the name is taken.
    /// - [`Error::DuplicatedRegistration`] if the same binding is already
    ///   registered under the same type. A failed type registration also
    ///   releases the name.
    pub fn try_add<C: Send + Sync + 'static>(&mut self, bind: Bind<C>) -> Result<&mut Self> {
        let Bind {
            identity,
            binding,
            name,
            exposure,
            capabilities,
            ..
        } = bind;

        let binding = self.registry.unique_binding(identity, binding)?;
        self.register(binding, name, exposure, capabilities)?;
        Ok(self)
    }

    /// Fluent [`try_add`](ContainerBuilder::try_add).
    ///
    /// # Panics
    /// On any registration error.
    pub fn add<C: Send + Sync + 'static>(mut self, bind: Bind<C>) -> Self {
        if let Err(err) = self.try_add(bind) {
            panic!("{err}");
        }
        self
    }

    /// Registers a binding through a hand-made exposure.
    ///
    /// # Errors
    /// Same as [`try_add`](ContainerBuilder::try_add).
    pub fn try_add_erased(
        &mut self,
        binding: &Binding,
        exposure: Exposure,
        name: Option<Cow<'static, str>>,
    ) -> Result<&mut Self> {
        self.register(binding.clone(), name, exposure, Vec::new())?;
        Ok(self)
    }

    /// Lets a [`Provider`] module register its bindings.
    ///
    /// # Errors
    /// Whatever the provider's registrations fail with.
    pub fn try_add_provider(&mut self, provider: &dyn Provider) -> Result<&mut Self> {
        debug!(provider = provider.name(), "Adding provider");
        provider.register(self)?;
        Ok(self)
    }

    /// Fluent [`try_add_provider`](ContainerBuilder::try_add_provider).
    ///
    /// # Panics
    /// On any registration error.
    pub fn add_provider(mut self, provider: &dyn Provider) -> Self {
        if let Err(err) = self.try_add_provider(provider) {
            panic!("{err}");
        }
        self
    }

    /// Builds a container from everything registered so far.
    ///
    /// The builder stays usable. Containers built from the same builder
    /// share bindings, hence singleton instances, but each has its own
    /// lifecycle state.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(&self) -> Container {
        info!(registered = self.registry.len(), "Building container");

        let container = Container {
            inner: Arc::new(ContainerInner {
                registry: self.registry.snapshot(),
                settings: self.settings,
                state: Mutex::new(LifecycleState::Built),
            }),
        };

        info!("Container built successfully");
        container
    }

    fn register(
        &mut self,
        binding: Binding,
        name: Option<Cow<'static, str>>,
        exposure: Exposure,
        capabilities: Vec<Exposure>,
    ) -> Result<()> {
        let entry = Entry::new(binding.clone(), exposure);

        match name {
            Some(name) => {
                self.registry.register_name(name.clone(), entry.clone())?;
                if let Err(err) = self.registry.register_type(entry) {
                    self.registry.unregister_name(&name);
                    return Err(err);
                }
            }
            None => self.registry.register_type(entry)?,
        }

        for capability in capabilities {
            self.registry
                .register_capability(Entry::new(binding.clone(), capability))?;
        }
        Ok(())
    }
}

// ============================================================
// Container
// ============================================================

pub(crate) struct ContainerInner {
    pub(crate) registry: Registry,
    pub(crate) settings: Settings,
    pub(crate) state: Mutex<LifecycleState>,
}

/// Thread-safe dependency container.
///
/// Cheap to clone; clones share everything, including lifecycle state.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// A resolver for top-level requests.
    pub fn resolver(&self) -> Resolver {
        Resolver {
            inner: self.inner.clone(),
            path: ResolutionPath::root(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn state(&self) -> LifecycleState {
        *self.inner.state.lock()
    }

    pub(crate) fn inner(&self) -> &ContainerInner {
        &self.inner
    }

    /// Resolves one `T`; see [`Resolver::try_get`].
    ///
    /// # Errors
    /// See [`Resolver::try_get`].
    pub fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolver().try_get()
    }

    /// Resolves the binding registered as `name`; see
    /// [`Resolver::try_get_named`].
    ///
    /// # Errors
    /// See [`Resolver::try_get_named`].
    pub fn try_get_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<Arc<T>> {
        self.resolver().try_get_named(name)
    }

    /// Resolves every `T`; see [`Resolver::try_get_all`].
    ///
    /// # Errors
    /// See [`Resolver::try_get_all`].
    pub fn try_get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        self.resolver().try_get_all()
    }

    /// # Panics
    /// With the rendered error if resolution fails.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// # Panics
    /// With the rendered error if resolution fails.
    pub fn get_named<T: ?Sized + Send + Sync + 'static>(&self, name: impl Into<Cow<'static, str>>) -> Arc<T> {
        self.try_get_named(name).unwrap_or_else(|err| panic!("{err}"))
    }

    /// # Panics
    /// With the rendered error if resolution fails.
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.try_get_all().unwrap_or_else(|err| panic!("{err}"))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.inner.registry.len())
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================
// Resolver
// ============================================================

enum Attempt {
    Skipped,
    Failed(Error),
}

/// Resolves dependencies on behalf of one request.
///
/// Constructors receive it by declaring a `Resolver` parameter. It carries
/// the keys under construction, so requests made through it take part in
/// cycle detection.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ContainerInner>,
    path: ResolutionPath,
}

impl Resolver {
    /// Resolves one `T`.
    ///
    /// Candidates are tried in registration order; the first to produce a
    /// value wins. Skipping and failing candidates are passed over.
    ///
    /// # Errors
    /// - [`Error::Lifecycle`] once the container is shut down.
    /// - [`Error::MissingDependency`] if nothing is registered as `T`, or
    ///   every candidate skipped.
    /// - [`Error::CyclicDependency`] if `T` is already being resolved on
    ///   this path.
    /// - [`Error::DependencyCreation`] with the first failure, if no
    ///   candidate succeeded and at least one failed.
    pub fn try_get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let key = DependencyKey::of::<T>();
        trace!(key = %key, depth = self.path.len(), "Resolving");
        self.ensure_active()?;

        self.resolve_one(&key, self.inner.registry.by_type(key.type_key()))
    }

    /// Resolves the binding registered as `name`.
    ///
    /// # Errors
    /// As [`Resolver::try_get`], plus [`Error::InvalidType`] if the binding
    /// is not exposed as `T`.
    pub fn try_get_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: impl Into<Cow<'static, str>>,
    ) -> Result<Arc<T>> {
        let name = name.into();
        let key = DependencyKey::named::<T>(name.clone());
        trace!(key = %key, depth = self.path.len(), "Resolving by name");
        self.ensure_active()?;

        let Some(entry) = self.inner.registry.by_name(&name) else {
            return Err(self.missing(&key));
        };
        let exposed = entry.exposure.to_type();
        if exposed != key.type_key() {
            return Err(Error::InvalidType {
                key: key.with_type(exposed),
                expected: key.type_key(),
            });
        }

        self.resolve_one(&key, std::slice::from_ref(entry))
    }

    /// Resolves every `T`, in registration order.
    ///
    /// Skipping candidates are left out; nothing registered gives an empty
    /// vector.
    ///
    /// # Errors
    /// - [`Error::Lifecycle`] once the container is shut down.
    /// - [`Error::CyclicDependency`] if `T` is already being resolved on
    ///   this path.
    /// - [`Error::DependencyCreation`] for the first candidate that fails.
    pub fn try_get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>> {
        Ok(self
            .resolve_all::<T>()?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }

    /// Panicking [`try_get`](Resolver::try_get).
    ///
    /// # Panics
    /// With the [`Error`] itself as payload, so an enclosing constructor
    /// fails with it intact.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        self.try_get().unwrap_or_else(|err| std::panic::panic_any(err))
    }

    /// # Panics
    /// As [`Resolver::get`].
    pub fn get_named<T: ?Sized + Send + Sync + 'static>(&self, name: impl Into<Cow<'static, str>>) -> Arc<T> {
        self.try_get_named(name)
            .unwrap_or_else(|err| std::panic::panic_any(err))
    }

    /// # Panics
    /// As [`Resolver::get`].
    pub fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.try_get_all()
            .unwrap_or_else(|err| std::panic::panic_any(err))
    }

    /// Keys under construction, outermost first.
    pub fn path(&self) -> &ResolutionPath {
        &self.path
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Every `T` along with the concrete type that produced it.
    pub(crate) fn resolve_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<(TypeKey, Arc<T>)>> {
        let key = DependencyKey::of::<T>();
        trace!(key = %key, depth = self.path.len(), "Resolving all");
        self.ensure_active()?;

        let candidates = self.inner.registry.by_type(key.type_key());
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let path = self.path.extend(&key)?;

        let mut resolved = Vec::with_capacity(candidates.len());
        for entry in candidates {
            match self.attempt::<T>(&key, &path, entry) {
                Ok(value) => resolved.push((entry.binding.provides(), value)),
                Err(Attempt::Skipped) => {
                    trace!(key = %key, ty = %entry.binding.provides(), "Candidate skipped");
                }
                Err(Attempt::Failed(err)) => return Err(err),
            }
        }
        Ok(resolved)
    }

    fn resolve_one<T: ?Sized + Send + Sync + 'static>(&self, key: &DependencyKey, candidates: &[Entry]) -> Result<Arc<T>> {
        if candidates.is_empty() {
            return Err(self.missing(key));
        }
        let path = self.path.extend(key)?;

        let mut first_failure = None;
        for entry in candidates {
            match self.attempt::<T>(key, &path, entry) {
                Ok(value) => return Ok(value),
                Err(Attempt::Skipped) => {
                    trace!(key = %key, ty = %entry.binding.provides(), "Candidate skipped");
                }
                Err(Attempt::Failed(err)) => {
                    debug!(key = %key, ty = %entry.binding.provides(), error = %err, "Candidate failed");
                    first_failure.get_or_insert(err);
                }
            }
        }

        Err(first_failure.unwrap_or_else(|| self.missing(key)))
    }

    fn attempt<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: &DependencyKey,
        path: &ResolutionPath,
        entry: &Entry,
    ) -> std::result::Result<Arc<T>, Attempt> {
        let scoped = Resolver {
            inner: self.inner.clone(),
            path: path.clone(),
        };

        let instance = match entry.binding.get_or_create(&scoped) {
            Ok(instance) => instance,
            Err(ConstructError::Skipped) => return Err(Attempt::Skipped),
            Err(ConstructError::Failed(source)) => {
                return Err(Attempt::Failed(Error::creation(key.clone(), source)));
            }
            Err(ConstructError::Reentered(err)) => return Err(Attempt::Failed(err)),
        };

        entry
            .exposure
            .apply(instance)
            .and_then(|boxed| boxed.downcast::<Arc<T>>().ok())
            .map(|value| *value)
            .ok_or_else(|| {
                let mismatch = Error::InvalidType {
                    key: key.with_type(entry.exposure.to_type()),
                    expected: TypeKey::of::<T>(),
                };
                Attempt::Failed(Error::creation(key.clone(), mismatch))
            })
    }

    fn ensure_active(&self) -> Result<()> {
        if *self.inner.state.lock() == LifecycleState::Shutdown {
            return Err(Error::Lifecycle(LifecycleViolation::AlreadyShutdown));
        }
        Ok(())
    }

    fn missing(&self, key: &DependencyKey) -> Error {
        let max = self.inner.settings.max_suggestions;
        let suggestions = match key.name() {
            Some(name) => suggest_similar_names(name, &self.inner.registry.names(), max),
            None => suggest_similar_types(key.type_name(), &self.inner.registry.type_names(), max),
        };
        Error::missing(key.clone(), suggestions)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").field("path", &self.path.to_vec()).finish()
    }
}

// ============================================================
// Prelude
// ============================================================

pub mod prelude {
    pub use super::{Bind, Container, ContainerBuilder, Resolver};
    pub use crate::binding::{Binding, Mode};
    pub use crate::error::{BoxError, Error, ErrorKind, Result, Skipped};
    pub use crate::key::{DependencyKey, TypeKey};
    pub use crate::lifecycle::{Initializable, LifecycleState, Shutdownable};
    pub use crate::provider::Provider;
    pub use crate::settings::Settings;
}

// ============================================================
// Tests
// ============================================================
