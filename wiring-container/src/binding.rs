//! Bindings: one registered way to produce a value.
//!
//! A [`Binding`] wraps either an already built value (eager) or a
//! constructor invoked on first demand (lazy). Whatever it produces is
//! memoized: once created, every resolution through any alias of the
//! binding observes the same instance, and the constructor never runs
//! again.
//!
//! # Construction slot
//! ```text
//!   Idle ──claim──> Constructing(thread) ──ok──> created (OnceCell set)
//!    ^                     │
//!    └──── error / skip ───┘
//! ```
//! Other threads asking for a binding under construction wait on a
//! condvar. The constructing thread asking again means the graph loops back
//! through an alias, which is reported as a cycle. So is a wait that would
//! close a loop between threads.

use std::any::{Any, TypeId};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::container::Resolver;
use crate::error::{BoxError, Error, Result, is_skipped};
use crate::inject::Constructor;
use crate::key::{DependencyKey, TypeKey};
use crate::wait_graph::{BindingId, with_graph};

/// A type-erased, shareable instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor, as stored in a [`Binding`].
pub type ErasedConstructor = Arc<dyn Fn(&Resolver) -> std::result::Result<Erased, BoxError> + Send + Sync>;

type CastFn = Arc<dyn Fn(Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// How a binding gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// The value already exists; nothing is ever constructed.
    Eager,

    /// A constructor runs on first demand, at most once.
    Lazy,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Eager => write!(f, "Eager"),
            Mode::Lazy => write!(f, "Lazy"),
        }
    }
}

/// A produced value together with its runtime type.
pub struct Erased {
    instance: Instance,
    ty: TypeKey,
}

impl Erased {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::shared(Arc::new(value))
    }

    pub fn shared<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            instance: value,
            ty: TypeKey::of::<T>(),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.ty
    }
}

impl fmt::Debug for Erased {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Erased").field("ty", &self.ty).finish()
    }
}

/// One declared constructor parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// A single value, resolved by type.
    Single(TypeKey),
    /// Every value registered for the type, in registration order.
    All(TypeKey),
    /// The resolver handle itself.
    Resolver,
}

/// One declared constructor result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Value(TypeKey),
    Error(TypeKey),
}

/// The declared shape of a constructor.
///
/// Typed constructors derive it from their closure signature; erased ones
/// spell it out. Either way it is validated once, at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub results: Vec<Output>,
}

impl Signature {
    pub fn new(params: Vec<Param>, results: Vec<Output>) -> Self {
        Self { params, results }
    }

    /// Checks the result shape.
    ///
    /// # Errors
    /// [`Error::InvalidConstructor`] unless the constructor returns a value,
    /// optionally followed by an error.
    pub fn validate(&self) -> Result<TypeKey> {
        let invalid = |cause: String| Error::InvalidConstructor { cause };

        let provides = match self.results.as_slice() {
            [Output::Value(ty)] | [Output::Value(ty), Output::Error(_)] => *ty,
            [Output::Value(_), Output::Value(ty)] => {
                return Err(invalid(format!(
                    "expected second result to be an error, got {ty}"
                )));
            }
            [Output::Error(ty), ..] => {
                return Err(invalid(format!("expected first result to be a value, got error {ty}")));
            }
            results => {
                return Err(invalid(format!(
                    "expected constructor to return one or two values, got {}",
                    results.len()
                )));
            }
        };

        if provides.is_unit() {
            return Err(invalid("constructor must produce a value, not ()".to_string()));
        }
        Ok(provides)
    }
}

/// A cast from a binding's concrete type to the type it is exposed as.
///
/// This is how "is assignable to" is expressed: registering `Foo` as
/// `dyn Baz` means supplying `|foo| foo as Arc<dyn Baz>`.
#[derive(Clone)]
pub struct Exposure {
    from: TypeKey,
    to: TypeKey,
    cast: CastFn,
}

impl Exposure {
    /// Exposes `C` as itself.
    pub fn identity<C: Send + Sync + 'static>() -> Self {
        Self::new::<C, C>(|value| value)
    }

    /// Exposes `C` as `T` through `cast`.
    pub fn new<C, T>(cast: impl Fn(Arc<C>) -> Arc<T> + Send + Sync + 'static) -> Self
    where
        C: Send + Sync + 'static,
        T: ?Sized + Send + Sync + 'static,
    {
        Self {
            from: TypeKey::of::<C>(),
            to: TypeKey::of::<T>(),
            cast: Arc::new(move |instance: Instance| {
                let concrete = instance.downcast::<C>().ok()?;
                Some(Box::new(cast(concrete)) as Box<dyn Any + Send + Sync>)
            }),
        }
    }

    /// Builds an exposure from raw parts.
    ///
    /// `cast` must yield a boxed `Arc<T>` where `T` is the type behind `to`;
    /// anything else surfaces as [`Error::InvalidType`] on resolution.
    pub fn erased(
        from: TypeKey,
        to: TypeKey,
        cast: impl Fn(Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            from,
            to,
            cast: Arc::new(cast),
        }
    }

    pub fn from_type(&self) -> TypeKey {
        self.from
    }

    pub fn to_type(&self) -> TypeKey {
        self.to
    }

    pub(crate) fn apply(&self, instance: Instance) -> Option<Box<dyn Any + Send + Sync>> {
        (self.cast)(instance)
    }
}

impl fmt::Debug for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exposure")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Why a binding did not produce a value.
#[derive(Debug)]
pub(crate) enum ConstructError {
    /// The constructor declined with [`crate::error::Skipped`].
    Skipped,
    /// The constructor failed.
    Failed(BoxError),
    /// The constructing thread came back for the same binding.
    Reentered(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Idle,
    Constructing(ThreadId),
}

struct BindingInner {
    provides: TypeKey,
    mode: Mode,
    signature: Signature,
    constructor: ErasedConstructor,
    instance: OnceCell<Instance>,
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// A registered recipe for one value, shared by every alias it is
/// registered under.
///
/// Cloning a `Binding` clones the handle, not the recipe: both handles
/// construct (at most) once and observe the same instance. Adding the same
/// handle under a type and a name is how one instance gets several aliases
/// when the constructor is a capturing closure.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use wiring_container::prelude::*;
///
/// struct Config { url: String }
///
/// let config = Binding::lazy(|| Ok::<_, Error>(Config { url: "postgres://localhost".into() })).unwrap();
///
/// let container = Container::builder()
///     .add(Bind::<Config>::binding(&config))
///     .add(Bind::<Config>::binding(&config).named("config"))
///     .build();
///
/// let by_type: Arc<Config> = container.get();
/// let by_name: Arc<Config> = container.get_named("config");
/// assert!(Arc::ptr_eq(&by_type, &by_name));
/// assert_eq!(by_type.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Binding {
    inner: Arc<BindingInner>,
}

impl Binding {
    /// Wraps a typed constructor.
    ///
    /// # Errors
    /// [`Error::InvalidConstructor`] if the constructor produces `()`.
    pub fn lazy<Args, F>(ctor: F) -> Result<Self>
    where
        Args: 'static,
        F: Constructor<Args>,
    {
        let signature = F::signature();
        let provides = signature.validate()?;
        let constructor: ErasedConstructor =
            Arc::new(move |resolver: &Resolver| ctor.construct(resolver).map(Erased::new));

        Ok(Self::from_parts(provides, Mode::Lazy, signature, constructor, None))
    }

    /// Wraps an already built value.
    ///
    /// # Errors
    /// [`Error::InvalidConstructor`] if the value is `()`.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Result<Self> {
        Self::shared(Arc::new(value))
    }

    /// Wraps an already built, shared value. Resolution hands out clones of
    /// this very `Arc`.
    ///
    /// # Errors
    /// [`Error::InvalidConstructor`] if the value is `()`.
    pub fn shared<T: Send + Sync + 'static>(value: Arc<T>) -> Result<Self> {
        let provides = TypeKey::of::<T>();
        let signature = Signature::new(vec![], vec![Output::Value(provides)]);
        signature.validate()?;

        let instance: Instance = value;
        let constructor: ErasedConstructor = {
            let instance = instance.clone();
            Arc::new(move |_: &Resolver| {
                Ok(Erased {
                    instance: instance.clone(),
                    ty: provides,
                })
            })
        };

        Ok(Self::from_parts(provides, Mode::Eager, signature, constructor, Some(instance)))
    }

    /// Wraps a type-erased constructor with an explicit signature.
    ///
    /// # Errors
    /// [`Error::InvalidConstructor`] if the signature is malformed or its
    /// value result is not `provides`.
    pub fn erased(
        provides: TypeKey,
        signature: Signature,
        constructor: impl Fn(&Resolver) -> std::result::Result<Erased, BoxError> + Send + Sync + 'static,
    ) -> Result<Self> {
        let declared = signature.validate()?;
        if declared != provides {
            return Err(Error::InvalidConstructor {
                cause: format!("declared result {declared} does not match provided type {provides}"),
            });
        }
        Ok(Self::from_parts(provides, Mode::Lazy, signature, Arc::new(constructor), None))
    }

    fn from_parts(
        provides: TypeKey,
        mode: Mode,
        signature: Signature,
        constructor: ErasedConstructor,
        instance: Option<Instance>,
    ) -> Self {
        Self {
            inner: Arc::new(BindingInner {
                provides,
                mode,
                signature,
                constructor,
                instance: instance.map_or_else(OnceCell::new, OnceCell::with_value),
                slot: Mutex::new(Slot::Idle),
                ready: Condvar::new(),
            }),
        }
    }

    pub fn provides(&self) -> TypeKey {
        self.inner.provides
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Returns `true` once the binding holds its instance.
    pub fn is_created(&self) -> bool {
        self.inner.instance.get().is_some()
    }

    /// Identity comparison: `true` if both handles share one recipe.
    pub fn ptr_eq(&self, other: &Binding) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn id(&self) -> BindingId {
        binding_id(&self.inner)
    }

    pub(crate) fn instance(&self) -> Option<Instance> {
        self.inner.instance.get().cloned()
    }

    /// Returns the memoized instance, constructing it first if needed.
    ///
    /// `resolver` is scoped to a path whose last key is the request that
    /// led here.
    pub(crate) fn get_or_create(&self, resolver: &Resolver) -> std::result::Result<Instance, ConstructError> {
        if let Some(instance) = self.instance() {
            return Ok(instance);
        }

        let me = thread::current().id();
        {
            let mut slot = self.inner.slot.lock();
            loop {
                if let Some(instance) = self.instance() {
                    return Ok(instance);
                }
                match *slot {
                    Slot::Idle => {
                        *slot = Slot::Constructing(me);
                        with_graph(|graph| graph.claim(self.id(), me));
                        break;
                    }
                    Slot::Constructing(owner) if owner == me => {
                        let fallback = DependencyKey::from_type(self.inner.provides);
                        return Err(ConstructError::Reentered(resolver.path().reentered(fallback)));
                    }
                    Slot::Constructing(_) => {
                        if let Err(closing) = with_graph(|graph| graph.try_wait(me, self.id(), self.inner.provides)) {
                            let closing = DependencyKey::from_type(closing);
                            return Err(ConstructError::Reentered(resolver.path().cycle(&closing)));
                        }
                        trace!(ty = %self.inner.provides, "Waiting for construction on another thread");
                        self.inner.ready.wait(&mut slot);
                        with_graph(|graph| graph.done_waiting(me));
                    }
                }
            }
        }

        let _release = SlotRelease(&self.inner);
        debug!(ty = %self.inner.provides, path_len = resolver.path().len(), "Constructing dependency");

        let erased = recover(resolver.settings().catch_panics, || (self.inner.constructor)(resolver))
            .map_err(|err| {
                if is_skipped(&*err) {
                    debug!(ty = %self.inner.provides, "Constructor skipped");
                    ConstructError::Skipped
                } else {
                    ConstructError::Failed(err)
                }
            })?;

        if erased.ty != self.inner.provides {
            return Err(ConstructError::Failed(Box::new(Error::InvalidType {
                key: DependencyKey::from_type(erased.ty),
                expected: self.inner.provides,
            })));
        }

        let instance = self.inner.instance.get_or_init(|| erased.instance).clone();
        debug!(ty = %self.inner.provides, "Dependency created");
        Ok(instance)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("provides", &self.inner.provides)
            .field("mode", &self.inner.mode)
            .field("created", &self.is_created())
            .finish()
    }
}

/// Puts the slot back to idle and wakes waiters, also when the
/// constructor unwinds.
struct SlotRelease<'a>(&'a BindingInner);

impl Drop for SlotRelease<'_> {
    fn drop(&mut self) {
        let mut slot = self.0.slot.lock();
        *slot = Slot::Idle;
        with_graph(|graph| graph.release(binding_id(self.0)));
        self.0.ready.notify_all();
    }
}

fn binding_id(inner: &BindingInner) -> BindingId {
    std::ptr::from_ref(inner) as BindingId
}

/// Runs `f`, turning a panic into an error when `catch` is set.
///
/// A panic carrying an [`Error`], a [`crate::error::Skipped`] or a
/// [`BoxError`] keeps it as the cause; string payloads become
/// [`Error::ConstructorPanic`].
pub(crate) fn recover<R>(catch: bool, f: impl FnOnce() -> std::result::Result<R, BoxError>) -> std::result::Result<R, BoxError> {
    if !catch {
        return f();
    }
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(payload_into_error(payload)),
    }
}

fn payload_into_error(payload: Box<dyn Any + Send>) -> BoxError {
    let payload = match payload.downcast::<Error>() {
        Ok(err) => return err,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<crate::error::Skipped>() {
        Ok(skipped) => return skipped,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<BoxError>() {
        Ok(err) => return *err,
        Err(payload) => payload,
    };

    let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        format!("constructor panicked with a non-string payload ({:?})", (*payload).type_id())
    };
    Box::new(Error::ConstructorPanic { message })
}

/// Identity under which the builder deduplicates bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Identity {
    /// A zero-sized constructor (fn item or non-capturing closure); every
    /// value of such a type is the same function.
    Constructor(TypeId),
    /// A shared value, by pointer.
    Shared(TypeId, usize),
}

impl Identity {
    pub(crate) fn of_constructor<F: 'static>() -> Option<Self> {
        (std::mem::size_of::<F>() == 0).then(|| Identity::Constructor(TypeId::of::<F>()))
    }

    pub(crate) fn of_shared<T: 'static>(value: &Arc<T>) -> Self {
        Identity::Shared(TypeId::of::<T>(), Arc::as_ptr(value) as usize)
    }
}
