//! Error types for container operations.
//!
//! Registration errors are returned straight from the builder. Resolution
//! errors are wrapped once per level of the dependency stack, so the
//! rendered message reads as a breadcrumb trail from the outermost request
//! down to the root cause:
//!
//! ```text
//! could not create dependency app::Service, cause:
//! could not create dependency app::Database, cause:
//! connection refused
//! ```

use std::error::Error as StdError;
use std::fmt;

use wiring_support::rendering::render_chain;

use crate::key::{DependencyKey, TypeKey};

/// Any error a constructor or lifecycle hook may report.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A constructor signature the container cannot call.
    #[error("invalid dependency constructor: {cause}")]
    InvalidConstructor { cause: String },

    /// The logical name is already taken by another binding.
    #[error("duplicated dependency name: {name}")]
    DuplicatedName { name: String },

    /// The same binding was added twice under the same type.
    #[error("duplicated registration: {key}")]
    DuplicatedRegistration { key: DependencyKey },

    /// Nothing registered (or nothing willing) to satisfy the request.
    #[error("{}", .0)]
    MissingDependency(MissingDependencyError),

    /// A value does not have the type it was requested or exposed as.
    #[error("could not cast {key} to {expected}")]
    InvalidType { key: DependencyKey, expected: TypeKey },

    /// The resolution path loops back on itself.
    #[error("{}", .0)]
    CyclicDependency(CyclicDependencyError),

    /// Construction of `key` failed; `source` says why.
    #[error("could not create dependency {key}, cause:\n{source}")]
    DependencyCreation {
        key: DependencyKey,
        #[source]
        source: BoxError,
    },

    /// An initialize hook failed.
    #[error("could not initialize dependency: {key}, cause:\n{source}")]
    Initialization {
        key: DependencyKey,
        #[source]
        source: BoxError,
    },

    /// A shutdown hook failed.
    #[error("could not shutdown dependency: {key}, cause:\n{source}")]
    Shutdown {
        key: DependencyKey,
        #[source]
        source: BoxError,
    },

    /// The container is in the wrong lifecycle state for the operation.
    #[error("container lifecycle error: {0}")]
    Lifecycle(LifecycleViolation),

    /// A constructor or hook panicked with a non-error payload.
    #[error("{message}")]
    ConstructorPanic { message: String },
}

/// Discriminant of [`Error`], handy for assertions and matching on
/// [`Error::root_cause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConstructor,
    DuplicatedName,
    DuplicatedRegistration,
    MissingDependency,
    InvalidType,
    CyclicDependency,
    DependencyCreation,
    Initialization,
    Shutdown,
    Lifecycle,
    ConstructorPanic,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConstructor { .. } => ErrorKind::InvalidConstructor,
            Error::DuplicatedName { .. } => ErrorKind::DuplicatedName,
            Error::DuplicatedRegistration { .. } => ErrorKind::DuplicatedRegistration,
            Error::MissingDependency(_) => ErrorKind::MissingDependency,
            Error::InvalidType { .. } => ErrorKind::InvalidType,
            Error::CyclicDependency(_) => ErrorKind::CyclicDependency,
            Error::DependencyCreation { .. } => ErrorKind::DependencyCreation,
            Error::Initialization { .. } => ErrorKind::Initialization,
            Error::Shutdown { .. } => ErrorKind::Shutdown,
            Error::Lifecycle(_) => ErrorKind::Lifecycle,
            Error::ConstructorPanic { .. } => ErrorKind::ConstructorPanic,
        }
    }

    /// Follows the `source()` chain down to the innermost error.
    ///
    /// Returns `self` when there is no cause.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Kind of the innermost container error in the chain.
    ///
    /// Returns `None` when the chain bottoms out in a foreign error, such as
    /// one returned by a user constructor.
    pub fn root_kind(&self) -> Option<ErrorKind> {
        self.root_cause().downcast_ref::<Error>().map(Error::kind)
    }

    pub(crate) fn missing(requested: DependencyKey, suggestions: Vec<String>) -> Self {
        Error::MissingDependency(MissingDependencyError {
            requested,
            suggestions,
        })
    }

    pub(crate) fn creation(key: DependencyKey, source: impl Into<BoxError>) -> Self {
        Error::DependencyCreation {
            key,
            source: source.into(),
        }
    }
}

/// Error when a request cannot be satisfied.
#[derive(Debug)]
pub struct MissingDependencyError {
    /// The dependency that was requested.
    pub requested: DependencyKey,
    /// Registered types with a similar name.
    pub suggestions: Vec<String>,
}

impl fmt::Display for MissingDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing dependency {}", self.requested)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }
        Ok(())
    }
}

/// Error when a resolution path loops back on itself.
///
/// `path` holds the keys under construction, outermost first, and
/// `repeated` the key that closed the loop.
#[derive(Debug)]
pub struct CyclicDependencyError {
    pub path: Vec<DependencyKey>,
    pub repeated: DependencyKey,
}

impl CyclicDependencyError {
    /// Renders the loop as `A -> B -> C -> A`.
    pub fn render_path(&self) -> String {
        let chain: Vec<String> = self
            .path
            .iter()
            .chain(std::iter::once(&self.repeated))
            .map(ToString::to_string)
            .collect();
        render_chain(&chain)
    }
}

impl fmt::Display for CyclicDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cyclic dependency: {}", self.render_path())
    }
}

/// Why a lifecycle transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleViolation {
    #[error("container already initialized")]
    AlreadyInitialized,
    #[error("container already shutdown")]
    AlreadyShutdown,
}

/// Sentinel a constructor reports to decline providing a value.
///
/// Return it as the error (or panic with it) and the binding is treated as
/// absent: single resolution moves on to the next candidate, collection
/// resolution leaves it out. Nothing is memoized, so the next request tries
/// the constructor again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("skipped dependency")]
pub struct Skipped;

/// Returns `true` if `err` or any of its causes is [`Skipped`].
pub(crate) fn is_skipped(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<Skipped>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, Error>;
