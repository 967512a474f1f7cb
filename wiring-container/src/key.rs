//! Dependency identification keys.
//!
//! [`TypeKey`] is the capability descriptor of a type: a [`TypeId`] plus a
//! readable name. [`DependencyKey`] pairs it with an optional logical name
//! and identifies a single resolution request.

use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use wiring_support::rendering::shorten_type_name;

/// Identifies a type, sized or not (`dyn Trait` works too).
///
/// Equality and hashing only look at the [`TypeId`].
///
/// # Examples
/// ```
/// use wiring_container::key::TypeKey;
///
/// let key = TypeKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(format!("{key:#}"), "String");
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the fully qualified type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` for the unit type, which no constructor may produce.
    #[inline]
    pub fn is_unit(&self) -> bool {
        self.type_id == TypeId::of::<()>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

/// `{}` renders the full type name, `{:#}` the shortened one.
impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str(&shorten_type_name(self.type_name))
        } else {
            f.write_str(self.type_name)
        }
    }
}

/// Identifies one resolution request: a type and an optional name.
///
/// Two keys are equal if both the type and the name match. Keys are what
/// the resolution path is made of, so they are also what cycle reports and
/// error messages print.
///
/// # Examples
/// ```
/// use wiring_container::key::DependencyKey;
///
/// let key = DependencyKey::of::<String>();
/// assert_eq!(key.name(), None);
///
/// let primary = DependencyKey::named::<String>("primary_db");
/// let replica = DependencyKey::named::<String>("replica_db");
/// assert_ne!(primary, replica);
/// assert_eq!(primary.to_string(), "alloc::string::String (name: primary_db)");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DependencyKey {
    ty: TypeKey,
    name: Option<Cow<'static, str>>,
}

impl DependencyKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_type(TypeKey::of::<T>())
    }

    /// Creates a named key for type `T`.
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            name: Some(name.into()),
        }
    }

    #[inline]
    pub fn from_type(ty: TypeKey) -> Self {
        Self { ty, name: None }
    }

    /// Same name, different type.
    #[inline]
    pub fn with_type(&self, ty: TypeKey) -> Self {
        Self {
            ty,
            name: self.name.clone(),
        }
    }

    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.ty.type_name()
    }

    /// Returns the optional name for named bindings.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl fmt::Debug for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "DependencyKey({}, name={:?})", self.ty.type_name(), name),
            None => write!(f, "DependencyKey({})", self.ty.type_name()),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.ty, f)?;
        if let Some(name) = &self.name {
            write!(f, " (name: {name})")?;
        }
        Ok(())
    }
}
