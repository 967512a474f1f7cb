//! Typed constructors.
//!
//! Any `Fn(A1, .., An) -> Result<C, E>` (up to twelve parameters) is a
//! [`Constructor`] as long as every parameter implements [`Inject`]:
//!
//! - `Arc<T>` resolves one `T` by type,
//! - `Vec<Arc<T>>` resolves every `T` in registration order,
//! - [`Resolver`] hands over the resolver itself, for lookups by name or
//!   anything decided at construction time.
//!
//! `T` may be a trait object such as `dyn Repository`.

use std::sync::Arc;

use crate::binding::{Output, Param, Signature};
use crate::container::Resolver;
use crate::error::{BoxError, Result};
use crate::key::TypeKey;
use crate::macros::all_the_tuples;

/// A constructor parameter the container knows how to supply.
pub trait Inject: Sized + 'static {
    /// How the parameter shows up in the constructor signature.
    fn param() -> Param;

    /// Resolves the parameter.
    ///
    /// # Errors
    /// Whatever resolving the underlying request fails with.
    fn inject(resolver: &Resolver) -> Result<Self>;
}

impl<T: ?Sized + Send + Sync + 'static> Inject for Arc<T> {
    fn param() -> Param {
        Param::Single(TypeKey::of::<T>())
    }

    fn inject(resolver: &Resolver) -> Result<Self> {
        resolver.try_get::<T>()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Inject for Vec<Arc<T>> {
    fn param() -> Param {
        Param::All(TypeKey::of::<T>())
    }

    fn inject(resolver: &Resolver) -> Result<Self> {
        resolver.try_get_all::<T>()
    }
}

impl Inject for Resolver {
    fn param() -> Param {
        Param::Resolver
    }

    fn inject(resolver: &Resolver) -> Result<Self> {
        Ok(resolver.clone())
    }
}

/// A function the container can call to produce `Self::Output`.
///
/// Implemented for closures and fn items; `Args` is the tuple of parameter
/// types and only exists to tell the arities apart.
pub trait Constructor<Args>: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn signature() -> Signature;

    /// Resolves the parameters, then calls the function.
    ///
    /// # Errors
    /// A parameter failed to resolve, or the function itself failed.
    fn construct(&self, resolver: &Resolver) -> std::result::Result<Self::Output, BoxError>;
}

macro_rules! impl_constructor {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, C, E, $($ty,)*> Constructor<($($ty,)*)> for F
        where
            F: Fn($($ty,)*) -> std::result::Result<C, E> + Send + Sync + 'static,
            C: Send + Sync + 'static,
            E: Into<BoxError> + 'static,
            $( $ty: Inject, )*
        {
            type Output = C;

            fn signature() -> Signature {
                Signature::new(
                    vec![$( $ty::param(), )*],
                    vec![Output::Value(TypeKey::of::<C>()), Output::Error(TypeKey::of::<E>())],
                )
            }

            fn construct(&self, resolver: &Resolver) -> std::result::Result<C, BoxError> {
                $( let $ty = $ty::inject(resolver)?; )*
                self($($ty,)*).map_err(Into::into)
            }
        }
    };
}

all_the_tuples!(impl_constructor);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Foo;
    struct Bar;

    fn signature_of<Args: 'static, F: Constructor<Args>>(_: &F) -> Signature {
        F::signature()
    }

    #[test]
    fn signature_lists_params_in_order() {
        let ctor = |_: Arc<Foo>, _: Vec<Arc<Bar>>, _: Resolver| Ok::<_, Error>(Foo);
        let signature = signature_of(&ctor);

        assert_eq!(
            signature.params,
            vec![
                Param::Single(TypeKey::of::<Foo>()),
                Param::All(TypeKey::of::<Bar>()),
                Param::Resolver,
            ]
        );
        assert_eq!(
            signature.results,
            vec![Output::Value(TypeKey::of::<Foo>()), Output::Error(TypeKey::of::<Error>())]
        );
    }

    #[test]
    fn trait_object_params() {
        trait Repo: Send + Sync {}
        let ctor = |_: Arc<dyn Repo>| Ok::<_, std::io::Error>(Bar);

        assert_eq!(signature_of(&ctor).params, vec![Param::Single(TypeKey::of::<dyn Repo>())]);
    }
}
