//! Provider trait for modules of related registrations.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use wiring_container::prelude::*;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct DatabaseProvider {
//!     url: &'static str,
//! }
//!
//! impl Provider for DatabaseProvider {
//!     fn register(&self, builder: &mut ContainerBuilder) -> Result<()> {
//!         builder.try_add(Bind::value(Database { url: self.url.to_string() }).named("primary"))?;
//!         Ok(())
//!     }
//! }
//!
//! let container = Container::builder()
//!     .add_provider(&DatabaseProvider { url: "postgres://localhost" })
//!     .build();
//!
//! let db: Arc<Database> = container.get_named("primary");
//! assert_eq!(db.url, "postgres://localhost");
//! ```

use crate::container::ContainerBuilder;
use crate::error::Result;

/// A module that registers related bindings.
///
/// Split registrations by domain (storage, auth, mail, ...) and add each
/// module with [`ContainerBuilder::add_provider`].
pub trait Provider: Send + Sync {
    /// Registers this module's bindings.
    ///
    /// # Errors
    /// The first registration error; bindings added before it stay.
    fn register(&self, builder: &mut ContainerBuilder) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Bind, Container};
    use crate::error::ErrorKind;
    use std::sync::Arc;

    struct Greeting(&'static str);

    struct GreetingProvider;

    impl Provider for GreetingProvider {
        fn register(&self, builder: &mut ContainerBuilder) -> Result<()> {
            builder
                .try_add(Bind::value(Greeting("hello")))?
                .try_add(Bind::value(Greeting("salom")).named("uz"))?;
            Ok(())
        }
    }

    #[test]
    fn provider_registers_bindings() {
        let container = Container::builder().add_provider(&GreetingProvider).build();

        let all: Vec<Arc<Greeting>> = container.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "hello");
        assert_eq!(container.get_named::<Greeting>("uz").0, "salom");
    }

    #[test]
    fn provider_errors_surface() {
        let mut builder = Container::builder();
        builder.try_add_provider(&GreetingProvider).unwrap();

        let err = builder.try_add_provider(&GreetingProvider).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicatedName);
    }

    #[test]
    fn provider_has_name() {
        assert!(GreetingProvider.name().contains("GreetingProvider"));
    }
}
