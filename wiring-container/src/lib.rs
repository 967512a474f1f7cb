//! Core container implementation for Wiring.
//!
//! Register bindings on a [`ContainerBuilder`](container::ContainerBuilder),
//! build a [`Container`](container::Container), then resolve by type, by
//! name, or as a collection. Start from [`prelude`].

mod macros;

pub mod binding;
pub mod container;
pub mod error;
pub mod inject;
pub mod key;
pub mod lifecycle;
pub mod path;
pub mod provider;
mod registry;
pub mod settings;
mod wait_graph;

pub use container::prelude;
pub use error::{Error, Result};
pub use key::{DependencyKey, TypeKey};
