//! # Wiring: an inversion-of-control container
//!
//! Register how each value is built, and let the container build them on
//! demand: every binding is a lazy singleton, dependencies are injected by
//! type, and errors say exactly which link of the chain broke.
//!
//! ```rust
//! use std::sync::Arc;
//! use wiring::prelude::*;
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Database {
//!     config: Arc<Config>,
//! }
//!
//! fn database(config: Arc<Config>) -> Result<Database> {
//!     Ok(Database { config })
//! }
//!
//! let container = Container::builder()
//!     .add(Bind::value(Config { url: "postgres://localhost".into() }))
//!     .add(Bind::lazy(database))
//!     .build();
//!
//! let db: Arc<Database> = container.get();
//! assert_eq!(db.config.url, "postgres://localhost");
//! ```

pub use wiring_container::*;
pub use wiring_support::rendering;
