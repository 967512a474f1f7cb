//! # Wiring Support
//!
//! Shared helpers for the wiring IoC crates.
//!
//! This crate provides:
//! - Text rendering for diagnostics (resolution paths, type names)
//! - "Did you mean" suggestions for missing types and names

pub mod rendering;
