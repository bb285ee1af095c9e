//! Core types for the Quarry discovery engine.
//!
//! This crate provides the source supplier (packages and lazily loaded
//! files), byte-offset spans, the application root, and the `quarry.toml`
//! application manifest. Everything downstream (parsing, validation,
//! diagnostics) is built on these types.

mod manifest;
mod paths;
mod source;
mod span;

pub use manifest::{AppConfig, Error, Manifest, QuarryToml, Result};
pub use paths::AppRoot;
pub use source::{File, Package, SOURCE_EXT, load_packages};
pub use span::Span;
