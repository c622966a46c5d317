//! # Prov Common Library
//!
//! Shared code for the provenance tooling crates including:
//! - Error types
//! - Bootstrap configuration loading (TOML)
//! - Cache file location resolution
//! - Logging initialization
//! - UUID helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod uuid_utils;

pub use error::{Error, Result};
