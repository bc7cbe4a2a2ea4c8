//! Configuration module for extraction runs
//!
//! This module provides the `ScrapeConfig` struct and its type-safe builder
//! for configuring runs with validation and sensible defaults.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{ScrapeConfigBuilder, WithStartUrl};
pub use types::ScrapeConfig;
