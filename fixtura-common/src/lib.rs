//! # fixtura Common Library
//!
//! Shared code for the fixtura suite harness:
//! - Error type and result alias
//! - Harness configuration loading (TOML file, environment overrides)
//! - SQLite connection factory
//! - Declarative schema definitions, introspection and synchronization
//! - Destructive reset and clean-state verification

pub mod config;
pub mod db;
pub mod error;

pub use config::{DatabaseConfig, ExecutionMode, HarnessConfig, LifecycleConfig, ResetPolicy};
pub use error::{Error, Result};
