//! Test helper modules for fixtura-suite integration tests
//!
//! - MockHandle: scriptable resource handle with call counters
//! - Probe: shared event log used to check ordering across handle and tests

#![allow(dead_code)]

pub mod mock_handle;

pub use mock_handle::{Behavior, MockHandle, Probe};
