//! # fixtura Suite
//!
//! Lifecycle control for one shared stateful resource across a test suite:
//! - `SuiteLifecycle` with `prepare` (deterministic reset) and `dispose` (guaranteed release)
//! - `ResourceHandle` seam and its SQLite implementation
//! - `run_suite`, which brackets a suite so teardown runs on every exit path
//! - Run reports that keep teardown warnings apart from test results

pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod logging;
pub mod report;
pub mod runner;
pub mod state;

pub use error::{LifecycleError, ResourceInitializationError, ResourceTeardownError};
pub use handle::{ResourceHandle, SqliteHandle};
pub use lifecycle::{DisposeOutcome, SuiteLifecycle};
pub use report::{SuiteOutcome, SuiteReport, TeardownStatus, TestResult, TestStatus};
pub use runner::{run_suite, Suite, TestCase};
pub use state::SuiteState;
