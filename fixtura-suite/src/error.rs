//! Lifecycle error types
//!
//! Initialization errors abort the run before any test executes.
//! Teardown errors are reported next to the suite results and never replace them.

use crate::state::SuiteState;
use std::time::Duration;
use thiserror::Error;

/// `prepare` could not bring the resource to its clean state
#[derive(Error, Debug)]
pub enum ResourceInitializationError {
    /// Resource unreachable, reset failed, or the reset result did not verify
    #[error("Failed to reset {resource}: {source}")]
    Reset {
        resource: String,
        #[source]
        source: fixtura_common::Error,
    },

    /// Reset did not finish within the configured timeout
    #[error("Reset of {resource} did not complete within {timeout:?}")]
    TimedOut { resource: String, timeout: Duration },

    /// `prepare` called outside the `Uninitialized` state
    #[error("prepare is not allowed in state {state}")]
    InvalidState { state: SuiteState },

    /// The handle was already released
    #[error("Resource handle already released")]
    Released,
}

/// `dispose` could not fully release the resource
#[derive(Error, Debug)]
pub enum ResourceTeardownError {
    /// Release reported a failure (resource gone, checkpoint failed, ...)
    #[error("Failed to release {resource}: {source}")]
    Release {
        resource: String,
        #[source]
        source: fixtura_common::Error,
    },

    /// Release did not finish within the configured timeout
    #[error("Release of {resource} did not complete within {timeout:?}")]
    TimedOut { resource: String, timeout: Duration },
}

/// Either lifecycle failure, for callers that handle both the same way
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    Initialization(#[from] ResourceInitializationError),

    #[error(transparent)]
    Teardown(#[from] ResourceTeardownError),

    /// Tests started or finished in the wrong state
    #[error("{operation} is not allowed in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: SuiteState,
    },
}

/// Result type for lifecycle transitions
pub type Result<T> = std::result::Result<T, LifecycleError>;
