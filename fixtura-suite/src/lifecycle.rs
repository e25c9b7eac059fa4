//! Suite Lifecycle Controller
//!
//! Brackets a test suite with a deterministic reset of one shared resource
//! (`prepare`) and a guaranteed release (`dispose`). The controller owns the
//! handle; after `dispose` the handle is dropped and can no longer be reached.
//!
//! `&mut self` on both operations keeps them from running concurrently with
//! each other or with themselves.

use crate::error::{LifecycleError, ResourceInitializationError, ResourceTeardownError};
use crate::handle::ResourceHandle;
use crate::state::SuiteState;
use fixtura_common::{HarnessConfig, LifecycleConfig, ResetPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Result of a successful `dispose`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposeOutcome {
    /// The handle was released by this call
    Released,
    /// An earlier call already disposed the suite; nothing was done
    AlreadyDisposed,
}

/// Owns one resource handle for the duration of one test run
pub struct SuiteLifecycle<H: ResourceHandle> {
    handle: Option<H>,
    resource: String,
    policy: ResetPolicy,
    prepare_timeout: Duration,
    dispose_timeout: Duration,
    state: SuiteState,
}

impl<H: ResourceHandle> SuiteLifecycle<H> {
    /// Controller with default timeouts
    pub fn new(handle: H, policy: ResetPolicy) -> Self {
        let defaults = LifecycleConfig::default();
        Self {
            resource: handle.resource_id(),
            handle: Some(handle),
            policy,
            prepare_timeout: defaults.prepare_timeout(),
            dispose_timeout: defaults.dispose_timeout(),
            state: SuiteState::Uninitialized,
        }
    }

    /// Controller using the reset policy and timeouts from `config`
    pub fn from_config(handle: H, config: &HarnessConfig) -> Self {
        Self::new(handle, config.reset).with_timeouts(
            config.lifecycle.prepare_timeout(),
            config.lifecycle.dispose_timeout(),
        )
    }

    pub fn with_timeouts(mut self, prepare: Duration, dispose: Duration) -> Self {
        self.prepare_timeout = prepare;
        self.dispose_timeout = dispose;
        self
    }

    pub fn state(&self) -> SuiteState {
        self.state
    }

    pub fn policy(&self) -> ResetPolicy {
        self.policy
    }

    pub fn resource_id(&self) -> &str {
        &self.resource
    }

    /// Bring the resource to its clean state.
    ///
    /// On failure the suite stays in `Preparing`: no test may start, and
    /// `dispose` must still be called.
    pub async fn prepare(&mut self) -> Result<(), ResourceInitializationError> {
        if self.state != SuiteState::Uninitialized {
            return Err(ResourceInitializationError::InvalidState { state: self.state });
        }
        let handle = self
            .handle
            .as_ref()
            .ok_or(ResourceInitializationError::Released)?;

        self.state = SuiteState::Preparing;
        info!(
            "Preparing {} (destructive={})",
            self.resource, self.policy.destructive
        );

        match tokio::time::timeout(self.prepare_timeout, handle.reset(&self.policy)).await {
            Ok(Ok(())) => {
                self.state = SuiteState::Ready;
                info!("{} is clean, suite ready", self.resource);
                Ok(())
            }
            Ok(Err(source)) => {
                error!("Prepare failed for {}: {}", self.resource, source);
                Err(ResourceInitializationError::Reset {
                    resource: self.resource.clone(),
                    source,
                })
            }
            Err(_) => {
                error!(
                    "Prepare of {} timed out after {:?}",
                    self.resource, self.prepare_timeout
                );
                Err(ResourceInitializationError::TimedOut {
                    resource: self.resource.clone(),
                    timeout: self.prepare_timeout,
                })
            }
        }
    }

    /// Mark the start of test execution. Only legal once `prepare` succeeded.
    pub fn begin_tests(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            SuiteState::Ready => {
                self.state = SuiteState::TestsRunning;
                debug!("Tests running against {}", self.resource);
                Ok(())
            }
            state => Err(LifecycleError::InvalidTransition {
                operation: "begin_tests",
                state,
            }),
        }
    }

    /// Release the handle. Legal from every state; later calls are no-ops.
    ///
    /// A failed release is returned as an error but still ends in
    /// `Disposed`: there is exactly one release attempt per run.
    pub async fn dispose(&mut self) -> Result<DisposeOutcome, ResourceTeardownError> {
        if self.state == SuiteState::Disposed {
            debug!("{} already disposed", self.resource);
            return Ok(DisposeOutcome::AlreadyDisposed);
        }

        let previous = self.state;
        self.state = SuiteState::Disposing;

        let Some(handle) = self.handle.take() else {
            self.state = SuiteState::Disposed;
            return Ok(DisposeOutcome::AlreadyDisposed);
        };

        info!("Disposing {} (from {})", self.resource, previous);
        let result = tokio::time::timeout(self.dispose_timeout, handle.close()).await;
        drop(handle);
        self.state = SuiteState::Disposed;

        match result {
            Ok(Ok(())) => Ok(DisposeOutcome::Released),
            Ok(Err(source)) => {
                warn!("Teardown of {} failed: {}", self.resource, source);
                Err(ResourceTeardownError::Release {
                    resource: self.resource.clone(),
                    source,
                })
            }
            Err(_) => {
                warn!(
                    "Teardown of {} timed out after {:?}",
                    self.resource, self.dispose_timeout
                );
                Err(ResourceTeardownError::TimedOut {
                    resource: self.resource.clone(),
                    timeout: self.dispose_timeout,
                })
            }
        }
    }
}

impl<H: ResourceHandle> Drop for SuiteLifecycle<H> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!(
                "Suite for {} dropped in state {} without dispose",
                self.resource, self.state
            );
        }
    }
}
