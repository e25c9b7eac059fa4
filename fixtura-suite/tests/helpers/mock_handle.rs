//! Scriptable resource handle for lifecycle tests
//!
//! Every call is counted and appended to a shared event log, so tests can
//! assert both "exactly once" and "strictly before/after" properties.

use async_trait::async_trait;
use fixtura_common::{Error, ResetPolicy};
use fixtura_suite::ResourceHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a handle operation behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    /// Never completes on its own (exercises timeouts)
    Hang,
}

/// Shared, cloneable view of everything the mock and the tests did
#[derive(Clone, Default)]
pub struct Probe {
    events: Arc<Mutex<Vec<String>>>,
    resets: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct MockHandle {
    probe: Probe,
    reset: Behavior,
    close: Behavior,
}

impl MockHandle {
    pub fn new(probe: &Probe) -> Self {
        Self {
            probe: probe.clone(),
            reset: Behavior::Succeed,
            close: Behavior::Succeed,
        }
    }

    pub fn reset_behavior(mut self, behavior: Behavior) -> Self {
        self.reset = behavior;
        self
    }

    pub fn close_behavior(mut self, behavior: Behavior) -> Self {
        self.close = behavior;
        self
    }
}

#[async_trait]
impl ResourceHandle for MockHandle {
    fn resource_id(&self) -> String {
        "mock://store".to_string()
    }

    async fn reset(&self, _policy: &ResetPolicy) -> fixtura_common::Result<()> {
        self.probe.resets.fetch_add(1, Ordering::SeqCst);
        match self.reset {
            Behavior::Succeed => {
                self.probe.record("reset");
                Ok(())
            }
            Behavior::Fail => Err(Error::Unreachable("connection refused".to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    async fn close(&self) -> fixtura_common::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.probe.record("close");
        match self.close {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(Error::ResourceGone("store vanished".to_string())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}
