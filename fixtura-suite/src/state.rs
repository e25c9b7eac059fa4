//! Suite lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// `Uninitialized → Preparing → Ready → TestsRunning → Disposing → Disposed`
///
/// `Disposed` is reachable from every state; a failed or timed-out `prepare`
/// leaves the suite in `Preparing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteState {
    Uninitialized,
    Preparing,
    Ready,
    TestsRunning,
    Disposing,
    Disposed,
}

impl SuiteState {
    /// Whether tests may use the resource
    pub fn accepts_tests(&self) -> bool {
        matches!(self, SuiteState::Ready | SuiteState::TestsRunning)
    }

    pub fn is_terminal(&self) -> bool {
        *self == SuiteState::Disposed
    }
}

impl fmt::Display for SuiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuiteState::Uninitialized => "Uninitialized",
            SuiteState::Preparing => "Preparing",
            SuiteState::Ready => "Ready",
            SuiteState::TestsRunning => "TestsRunning",
            SuiteState::Disposing => "Disposing",
            SuiteState::Disposed => "Disposed",
        };
        f.write_str(name)
    }
}
