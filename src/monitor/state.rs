//! Scheduler lifecycle.

use std::fmt;

/// Where the monitor is in its tick cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Nothing received yet.
    Idle,
    /// Buffering messages between ticks.
    Accumulating,
    /// A tick is waiting on the backend.
    Analyzing,
    /// A tick is delivering alerts.
    Dispatching,
    /// Terminal.
    ShuttingDown,
}

impl MonitorState {
    pub fn can_transition_to(self, next: MonitorState) -> bool {
        use MonitorState::*;

        if self == next {
            return self != ShuttingDown;
        }
        matches!(
            (self, next),
            (_, ShuttingDown)
                | (Idle, Accumulating)
                | (Idle, Analyzing)
                | (Accumulating, Analyzing)
                | (Analyzing, Dispatching)
                // Only the tick itself leaves Analyzing: straight back when
                // nothing clears the push threshold.
                | (Analyzing, Accumulating)
                | (Dispatching, Accumulating)
        ) && self != ShuttingDown
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Accumulating => "accumulating",
            MonitorState::Analyzing => "analyzing",
            MonitorState::Dispatching => "dispatching",
            MonitorState::ShuttingDown => "shutting-down",
        };
        write!(f, "{}", name)
    }
}
