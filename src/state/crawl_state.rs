//! Crawl lifecycle states
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |           |
//!           v           v
//!     Completed     Aborted
//! ```
//!
//! `Completed` and `Aborted` are terminal. A paused crawl can be aborted but
//! only completes after it is resumed.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Session created, workers not started
    Idle,

    /// Workers are dequeuing and fetching
    Running,

    /// Workers hold at their next checkpoint until resumed
    Paused,

    /// Frontier drained with nothing in flight
    Completed,

    /// Cancelled by request or by the duration cap
    Aborted,
}

impl CrawlState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns true if the transition `self -> next` is legal
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Idle, Aborted)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Aborted)
                | (Paused, Running)
                | (Paused, Aborted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
