//! Messages sent from the poll thread to whoever drives the session

use super::matcher::CellLocation;
use super::poller::PollStats;

/// Progress reported by a running poll loop
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The poll thread has started on a display
    Started { display: usize },
    /// A recognized line matched a row and its cell was highlighted
    Matched { line: String, location: CellLocation },
    /// A recognized line matched nothing
    NotFound { line: String },
    /// An iteration was skipped because capture failed
    IterationSkipped { reason: String },
    /// The loop ended because it was cancelled
    Stopped { stats: PollStats },
    /// The loop ended on a store error
    Failed { error: String },
}

impl SessionEvent {
    /// Whether this is the last event a session will send
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Stopped { .. } | SessionEvent::Failed { .. })
    }
}
