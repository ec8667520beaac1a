//! Pipeline states.

use std::fmt;

/// Stage of one request. Variants are declared in pipeline order, so the
/// derived `Ord` is the order in which they may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    Received,
    Authenticating,
    Routing,
    Forwarding,
    Completed,
    Rejected,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Received => "received",
            PipelineState::Authenticating => "authenticating",
            PipelineState::Routing => "routing",
            PipelineState::Forwarding => "forwarding",
            PipelineState::Completed => "completed",
            PipelineState::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States visited by one request, strictly increasing.
#[derive(Debug, Clone)]
pub struct StateTrace {
    states: Vec<PipelineState>,
}

impl StateTrace {
    pub fn new() -> Self {
        Self {
            states: vec![PipelineState::Received],
        }
    }

    /// Enter `next`. Entering a state that is not later than the current
    /// one is ignored, so a terminal state is final.
    pub fn enter(&mut self, next: PipelineState) {
        if next > self.current() && !self.current().is_terminal() {
            self.states.push(next);
        }
    }

    pub fn current(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Received)
    }

    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<PipelineState> {
        self.states
    }
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}
