//! Pagination state machine for walking a single region.
//!
//! The machine is pure: the engine performs the fetch, turns the outcome
//! into a [`PageSignal`] and feeds it to [`advance`]. Transient failures
//! never reach the machine; they are retried at the same offset by the
//! caller.

/// Page size and offset ceiling for one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    pub page_size: usize,
    /// Largest offset the feed honours for a single query.
    pub max_offset: usize,
}

impl WalkLimits {
    pub fn new(page_size: usize, max_offset: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            max_offset,
        }
    }
}

/// Why a walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A page came back with no records.
    Empty,
    /// A page came back with fewer records than requested.
    LastPage,
    /// The last page was full but the next offset is beyond the ceiling, or
    /// the feed refused a request at or above the ceiling.
    Ceiling,
    /// The feed rejected a request below the ceiling or sent an unreadable
    /// body. Treated the same as `Empty`: nothing more is available down
    /// this path.
    Rejected,
}

impl Termination {
    /// Only a ceiling stop means data may remain out of reach.
    pub fn hit_ceiling(self) -> bool {
        matches!(self, Termination::Ceiling)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Requesting { offset: usize },
    Done { termination: Termination },
}

impl WalkState {
    pub fn start() -> Self {
        WalkState::Requesting { offset: 0 }
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            WalkState::Requesting { offset } => Some(*offset),
            WalkState::Done { .. } => None,
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        match self {
            WalkState::Requesting { .. } => None,
            WalkState::Done { termination } => Some(*termination),
        }
    }
}

/// Outcome of one fetch, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    Received { count: usize },
    Rejected,
}

/// Applies a page outcome to the walk state and returns the next state.
pub fn advance(state: WalkState, signal: PageSignal, limits: WalkLimits) -> WalkState {
    let offset = match state {
        WalkState::Requesting { offset } => offset,
        done @ WalkState::Done { .. } => return done,
    };

    let termination = match signal {
        // A refusal once the walk has paged up to the ceiling means the feed
        // enforces its limit; data may remain past it.
        PageSignal::Rejected if offset > 0 && offset >= limits.max_offset => Termination::Ceiling,
        PageSignal::Rejected => Termination::Rejected,
        PageSignal::Received { count: 0 } => Termination::Empty,
        PageSignal::Received { count } if count < limits.page_size => Termination::LastPage,
        PageSignal::Received { .. } => {
            let next = offset + limits.page_size;
            if next > limits.max_offset {
                Termination::Ceiling
            } else {
                return WalkState::Requesting { offset: next };
            }
        }
    };

    WalkState::Done { termination }
}
