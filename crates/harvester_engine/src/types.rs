use std::fmt;
use std::time::Duration;

use harvester_core::{Region, RegionFailure, Termination};
use thiserror::Error;

/// Failure of a single page request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, message)
    }

    pub fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::ServerRejected { status }, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network error, timeout or throttling. Retried at the same offset.
    Transient,
    /// The feed refused the request. Never retried.
    ServerRejected { status: Option<u16> },
    /// The body could not be read as a feature page. Never retried.
    Malformed,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Transient)
    }

    /// Rejections and unreadable bodies both mean no more data down this path.
    pub fn ends_path(self) -> bool {
        !self.is_retryable()
    }

    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            408 | 429 => FailureKind::Transient,
            _ => FailureKind::ServerRejected {
                status: Some(status),
            },
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient failure"),
            FailureKind::ServerRejected { status: Some(code) } => {
                write!(f, "rejected by server (http {code})")
            }
            FailureKind::ServerRejected { status: None } => write!(f, "rejected by server"),
            FailureKind::Malformed => write!(f, "malformed response"),
        }
    }
}

/// Progress notifications emitted while a harvest runs.
#[derive(Debug, Clone, PartialEq)]
pub enum HarvestEvent {
    PassStarted {
        factor: u32,
        regions: usize,
    },
    PageFetched {
        region: Option<Region>,
        offset: usize,
        count: usize,
        accepted: usize,
    },
    RetryScheduled {
        region: Option<Region>,
        offset: usize,
        attempt: u32,
        delay: Duration,
        kind: FailureKind,
    },
    RegionFinished {
        region: Option<Region>,
        factor: u32,
        termination: Termination,
        accepted: usize,
    },
    RegionFailed(RegionFailure),
}
