use thiserror::Error;

use crate::region::grid_divisions;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("fallback schedule is empty")]
    Empty,
    #[error("fallback factor {0} is not a positive perfect square")]
    NotSquare(u32),
    #[error("fallback factors must be strictly increasing, got {previous} then {next}")]
    NotIncreasing { previous: u32, next: u32 },
}

/// Ordered grid factors tried over the target region, one pass per factor.
///
/// `1` is the whole-region attempt; `4`, `9`, ... are `n × n` grids whose
/// cells are each walked once. The harvester moves to the next factor only
/// when the current pass leaves coverage unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackSchedule {
    factors: Vec<u32>,
}

impl FallbackSchedule {
    pub fn new(factors: Vec<u32>) -> Result<Self, ScheduleError> {
        if factors.is_empty() {
            return Err(ScheduleError::Empty);
        }
        if let Some(&bad) = factors.iter().find(|f| grid_divisions(**f).is_none()) {
            return Err(ScheduleError::NotSquare(bad));
        }
        if let Some(pair) = factors.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ScheduleError::NotIncreasing {
                previous: pair[0],
                next: pair[1],
            });
        }
        Ok(Self { factors })
    }

    pub fn factors(&self) -> &[u32] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

impl Default for FallbackSchedule {
    /// Whole region first, then a 3×3 grid.
    fn default() -> Self {
        Self {
            factors: vec![1, 9],
        }
    }
}
