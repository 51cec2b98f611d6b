use std::fmt;

use crate::{FeatureRecord, Region};

/// Overall result of a harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStatus {
    /// The last pass covered every region without failures or ceiling hits.
    Complete,
    /// Some data was collected but coverage is known to be incomplete.
    Partial,
    /// No region in any pass was walked successfully.
    Failed,
    /// The caller cancelled the harvest.
    Cancelled,
}

impl fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HarvestStatus::Complete => write!(f, "complete"),
            HarvestStatus::Partial => write!(f, "partial"),
            HarvestStatus::Failed => write!(f, "failed"),
            HarvestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionFailureReason {
    ExhaustedRetries { attempts: u32, last_error: String },
    Cancelled,
}

impl fmt::Display for RegionFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionFailureReason::ExhaustedRetries {
                attempts,
                last_error,
            } => write!(f, "gave up after {attempts} attempts: {last_error}"),
            RegionFailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A region whose walk did not finish. Records merged before the failure
/// are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFailure {
    /// `None` for a whole-dataset query.
    pub region: Option<Region>,
    /// Grid factor of the pass the region belonged to.
    pub factor: u32,
    /// Offset of the request that failed.
    pub offset: usize,
    pub reason: RegionFailureReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarvestStats {
    pub passes: u32,
    pub regions_walked: u32,
    pub requests: u32,
    pub pages: u32,
    pub retries: u32,
    pub ceiling_hits: u32,
    pub rejected_paths: u32,
}

/// Everything a harvest produced: the records plus what is known about
/// coverage.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestReport {
    pub records: Vec<FeatureRecord>,
    pub status: HarvestStatus,
    /// True when some region in the final pass still hit the ceiling.
    pub hit_ceiling: bool,
    /// Failures from every pass, including passes later superseded by a
    /// finer grid.
    pub region_failures: Vec<RegionFailure>,
    /// Regions of the final pass that hit the ceiling and could not be
    /// subdivided further.
    pub unresolved_regions: Vec<Region>,
    pub stats: HarvestStats,
}

impl HarvestReport {
    pub fn is_complete(&self) -> bool {
        self.status == HarvestStatus::Complete
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
