//! Harvester core: pure data model, dedup sink and pagination state machine.
mod accumulator;
mod feature;
mod region;
mod report;
mod schedule;
mod walk;

pub use accumulator::DedupingAccumulator;
pub use feature::{FeatureRecord, PageResult};
pub use region::{grid_divisions, Region, RegionError};
pub use report::{
    HarvestReport, HarvestStats, HarvestStatus, RegionFailure, RegionFailureReason,
};
pub use schedule::{FallbackSchedule, ScheduleError};
pub use walk::{advance, PageSignal, Termination, WalkLimits, WalkState};
