use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use engine_logging::{engine_error, engine_info, engine_warn};
use futures_util::stream::{self, StreamExt};
use harvester_core::{
    grid_divisions, DedupingAccumulator, FallbackSchedule, FeatureRecord, HarvestReport,
    HarvestStats, HarvestStatus, Region, RegionFailure, RegionFailureReason, Termination,
};
use tokio_util::sync::CancellationToken;

use crate::walker::{describe, PaginationWalker, RetryPolicy, WalkFailure, WalkOutcome};
use crate::{HarvestEvent, PageFetcher, ProgressSink};

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    /// Largest `STARTINDEX` the feed honours.
    pub max_offset: usize,
    pub fallback: FallbackSchedule,
    pub retry: RetryPolicy,
    /// Upper bound on a single page request, retries excluded.
    pub fetch_timeout: Duration,
    /// Regions of one pass walked at the same time. With more than one
    /// worker, records are kept first-accepted-wins rather than in region
    /// order.
    pub concurrency: usize,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            max_offset: 1000,
            fallback: FallbackSchedule::default(),
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(300),
            concurrency: 1,
        }
    }
}

/// Result of one pass over the target region at a single grid factor.
#[derive(Debug, Default)]
struct PassSummary {
    succeeded: usize,
    failures: Vec<RegionFailure>,
    ceiling_regions: Vec<Option<Region>>,
    cancelled: bool,
}

impl PassSummary {
    fn is_resolved(&self) -> bool {
        self.failures.is_empty() && self.ceiling_regions.is_empty() && !self.cancelled
    }
}

/// Collects every feature of a region despite the feed's offset ceiling.
///
/// The whole region is walked first. When that pass hits the ceiling or a
/// region fails, the next factor of the fallback schedule splits the target
/// into a grid and each cell is walked once, merging into the same
/// accumulator. Cells are never split further.
pub struct Harvester {
    fetcher: Arc<dyn PageFetcher>,
    settings: HarvestSettings,
    sink: Arc<dyn ProgressSink>,
}

impl Harvester {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: HarvestSettings) -> Self {
        Self {
            fetcher,
            settings,
            sink: Arc::new(()),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Harvests `target` (or the whole dataset when `None`).
    ///
    /// Never fails outright: the report carries whatever was merged together
    /// with the coverage status and per-region failures, including after
    /// cancellation.
    pub async fn harvest(
        &self,
        target: Option<Region>,
        id_field: &str,
        cancel: &CancellationToken,
    ) -> HarvestReport {
        let accumulator = Mutex::new(DedupingAccumulator::new());
        let mut stats = HarvestStats::default();
        let mut passes: Vec<PassSummary> = Vec::new();

        for &factor in self.settings.fallback.factors() {
            let Some(regions) = pass_regions(target.as_ref(), factor) else {
                break;
            };

            if !passes.is_empty() {
                let side = grid_divisions(factor).unwrap_or(1);
                engine_info!(
                    "falling back to a {side}x{side} grid ({} sub-regions)",
                    regions.len()
                );
            }
            stats.passes += 1;
            self.sink.emit(HarvestEvent::PassStarted {
                factor,
                regions: regions.len(),
            });

            let summary = self
                .run_pass(factor, &regions, id_field, &accumulator, cancel, &mut stats)
                .await;
            let stop = summary.is_resolved() || summary.cancelled;
            passes.push(summary);
            if stop {
                break;
            }
        }

        let records = accumulator
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_records();
        self.finish(records, stats, passes)
    }

    async fn run_pass(
        &self,
        factor: u32,
        regions: &[Option<Region>],
        id_field: &str,
        accumulator: &Mutex<DedupingAccumulator>,
        cancel: &CancellationToken,
        stats: &mut HarvestStats,
    ) -> PassSummary {
        let walker = PaginationWalker::new(
            self.fetcher.as_ref(),
            self.settings.max_offset,
            self.settings.retry,
            self.settings.fetch_timeout,
            self.sink.as_ref(),
            cancel,
        );
        let total = regions.len();
        let mut summary = PassSummary::default();

        let walker = &walker;
        let mut walks = stream::iter(regions.iter().enumerate())
            .map(|(index, region)| async move {
                if cancel.is_cancelled() {
                    return (index, region, None);
                }
                let result = walker.walk(region.as_ref(), id_field, accumulator).await;
                (index, region, Some(result))
            })
            .buffer_unordered(self.settings.concurrency.max(1));

        while let Some((index, region, result)) = walks.next().await {
            let Some(result) = result else {
                summary.cancelled = true;
                continue;
            };
            stats.regions_walked += 1;
            match result {
                Ok(outcome) => {
                    self.record_success(factor, index, total, *region, outcome, stats);
                    summary.succeeded += 1;
                    if outcome.hit_ceiling() {
                        summary.ceiling_regions.push(*region);
                    }
                }
                Err(failure) => {
                    let failure = self.record_failure(factor, index, total, *region, failure, stats);
                    if failure.reason == RegionFailureReason::Cancelled {
                        summary.cancelled = true;
                    }
                    summary.failures.push(failure);
                }
            }
        }

        summary
    }

    fn record_success(
        &self,
        factor: u32,
        index: usize,
        total: usize,
        region: Option<Region>,
        outcome: WalkOutcome,
        stats: &mut HarvestStats,
    ) {
        let walk = outcome.stats;
        stats.requests += walk.requests;
        stats.pages += walk.pages;
        stats.retries += walk.retries;
        match outcome.termination {
            Termination::Ceiling => {
                stats.ceiling_hits += 1;
                engine_warn!(
                    "offset ceiling {} reached in region {}/{} {}",
                    self.settings.max_offset,
                    index + 1,
                    total,
                    describe(region.as_ref())
                );
            }
            Termination::Rejected => stats.rejected_paths += 1,
            Termination::Empty | Termination::LastPage => {}
        }
        engine_info!(
            "region {}/{} (factor {}): {} fetched, {} new",
            index + 1,
            total,
            factor,
            walk.fetched,
            walk.accepted
        );
        self.sink.emit(HarvestEvent::RegionFinished {
            region,
            factor,
            termination: outcome.termination,
            accepted: walk.accepted,
        });
    }

    fn record_failure(
        &self,
        factor: u32,
        index: usize,
        total: usize,
        region: Option<Region>,
        failure: WalkFailure,
        stats: &mut HarvestStats,
    ) -> RegionFailure {
        let walk = failure.stats;
        stats.requests += walk.requests;
        stats.pages += walk.pages;
        stats.retries += walk.retries;
        engine_error!(
            "region {}/{} (factor {}) {} failed at offset {} after {} new records: {}",
            index + 1,
            total,
            factor,
            describe(region.as_ref()),
            failure.offset,
            walk.accepted,
            failure.reason
        );
        let failure = RegionFailure {
            region,
            factor,
            offset: failure.offset,
            reason: failure.reason,
        };
        self.sink.emit(HarvestEvent::RegionFailed(failure.clone()));
        failure
    }

    fn finish(
        &self,
        records: Vec<FeatureRecord>,
        stats: HarvestStats,
        passes: Vec<PassSummary>,
    ) -> HarvestReport {
        let any_success = passes.iter().any(|pass| pass.succeeded > 0);
        let status = match passes.last() {
            Some(pass) if pass.cancelled => HarvestStatus::Cancelled,
            None => HarvestStatus::Failed,
            Some(_) if !any_success => HarvestStatus::Failed,
            Some(pass) if pass.is_resolved() => HarvestStatus::Complete,
            Some(_) => HarvestStatus::Partial,
        };

        let mut region_failures = Vec::new();
        let mut ceiling_regions = Vec::new();
        let last = passes.len().saturating_sub(1);
        for (index, pass) in passes.into_iter().enumerate() {
            region_failures.extend(pass.failures);
            if index == last {
                ceiling_regions = pass.ceiling_regions;
            }
        }

        let report = HarvestReport {
            hit_ceiling: !ceiling_regions.is_empty(),
            unresolved_regions: ceiling_regions.into_iter().flatten().collect(),
            records,
            status,
            region_failures,
            stats,
        };
        engine_info!(
            "harvest {}: {} records, {} passes, {} requests, {} region failures",
            report.status,
            report.records.len(),
            report.stats.passes,
            report.stats.requests,
            report.region_failures.len()
        );
        report
    }
}

/// Regions for one pass, or `None` when the pass cannot run.
fn pass_regions(target: Option<&Region>, factor: u32) -> Option<Vec<Option<Region>>> {
    match target {
        Some(region) => match region.split(factor) {
            Ok(cells) => Some(cells.into_iter().map(Some).collect()),
            Err(err) => {
                engine_error!("cannot split {}: {}", region, err);
                None
            }
        },
        None if factor == 1 => Some(vec![None]),
        None => {
            engine_warn!("a whole-dataset query cannot be subdivided; stopping at the ceiling");
            None
        }
    }
}
