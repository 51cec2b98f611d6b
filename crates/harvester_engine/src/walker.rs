use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use harvester_core::{
    advance, DedupingAccumulator, PageResult, PageSignal, Region, RegionFailureReason,
    Termination, WalkLimits, WalkState,
};
use tokio_util::sync::CancellationToken;

use crate::{FetchError, HarvestEvent, PageFetcher, PageQuery, ProgressSink};

/// Delay before the n-th retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `step × attempt`: 2 s, 4 s, 6 s, ... for a 2 s step.
    Linear(Duration),
}

impl Backoff {
    /// `attempt` is 1 for the first retry.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(attempt),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a request is tried at most
    /// `max_retries + 1` times.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::Linear(Duration::from_secs(2)),
        }
    }
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalkStats {
    pub requests: u32,
    pub pages: u32,
    pub retries: u32,
    /// Records received, duplicates included.
    pub fetched: usize,
    /// Records newly merged into the accumulator.
    pub accepted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOutcome {
    pub termination: Termination,
    pub stats: WalkStats,
}

impl WalkOutcome {
    pub fn hit_ceiling(&self) -> bool {
        self.termination.hit_ceiling()
    }
}

/// A walk that stopped early. Pages merged before the failure stay merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkFailure {
    pub offset: usize,
    pub reason: RegionFailureReason,
    pub stats: WalkStats,
}

enum Fetched {
    Page(PageResult),
    Rejected(FetchError),
}

/// Pages through one region, streaming every page into a shared accumulator.
pub struct PaginationWalker<'a> {
    fetcher: &'a dyn PageFetcher,
    limits: WalkLimits,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        max_offset: usize,
        retry: RetryPolicy,
        fetch_timeout: Duration,
        sink: &'a dyn ProgressSink,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            limits: WalkLimits::new(fetcher.page_size(), max_offset),
            fetcher,
            retry,
            fetch_timeout,
            sink,
            cancel,
        }
    }

    pub async fn walk(
        &self,
        region: Option<&Region>,
        id_field: &str,
        accumulator: &Mutex<DedupingAccumulator>,
    ) -> Result<WalkOutcome, WalkFailure> {
        let mut state = WalkState::start();
        let mut stats = WalkStats::default();

        loop {
            let offset = match state {
                WalkState::Requesting { offset } => offset,
                WalkState::Done { termination } => return Ok(WalkOutcome { termination, stats }),
            };
            let query = PageQuery {
                region,
                offset,
                page_size: self.limits.page_size,
                id_field,
            };
            let signal = match self.fetch_with_retry(query, &mut stats).await {
                Ok(Fetched::Page(page)) => {
                    let count = page.count();
                    let accepted = {
                        let mut acc = accumulator.lock().unwrap_or_else(PoisonError::into_inner);
                        acc.offer_all(page.records)
                    };
                    stats.pages += 1;
                    stats.fetched += count;
                    stats.accepted += accepted;
                    engine_debug!(
                        "page region={} offset={} count={} new={} matched={:?}",
                        describe(region),
                        offset,
                        count,
                        accepted,
                        page.number_matched
                    );
                    self.sink.emit(HarvestEvent::PageFetched {
                        region: region.copied(),
                        offset,
                        count,
                        accepted,
                    });
                    PageSignal::Received { count }
                }
                Ok(Fetched::Rejected(err)) => {
                    engine_warn!(
                        "path ended region={} offset={}: {}",
                        describe(region),
                        offset,
                        err
                    );
                    PageSignal::Rejected
                }
                Err(reason) => {
                    return Err(WalkFailure {
                        offset,
                        reason,
                        stats,
                    })
                }
            };
            state = advance(state, signal, self.limits);
        }
    }

    async fn fetch_with_retry(
        &self,
        query: PageQuery<'_>,
        stats: &mut WalkStats,
    ) -> Result<Fetched, RegionFailureReason> {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(RegionFailureReason::Cancelled);
            }
            attempt += 1;
            stats.requests += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RegionFailureReason::Cancelled),
                result = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(query)) => result,
            };
            let err = match result {
                Ok(Ok(page)) => return Ok(Fetched::Page(page)),
                Ok(Err(err)) => err,
                Err(_elapsed) => FetchError::transient(format!(
                    "no response within {:?}",
                    self.fetch_timeout
                )),
            };

            if err.kind.ends_path() {
                return Ok(Fetched::Rejected(err));
            }
            if attempt > self.retry.max_retries {
                engine_warn!(
                    "giving up region={} offset={} after {} attempts: {}",
                    describe(query.region),
                    query.offset,
                    attempt,
                    err
                );
                return Err(RegionFailureReason::ExhaustedRetries {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }

            let delay = self.retry.backoff.delay(attempt);
            stats.retries += 1;
            engine_warn!(
                "retry {}/{} region={} offset={} in {:?}: {}",
                attempt,
                self.retry.max_retries,
                describe(query.region),
                query.offset,
                delay,
                err
            );
            self.sink.emit(HarvestEvent::RetryScheduled {
                region: query.region.copied(),
                offset: query.offset,
                attempt,
                delay,
                kind: err.kind,
            });

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(RegionFailureReason::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

pub(crate) fn describe(region: Option<&Region>) -> String {
    region.map_or_else(|| "<all>".to_string(), Region::to_string)
}
