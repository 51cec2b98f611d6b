//! In-memory feeds implementing `PageFetcher` for harvest scenarios.
#![allow(dead_code)]

use std::future::pending;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use std::time::Duration;

use harvester_core::{FeatureRecord, PageResult, Region};
use harvester_engine::{
    Backoff, FetchError, HarvestSettings, PageFetcher, PageQuery, RetryPolicy,
};
use harvester_core::FallbackSchedule;
use serde_json::{json, Map, Value};

pub const ID_FIELD: &str = "code";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn region(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Region {
    Region::new(min_x, min_y, max_x, max_y).unwrap()
}

/// Settings with the feed's reference paging and no backoff delays.
pub fn settings(max_offset: usize, factors: Vec<u32>) -> HarvestSettings {
    HarvestSettings {
        max_offset,
        fallback: FallbackSchedule::new(factors).unwrap(),
        retry: RetryPolicy {
            max_retries: 2,
            backoff: Backoff::Fixed(Duration::ZERO),
        },
        fetch_timeout: Duration::from_secs(5),
        concurrency: 1,
    }
}

#[derive(Debug, Clone)]
pub struct Point {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

/// Feed holding a fixed set of point features.
///
/// Results are ordered by identifier. Offsets above `ceiling` are rejected
/// with HTTP 400, like the real feed.
pub struct SyntheticFeed {
    points: Vec<Point>,
    page_size: usize,
    ceiling: usize,
    requests: Mutex<Vec<(Option<Region>, usize)>>,
}

impl SyntheticFeed {
    pub fn new(mut points: Vec<Point>, page_size: usize, ceiling: usize) -> Self {
        points.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            points,
            page_size,
            ceiling,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `side × side` points at `(i * spacing, j * spacing)`, ids row-major.
    pub fn grid(side: usize, spacing: f64) -> Vec<Point> {
        (0..side)
            .flat_map(|j| {
                (0..side).map(move |i| Point {
                    id: format!("f{:05}", j * side + i),
                    x: i as f64 * spacing,
                    y: j as f64 * spacing,
                })
            })
            .collect()
    }

    pub fn total(&self) -> usize {
        self.points.len()
    }

    pub fn requests(&self) -> Vec<(Option<Region>, usize)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn page(&self, query: &PageQuery<'_>) -> Result<PageResult, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push((query.region.copied(), query.offset));
        if query.offset > self.ceiling {
            return Err(FetchError::rejected(Some(400), "STARTINDEX out of range"));
        }
        let records = self
            .points
            .iter()
            .filter(|p| query.region.map_or(true, |r| r.contains_point(p.x, p.y)))
            .skip(query.offset)
            .take(query.page_size.min(self.page_size))
            .map(|p| to_record(p, query.id_field))
            .collect();
        Ok(PageResult::new(records))
    }
}

fn to_record(point: &Point, id_field: &str) -> FeatureRecord {
    let mut attributes = Map::new();
    attributes.insert(ID_FIELD.into(), Value::from(point.id.clone()));
    attributes.insert("x".into(), Value::from(point.x));
    attributes.insert("y".into(), Value::from(point.y));
    let geometry = json!({ "type": "Point", "coordinates": [point.x, point.y] });
    FeatureRecord::with_id_field(attributes, Some(geometry), id_field)
}

#[async_trait::async_trait]
impl PageFetcher for SyntheticFeed {
    async fn fetch(&self, query: PageQuery<'_>) -> Result<PageResult, FetchError> {
        self.page(&query)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

type Fault = Box<dyn Fn(&PageQuery<'_>) -> Option<Misbehaviour> + Send + Sync>;

pub enum Misbehaviour {
    Transient,
    Hang,
    Sleep(Duration),
}

/// Wraps a `SyntheticFeed` and misbehaves for selected queries.
pub struct FaultyFeed {
    inner: SyntheticFeed,
    fault: Fault,
    faults: AtomicUsize,
}

impl FaultyFeed {
    pub fn new(
        inner: SyntheticFeed,
        fault: impl Fn(&PageQuery<'_>) -> Option<Misbehaviour> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            fault: Box::new(fault),
            faults: AtomicUsize::new(0),
        }
    }

    pub fn faults(&self) -> usize {
        self.faults.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &SyntheticFeed {
        &self.inner
    }
}

#[async_trait::async_trait]
impl PageFetcher for FaultyFeed {
    async fn fetch(&self, query: PageQuery<'_>) -> Result<PageResult, FetchError> {
        if let Some(misbehaviour) = (self.fault)(&query) {
            self.faults.fetch_add(1, Ordering::SeqCst);
            match misbehaviour {
                Misbehaviour::Transient => {
                    return Err(FetchError::transient("connection reset"));
                }
                Misbehaviour::Hang => pending::<()>().await,
                Misbehaviour::Sleep(delay) => tokio::time::sleep(delay).await,
            }
        }
        self.inner.page(&query)
    }

    fn page_size(&self) -> usize {
        self.inner.page_size
    }
}
