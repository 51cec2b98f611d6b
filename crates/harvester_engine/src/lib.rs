//! Harvester engine: feed IO, pagination walking and region fallback.
mod decode;
mod encode;
mod fetch;
mod harvester;
mod persist;
mod progress;
mod types;
mod walker;

pub use decode::{decode_feature_collection, DecodeError};
pub use encode::{
    bbox_param, encode_region, filter_expression, AttributePredicate, EncodeError,
    RequestEncoding,
};
pub use fetch::{ConfigError, FetchSettings, PageFetcher, PageQuery, WfsFetcher};
pub use harvester::{HarvestSettings, Harvester};
pub use persist::{
    ensure_output_dir, feature_collection, layer_filename, write_feature_collection,
    AtomicFileWriter, PersistError,
};
pub use progress::{ChannelProgressSink, ProgressSink};
pub use types::{FailureKind, FetchError, HarvestEvent};
pub use walker::{Backoff, PaginationWalker, RetryPolicy, WalkFailure, WalkOutcome, WalkStats};
