#![deny(unused)]
//! Logging and metrics setup shared by the playpen binaries.

pub mod metrics;
pub mod tracing_layer;

pub use self::metrics::{
    setup_metrics_recorder, track_cache, track_execution, track_paste, track_request, CacheLayer,
};
pub use tracing_layer::configure_tracing;
