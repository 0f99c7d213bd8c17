#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runners shared by the demo binaries.
pub mod apps;
/// Cache-key derivation for stage descriptors.
pub mod cache_key;
/// Pipeline and display configuration.
pub mod config;
/// Centralized constants (error tokens, file naming, summary wording).
pub mod constants;
mod errors;
mod hash;
/// Delimited record-set IO.
pub mod record_set;
/// Renderer seam and the built-in plain renderer.
pub mod render;
/// Context summary formatting.
pub mod report;
/// Request and response descriptors.
pub mod request;
/// Response orchestration over the stage pipeline.
pub mod response;
/// Aggregate, order, and limit stages.
pub mod stages;
/// Memoized working-file store.
pub mod store;
/// Shared type aliases.
pub mod types;

pub use config::{DisplayOptions, PipelineConfig};
pub use errors::PipelineError;
pub use record_set::RecordSet;
pub use render::{PlainRenderer, Renderer, TableMeta};
pub use request::{QueryRequest, RawResult, ResponseContext, ResponseStatus, StageReport};
pub use response::ResponseOrchestrator;
pub use stages::{
    AggregateDescriptor, AggregateFn, Direction, LimitDescriptor, OrderDescriptor, OrderKey,
    SortMode, Stage, StageKind, StageOutput, run_stage,
};
pub use store::{ArtifactState, Materialized, WorkingStore};
pub use types::{CacheToken, ColumnIndex, ErrorToken, Field, FieldName, Row};
