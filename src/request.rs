use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DisplayOptions;
use crate::constants::debug_dump::EXCLUDED_FIELDS;
use crate::errors::PipelineError;
use crate::stages::{AggregateDescriptor, LimitDescriptor, OrderDescriptor, StageKind};
use crate::types::FieldName;

/// Request description produced by the query layer.
///
/// `params` carries any extra key/value pairs the query layer attached; they
/// are only used by the debug dump.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Statement text as submitted.
    #[serde(default)]
    pub statement: String,
    /// Request kind reported by the query layer (e.g. `query`).
    #[serde(default)]
    pub request_type: String,
    /// Display and reporting flags.
    #[serde(flatten)]
    pub display: DisplayOptions,
    /// Grouping/aggregation stage parameters.
    #[serde(default)]
    pub aggregate: AggregateDescriptor,
    /// Sort stage parameters.
    #[serde(default)]
    pub order: OrderDescriptor,
    /// Row window parameters.
    #[serde(default)]
    pub limit: LimitDescriptor,
    /// Additional request fields.
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl QueryRequest {
    /// Request fields shown by the debug dump, structural fields excluded.
    ///
    /// String values are shown bare; everything else as compact JSON.
    pub fn debug_fields(&self) -> Result<Vec<(FieldName, String)>, PipelineError> {
        let value = serde_json::to_value(self)
            .map_err(|err| PipelineError::Config(format!("cannot serialize request: {err}")))?;
        let Value::Object(fields) = value else {
            return Err(PipelineError::Config(
                "request did not serialize to a mapping".into(),
            ));
        };
        Ok(fields
            .into_iter()
            .filter(|(name, _)| !EXCLUDED_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| {
                let shown = match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                (name, shown)
            })
            .collect())
    }
}

/// Raw result file fetched by the query layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResult {
    /// Delimited file with a header line.
    pub path: PathBuf,
    /// Time the remote query took, if measured.
    pub elapsed: Option<Duration>,
}

impl RawResult {
    /// Raw result without timing information.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            elapsed: None,
        }
    }

    /// Attach the measured query time.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }
}

/// Outcome category of a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The raw result had no data rows; nothing was rendered.
    Empty,
    /// The final file was handed to the renderer (or copied in raw mode).
    Rendered,
}

/// One executed pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// Which stage ran.
    pub stage: StageKind,
    /// Working file it produced or reused.
    pub path: PathBuf,
    /// Reused without recomputation.
    pub cache_hit: bool,
}

/// Result metadata returned to the caller after a response is written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResponseContext {
    /// Empty or rendered.
    pub status: ResponseStatus,
    /// File that was rendered (the raw file when no stage ran).
    pub final_path: PathBuf,
    /// Lines in the final file, header included.
    pub row_count: usize,
    /// Query time forwarded from the raw result.
    pub elapsed: Option<Duration>,
    /// At least one stage ran and every stage that ran was a cache hit.
    pub cache_hit: bool,
    /// Stages that ran, in execution order.
    pub stages: Vec<StageReport>,
}
