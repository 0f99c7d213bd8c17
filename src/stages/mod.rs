//! Record-set transforms (aggregate, order, limit) and their memoized execution.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::errors::PipelineError;
use crate::record_set::RecordSet;
use crate::store::WorkingStore;
use crate::types::CacheToken;

/// Aggregate descriptor and grouping engine.
pub mod aggregate;
/// Limit descriptor and row windowing.
pub mod limit;
/// Order descriptor and multi-key sorter.
pub mod order;

pub use aggregate::{AggregateDescriptor, AggregateFn};
pub use limit::LimitDescriptor;
pub use order::{Direction, OrderDescriptor, OrderKey, SortMode};

/// Pipeline stage kinds, in their fixed execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Grouping and aggregate functions.
    Aggregate,
    /// Multi-key sort.
    Order,
    /// Offset/count windowing.
    Limit,
}

impl StageKind {
    /// Name embedded in working-file suffixes.
    pub fn name(self) -> &'static str {
        use crate::constants::store::{AGGREGATE_STAGE, LIMIT_STAGE, ORDER_STAGE};
        match self {
            StageKind::Aggregate => AGGREGATE_STAGE,
            StageKind::Order => ORDER_STAGE,
            StageKind::Limit => LIMIT_STAGE,
        }
    }

    /// Wrap `reason` in this stage's error variant.
    pub fn error(self, reason: impl ToString) -> PipelineError {
        let reason = reason.to_string();
        match self {
            StageKind::Aggregate => PipelineError::Aggregate(reason),
            StageKind::Order => PipelineError::Order(reason),
            StageKind::Limit => PipelineError::Limit(reason),
        }
    }
}

/// A pure transform from one record set to another, addressed by a cache token.
pub trait Stage {
    /// Which pipeline stage this descriptor drives.
    fn kind(&self) -> StageKind;
    /// True when the descriptor is empty and the stage passes its input through.
    fn is_noop(&self) -> bool;
    /// Stable, filesystem-safe token for this descriptor.
    fn cache_token(&self) -> CacheToken;
    /// Transform `input`; the header must be carried over unchanged.
    fn apply(&self, input: RecordSet) -> Result<RecordSet, PipelineError>;
}

/// Result of running one stage through the working store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageOutput {
    /// Empty descriptor; the input file is the output.
    Skipped(PathBuf),
    /// Stage output is materialized at `path`.
    Ready {
        /// Working-file path.
        path: PathBuf,
        /// True when the file already existed and nothing was recomputed.
        cache_hit: bool,
    },
}

impl StageOutput {
    /// Path of the record set produced (or passed through) by the stage.
    pub fn path(&self) -> &Path {
        match self {
            StageOutput::Skipped(path) => path,
            StageOutput::Ready { path, .. } => path,
        }
    }
}

/// Run `stage` over `source`, reusing a previously materialized working file when present.
pub fn run_stage<S: Stage + ?Sized>(
    store: &WorkingStore,
    source: &Path,
    stage: &S,
) -> Result<StageOutput, PipelineError> {
    let kind = stage.kind();
    if stage.is_noop() {
        debug!("[tablecache:{}] empty descriptor, passing through", kind.name());
        return Ok(StageOutput::Skipped(source.to_path_buf()));
    }
    if !source.is_file() {
        return Err(PipelineError::WorkingFileMissing {
            path: source.to_path_buf(),
        });
    }
    let token = stage.cache_token();
    let delimiter = store.delimiter();
    let materialized = store.materialize(source, kind, &token, |file| {
        let input = RecordSet::read(source, delimiter).map_err(|err| kind.error(err))?;
        let output = stage.apply(input)?;
        let mut writer = BufWriter::new(file);
        output
            .write_to(&mut writer, delimiter)
            .and_then(|_| writer.flush())
            .map_err(|err| kind.error(err))
    })?;
    Ok(StageOutput::Ready {
        path: materialized.path,
        cache_hit: materialized.cache_hit,
    })
}

/// Parse a field as a finite number, ignoring surrounding whitespace.
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

/// Locale-independent number formatting; integral values print without a fraction.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
