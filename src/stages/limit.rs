use serde::{Deserialize, Serialize};

use super::{Stage, StageKind};
use crate::cache_key::literal_token;
use crate::errors::PipelineError;
use crate::record_set::RecordSet;
use crate::types::CacheToken;

/// Row window applied after aggregation and sorting.
///
/// `(count)` and `(0, count)` are the same window and share a cache token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitDescriptor {
    /// No limit; the stage passes its input through.
    #[default]
    Unbounded,
    /// Skip `offset` data rows, then keep at most `count`.
    Window {
        /// Data rows skipped before the window starts.
        offset: usize,
        /// Maximum data rows kept.
        count: usize,
    },
}

impl LimitDescriptor {
    /// Keep the first `count` data rows.
    pub fn first(count: usize) -> Self {
        LimitDescriptor::Window { offset: 0, count }
    }

    /// Keep `count` data rows after skipping `offset`.
    pub fn window(offset: usize, count: usize) -> Self {
        LimitDescriptor::Window { offset, count }
    }

    /// Build from `[]`, `[count]` or `[offset, count]`.
    pub fn from_values(values: &[usize]) -> Result<Self, PipelineError> {
        match values {
            [] => Ok(LimitDescriptor::Unbounded),
            [count] => Ok(Self::first(*count)),
            [offset, count] => Ok(Self::window(*offset, *count)),
            _ => Err(PipelineError::Limit(format!(
                "limit takes at most two values (offset, count), got {}",
                values.len()
            ))),
        }
    }

    /// Parse `count` or `offset,count`; blank means unbounded.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let values = raw
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<usize>().map_err(|_| {
                    PipelineError::Limit(format!("invalid limit value '{part}'"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_values(&values)
    }

    /// Number of data rows kept from `available` input rows.
    pub fn kept(&self, available: usize) -> usize {
        match self {
            LimitDescriptor::Unbounded => available,
            LimitDescriptor::Window { offset, count } => {
                (*count).min(available.saturating_sub(*offset))
            }
        }
    }
}

impl Stage for LimitDescriptor {
    fn kind(&self) -> StageKind {
        StageKind::Limit
    }

    fn is_noop(&self) -> bool {
        matches!(self, LimitDescriptor::Unbounded)
    }

    fn cache_token(&self) -> CacheToken {
        match self {
            LimitDescriptor::Unbounded => String::new(),
            LimitDescriptor::Window { offset, count } => {
                literal_token([offset.to_string(), count.to_string()])
            }
        }
    }

    fn apply(&self, mut input: RecordSet) -> Result<RecordSet, PipelineError> {
        if let LimitDescriptor::Window { offset, count } = *self {
            input.rows = input.rows.into_iter().skip(offset).take(count).collect();
        }
        Ok(input)
    }
}
