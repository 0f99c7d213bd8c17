use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{Stage, StageKind, parse_number};
use crate::cache_key::literal_token;
use crate::errors::PipelineError;
use crate::record_set::{RecordSet, column_offset, field};
use crate::types::{CacheToken, ColumnIndex, Row};

/// Sort direction for one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Comparison semantics for one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Compare as numbers; non-numeric fields compare as zero.
    Numeric,
    /// Compare raw bytes, independent of locale.
    Lexicographic,
}

/// One `(column, direction, mode)` sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    /// 1-based column.
    pub column: ColumnIndex,
    /// Ascending or descending.
    pub direction: Direction,
    /// Numeric or byte-wise comparison.
    pub mode: SortMode,
}

impl OrderKey {
    /// Parse a `column,direction,mode` triple such as `2,desc,n`.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if parts.len() != 3 || parts.iter().any(|part| part.is_empty()) {
            return Err(PipelineError::Order(format!(
                "sort key '{raw}' must have exactly three components (column,direction,mode)"
            )));
        }
        let column = parts[0]
            .parse::<ColumnIndex>()
            .ok()
            .filter(|column| *column > 0)
            .ok_or_else(|| PipelineError::Order(format!("invalid sort column '{}'", parts[0])))?;
        let direction = match parts[1].to_ascii_lowercase().as_str() {
            "a" | "asc" => Direction::Asc,
            "d" | "desc" => Direction::Desc,
            other => {
                return Err(PipelineError::Order(format!(
                    "invalid sort direction '{other}'"
                )));
            }
        };
        let mode = match parts[2].to_ascii_lowercase().as_str() {
            "n" | "num" | "numeric" => SortMode::Numeric,
            "s" | "l" | "str" | "lex" => SortMode::Lexicographic,
            other => {
                return Err(PipelineError::Order(format!("invalid sort mode '{other}'")));
            }
        };
        Ok(Self {
            column,
            direction,
            mode,
        })
    }

    fn literal(&self) -> String {
        let direction = match self.direction {
            Direction::Asc => 'a',
            Direction::Desc => 'd',
        };
        let mode = match self.mode {
            SortMode::Numeric => 'n',
            SortMode::Lexicographic => 's',
        };
        format!("{},{direction},{mode}", self.column)
    }
}

/// Ordered sort keys; the first key is primary, later keys break ties.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDescriptor {
    /// Keys in priority order.
    pub keys: Vec<OrderKey>,
}

impl OrderDescriptor {
    /// Build a descriptor from already-validated keys.
    pub fn new(keys: Vec<OrderKey>) -> Self {
        Self { keys }
    }

    /// Parse triples separated by whitespace or `;`, e.g. `"2,d,n 1,a,s"`.
    ///
    /// A single malformed triple invalidates the whole descriptor.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let keys = raw
            .split(|ch: char| ch == ';' || ch.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(OrderKey::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keys })
    }
}

impl Stage for OrderDescriptor {
    fn kind(&self) -> StageKind {
        StageKind::Order
    }

    fn is_noop(&self) -> bool {
        self.keys.is_empty()
    }

    fn cache_token(&self) -> CacheToken {
        literal_token(self.keys.iter().map(OrderKey::literal))
    }

    fn apply(&self, mut input: RecordSet) -> Result<RecordSet, PipelineError> {
        let arity = input.arity();
        let resolved = self
            .keys
            .iter()
            .map(|key| {
                column_offset(key.column, arity)
                    .map(|idx| (idx, *key))
                    .ok_or_else(|| {
                        PipelineError::Order(format!(
                            "sort column {} is out of range for {arity} columns",
                            key.column
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        input.rows.sort_by(|a, b| compare_rows(a, b, &resolved));
        Ok(input)
    }
}

fn compare_rows(a: &Row, b: &Row, keys: &[(usize, OrderKey)]) -> Ordering {
    for (idx, key) in keys {
        let ordering = compare_fields(field(a, *idx), field(b, *idx), key.mode);
        let ordering = match key.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compare two fields under `mode`; byte-wise and locale independent.
pub fn compare_fields(a: &str, b: &str, mode: SortMode) -> Ordering {
    match mode {
        SortMode::Lexicographic => a.as_bytes().cmp(b.as_bytes()),
        SortMode::Numeric => {
            let left = parse_number(a).unwrap_or(0.0);
            let right = parse_number(b).unwrap_or(0.0);
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        }
    }
}
