use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::{Stage, StageKind, format_number, parse_number};
use crate::cache_key::digest_token;
use crate::errors::PipelineError;
use crate::record_set::{RecordSet, column_offset, field};
use crate::types::{CacheToken, ColumnIndex, Field, Row};

/// Supported aggregate functions.
///
/// Declaration order is the output column order: `avg, distinct, count, max, min, sum`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    /// Arithmetic mean, non-numeric values count as zero.
    Avg,
    /// Number of unique non-empty values.
    Distinct,
    /// Number of non-empty values.
    Count,
    /// Largest value (numeric when possible, byte-wise otherwise).
    Max,
    /// Smallest value (numeric when possible, byte-wise otherwise).
    Min,
    /// Numeric sum, non-numeric values count as zero.
    Sum,
}

impl AggregateFn {
    /// Every function in output order.
    pub const ALL: [AggregateFn; 6] = [
        AggregateFn::Avg,
        AggregateFn::Distinct,
        AggregateFn::Count,
        AggregateFn::Max,
        AggregateFn::Min,
        AggregateFn::Sum,
    ];

    /// Lowercase name used in mapping literals.
    pub fn name(self) -> &'static str {
        match self {
            AggregateFn::Avg => "avg",
            AggregateFn::Distinct => "distinct",
            AggregateFn::Count => "count",
            AggregateFn::Max => "max",
            AggregateFn::Min => "min",
            AggregateFn::Sum => "sum",
        }
    }

    /// Compute this function over one group's values for a single column.
    pub fn evaluate(self, values: &[&str]) -> Field {
        match self {
            AggregateFn::Count => values
                .iter()
                .filter(|value| !value.trim().is_empty())
                .count()
                .to_string(),
            AggregateFn::Distinct => values
                .iter()
                .filter(|value| !value.trim().is_empty())
                .collect::<HashSet<_>>()
                .len()
                .to_string(),
            AggregateFn::Sum => format_number(sum_or_zero(values)),
            AggregateFn::Avg => {
                if values.is_empty() {
                    return format_number(0.0);
                }
                format_number(sum_or_zero(values) / values.len() as f64)
            }
            AggregateFn::Min => extremum(values, false),
            AggregateFn::Max => extremum(values, true),
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregateFn {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        AggregateFn::ALL
            .into_iter()
            .find(|func| func.name().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| PipelineError::Aggregate(format!("unknown aggregate function '{raw}'")))
    }
}

fn sum_or_zero(values: &[&str]) -> f64 {
    values
        .iter()
        .map(|value| parse_number(value).unwrap_or(0.0))
        .sum()
}

fn extremum(values: &[&str], want_max: bool) -> Field {
    let candidates: Vec<&str> = values
        .iter()
        .copied()
        .filter(|value| !value.trim().is_empty())
        .collect();
    let numeric: Option<Vec<f64>> = candidates.iter().map(|value| parse_number(value)).collect();
    let best = match numeric {
        Some(numbers) => candidates
            .iter()
            .zip(numbers)
            .reduce(|best, next| {
                let better = if want_max {
                    next.1 > best.1
                } else {
                    next.1 < best.1
                };
                if better { next } else { best }
            })
            .map(|(value, _)| *value),
        None => {
            let iter = candidates.iter().copied();
            if want_max {
                iter.max_by(|a, b| a.as_bytes().cmp(b.as_bytes()))
            } else {
                iter.min_by(|a, b| a.as_bytes().cmp(b.as_bytes()))
            }
        }
    };
    best.unwrap_or_default().to_string()
}

/// Grouping and aggregate-function parameters for the aggregate stage.
///
/// `functions` maps each aggregate function to the 1-based columns it applies
/// to; `group_by` lists the 1-based grouping columns in output order. Both
/// empty means the stage is a pass-through.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateDescriptor {
    /// Function → target columns (caller order preserved within a function).
    #[serde(default, deserialize_with = "deserialize_functions")]
    pub functions: BTreeMap<AggregateFn, Vec<ColumnIndex>>,
    /// Grouping columns.
    #[serde(default)]
    pub group_by: Vec<ColumnIndex>,
}

impl AggregateDescriptor {
    /// Build a validated descriptor.
    pub fn new(
        functions: BTreeMap<AggregateFn, Vec<ColumnIndex>>,
        group_by: Vec<ColumnIndex>,
    ) -> Result<Self, PipelineError> {
        let descriptor = Self {
            functions,
            group_by,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Parse a mapping literal and a comma-separated group-by list.
    ///
    /// The literal is a JSON object (`{"count": [2]}`); function-name keys may
    /// also be left unquoted (`{count: [2]}`). Blank inputs mean "none".
    /// Duplicate function keys are rejected.
    pub fn parse(mapping: &str, group_by: &str) -> Result<Self, PipelineError> {
        let functions = if mapping.trim().is_empty() {
            BTreeMap::new()
        } else {
            let mapping = quote_bare_keys(mapping);
            let mut deserializer = serde_json::Deserializer::from_str(&mapping);
            let functions = deserialize_functions(&mut deserializer).map_err(|err| {
                PipelineError::Aggregate(format!("malformed aggregate mapping: {err}"))
            })?;
            deserializer.end().map_err(|err| {
                PipelineError::Aggregate(format!("malformed aggregate mapping: {err}"))
            })?;
            functions
        };
        let group_by = parse_column_list(group_by)?;
        Self::new(functions, group_by)
    }

    /// Check column indices and per-function column lists.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (func, columns) in &self.functions {
            if columns.is_empty() {
                return Err(PipelineError::Aggregate(format!(
                    "aggregate function '{func}' has no target columns"
                )));
            }
            if columns.contains(&0) {
                return Err(PipelineError::Aggregate(format!(
                    "aggregate function '{func}' references column 0 (columns are 1-based)"
                )));
            }
        }
        if self.group_by.contains(&0) {
            return Err(PipelineError::Aggregate(
                "group-by references column 0 (columns are 1-based)".into(),
            ));
        }
        Ok(())
    }

    /// Canonical serialization: group-by set followed by the mapping in output order.
    pub fn canonical(&self) -> String {
        let mut canonical = format!("group={}", join_columns(&self.group_by));
        for (func, columns) in &self.functions {
            canonical.push(';');
            canonical.push_str(func.name());
            canonical.push('=');
            canonical.push_str(&join_columns(columns));
        }
        canonical
    }
}

impl Stage for AggregateDescriptor {
    fn kind(&self) -> StageKind {
        StageKind::Aggregate
    }

    fn is_noop(&self) -> bool {
        self.functions.is_empty() && self.group_by.is_empty()
    }

    fn cache_token(&self) -> CacheToken {
        digest_token(&self.canonical())
    }

    fn apply(&self, input: RecordSet) -> Result<RecordSet, PipelineError> {
        let arity = input.arity();
        let resolve = |column: ColumnIndex| {
            column_offset(column, arity).ok_or_else(|| {
                PipelineError::Aggregate(format!(
                    "column {column} is out of range for {arity} columns"
                ))
            })
        };
        let group_offsets = self
            .group_by
            .iter()
            .map(|column| resolve(*column))
            .collect::<Result<Vec<_>, _>>()?;
        let mut targets: Vec<(AggregateFn, usize)> = Vec::new();
        for (func, columns) in &self.functions {
            for column in columns {
                targets.push((*func, resolve(*column)?));
            }
        }

        let mut groups: IndexMap<Row, Vec<&Row>> = IndexMap::new();
        for row in &input.rows {
            let key: Row = if group_offsets.is_empty() {
                row.clone()
            } else {
                group_offsets
                    .iter()
                    .map(|idx| field(row, *idx).to_string())
                    .collect()
            };
            groups.entry(key).or_default().push(row);
        }

        let mut rows = Vec::with_capacity(groups.len());
        for (key, members) in &groups {
            let mut out: Row = if group_offsets.is_empty() {
                Vec::with_capacity(targets.len())
            } else {
                key.clone()
            };
            for (func, idx) in &targets {
                let values: Vec<&str> = members.iter().map(|row| field(row, *idx)).collect();
                out.push(func.evaluate(&values));
            }
            rows.push(out);
        }
        debug!(
            "[tablecache:aggregate] {} input rows -> {} groups",
            input.rows.len(),
            rows.len()
        );
        Ok(RecordSet::new(input.header, rows))
    }
}

fn join_columns(columns: &[ColumnIndex]) -> String {
    columns
        .iter()
        .map(ColumnIndex::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Quote identifier keys that follow `{` or `,` outside string literals.
fn quote_bare_keys(literal: &str) -> String {
    let mut quoted = String::with_capacity(literal.len() + 8);
    let mut chars = literal.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut key_position = false;
    while let Some(ch) = chars.next() {
        if in_string {
            quoted.push(ch);
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if key_position && (ch.is_ascii_alphabetic() || ch == '_') {
            quoted.push('"');
            quoted.push(ch);
            while let Some(&next) = chars.peek() {
                if !(next.is_ascii_alphanumeric() || next == '_') {
                    break;
                }
                quoted.push(next);
                chars.next();
            }
            quoted.push('"');
            key_position = false;
            continue;
        }
        quoted.push(ch);
        match ch {
            '"' => {
                in_string = true;
                key_position = false;
            }
            '{' | ',' => key_position = true,
            _ if ch.is_whitespace() => {}
            _ => key_position = false,
        }
    }
    quoted
}

fn parse_column_list(raw: &str) -> Result<Vec<ColumnIndex>, PipelineError> {
    raw.split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<ColumnIndex>().map_err(|_| {
                PipelineError::Aggregate(format!("invalid group-by column '{part}'"))
            })
        })
        .collect()
}

struct FunctionMapVisitor;

impl<'de> Visitor<'de> for FunctionMapVisitor {
    type Value = BTreeMap<AggregateFn, Vec<ColumnIndex>>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a mapping from aggregate function to a list of columns")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut functions = BTreeMap::new();
        while let Some((func, columns)) = access.next_entry::<AggregateFn, Vec<ColumnIndex>>()? {
            if functions.insert(func, columns).is_some() {
                return Err(de::Error::custom(format!(
                    "duplicate aggregate function '{func}'"
                )));
            }
        }
        Ok(functions)
    }
}

fn deserialize_functions<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<AggregateFn, Vec<ColumnIndex>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_map(FunctionMapVisitor)
}
