//! Context summary reported after a result set is rendered.

use std::path::Path;
use std::time::Duration;

use crate::constants::report::{CACHED_MARKER, EMPTY_SET, SOURCE_MARKER, UNKNOWN_ELAPSED};

/// Inputs for one summary line.
#[derive(Clone, Copy, Debug)]
pub struct Summary<'a> {
    /// Final file reported as the source of the rendered rows.
    pub path: &'a Path,
    /// Lines in the final file, header included.
    pub row_count: usize,
    /// Time spent producing the raw result, if known.
    pub elapsed: Option<Duration>,
    /// Every executed stage was served from the working store.
    pub cache_hit: bool,
    /// Append the source path (and cache marker).
    pub verbose: bool,
}

/// Format `"<N> rows in set (<T> sec)"`, with `Empty set` / `1 row` wording.
///
/// Verbose summaries append `@source <path>` (plus `@cached` on a cache hit)
/// when the file still exists.
pub fn format_summary(summary: &Summary<'_>) -> String {
    let elapsed = format_elapsed(summary.elapsed);
    let rows = summary.row_count.saturating_sub(1);
    let mut line = match rows {
        0 => format!("{EMPTY_SET} ({elapsed} sec)"),
        1 => format!("1 row in set ({elapsed} sec)"),
        n => format!("{n} rows in set ({elapsed} sec)"),
    };
    if summary.verbose && summary.path.is_file() {
        line.push_str(&format!(" {SOURCE_MARKER} {}", summary.path.display()));
        if summary.cache_hit {
            line.push(' ');
            line.push_str(CACHED_MARKER);
        }
    }
    line
}

/// Seconds with two decimals and a `.` separator regardless of locale.
pub fn format_elapsed(elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(elapsed) => format!("{:.2}", elapsed.as_secs_f64()),
        None => UNKNOWN_ELAPSED.to_string(),
    }
}
