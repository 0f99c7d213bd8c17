use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::runner::{CACHE_DIR_ENV, DEFAULT_DELIMITER};

/// Pipeline-wide settings shared by every stage of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Directory holding working files. `None` keeps them next to the source file.
    pub cache_root: Option<PathBuf>,
    /// Field delimiter used to read and write record sets.
    pub delimiter: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl PipelineConfig {
    /// Use `root` for every working file.
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    /// Resolve the cache root: explicit value, then `TABLECACHE_DIR`, then none.
    pub fn resolve_cache_root(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit.or_else(|| {
            env::var_os(CACHE_DIR_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
    }
}

/// Display options forwarded to the renderer and reporter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Render one field per line instead of a table.
    pub vertical: bool,
    /// Copy the final file verbatim and skip the summary.
    pub raw: bool,
    /// Append the source path and cache marker to the summary.
    pub verbose: bool,
    /// Dump request fields before the summary.
    pub debug: bool,
    /// Comma-separated column names shown instead of the file header.
    pub header_override: Option<String>,
}
