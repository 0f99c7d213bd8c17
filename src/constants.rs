/// Caller-recognizable error tokens, one per failure category.
pub mod tokens {
    /// Malformed or empty descriptor configuration.
    pub const CONFIG_ERROR: &str = "config_error";
    /// Aggregation descriptor or computation failure.
    pub const AGGREGATE_ERROR: &str = "aggregate_error";
    /// Order descriptor or sort failure.
    pub const ORDER_ERROR: &str = "order_error";
    /// Limit descriptor or windowing failure.
    pub const LIMIT_ERROR: &str = "limit_error";
    /// Final display step failure.
    pub const RENDER_ERROR: &str = "render_error";
    /// A working file vanished between pipeline stages.
    pub const WORKING_FILE_MISSING: &str = "working_file_missing";
    /// Unclassified IO failure outside any stage.
    pub const IO_ERROR: &str = "io_error";
}

/// Constants used when naming working files.
pub mod store {
    /// Separator between the source stem and each stage suffix.
    pub const STAGE_SEPARATOR: char = '.';
    /// Separator between a stage name and its cache token.
    pub const TOKEN_SEPARATOR: char = '-';
    /// Stage name embedded in aggregated working-file names.
    pub const AGGREGATE_STAGE: &str = "agg";
    /// Stage name embedded in sorted working-file names.
    pub const ORDER_STAGE: &str = "sort";
    /// Stage name embedded in limited working-file names.
    pub const LIMIT_STAGE: &str = "limit";
    /// Prefix for in-flight temp files before they are atomically published.
    pub const TEMP_PREFIX: &str = ".tablecache-";
}

/// Constants used by cache-key derivation.
pub mod cache_key {
    /// Number of hex characters kept from a content digest.
    pub const DIGEST_HEX_LEN: usize = 16;
    /// Joiner used between order keys in a literal token.
    pub const KEY_JOINER: char = '_';
}

/// Constants used by the context reporter.
pub mod report {
    /// Elapsed-time text used when no timing is available.
    pub const UNKNOWN_ELAPSED: &str = "0.00";
    /// Wording used for a result with no data rows.
    pub const EMPTY_SET: &str = "Empty set";
    /// Marker preceding the final file path in verbose summaries.
    pub const SOURCE_MARKER: &str = "@source";
    /// Marker appended when every executed stage was a cache hit.
    pub const CACHED_MARKER: &str = "@cached";
}

/// Request fields never echoed by the debug dump.
pub mod debug_dump {
    /// Purely structural request fields.
    pub const EXCLUDED_FIELDS: [&str; 5] = ["statement", "verbose", "raw", "debug", "request_type"];
}

/// Environment and runner defaults.
pub mod runner {
    /// Environment variable overriding the working-file cache root.
    pub const CACHE_DIR_ENV: &str = "TABLECACHE_DIR";
    /// Default record delimiter.
    pub const DEFAULT_DELIMITER: u8 = b',';
}
