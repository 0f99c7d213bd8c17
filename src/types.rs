/// Raw field text from a record set (untyped until a stage interprets it).
/// Examples: `42`, `3.14`, `us-east1`, ``
pub type Field = String;
/// One data row (or the header), fields in column order.
/// Example: `["1", "2", "3"]`
pub type Row = Vec<Field>;
/// 1-based column index as written in descriptors.
/// Examples: `1`, `3`
pub type ColumnIndex = usize;
/// Filesystem-safe token identifying one stage descriptor.
/// Examples: `9f2c41d07ab3e615`, `2dn_1as`, `0_10`
pub type CacheToken = String;
/// Stable token identifying a failure category for the calling layer.
/// Examples: `aggregate_error`, `limit_error`
pub type ErrorToken = &'static str;
/// Name of a request field shown in the debug dump.
/// Examples: `aggregate`, `project_id`
pub type FieldName = String;
