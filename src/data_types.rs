/// Database-assigned row handle, only meaningful within the table that issued it
pub type Position = i64;
/// Running byte total kept in the per-database metadata table
pub type DataSize = i64;

/// Sort key that orders by position instead of by a document field
pub const NATURAL_ORDER: &str = "$natural";

/// Per-database table holding one size record per collection
pub const METADATA_TABLE: &str = "_meta";

pub const DEFAULT_ID_FIELD: &str = "_id";
