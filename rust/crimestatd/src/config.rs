//! Workspace configuration kept in the `settings` table.

use crate::db;
use rusqlite::Connection;

pub const BATCH_SIZE_KEY: &str = "import.batchSize";
/// Rows per transaction when committing an import.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// Checks a value before it is stored. Unknown keys are accepted as-is.
pub fn validate_setting(key: &str, value: &serde_json::Value) -> Result<(), String> {
    match key {
        BATCH_SIZE_KEY => match value.as_u64() {
            Some(n) if n >= 1 => Ok(()),
            _ => Err(format!("{BATCH_SIZE_KEY} must be a positive integer")),
        },
        _ => Ok(()),
    }
}

/// An explicit request value wins, then the stored setting, then the default.
pub fn resolve_batch_size(conn: &Connection, requested: Option<usize>) -> anyhow::Result<usize> {
    if let Some(n) = requested.filter(|n| *n > 0) {
        return Ok(n);
    }
    let stored = db::settings_get_json(conn, BATCH_SIZE_KEY)?
        .and_then(|v| v.as_u64())
        .filter(|n| *n > 0)
        .map(|n| n as usize);
    Ok(stored.unwrap_or(DEFAULT_BATCH_SIZE))
}
