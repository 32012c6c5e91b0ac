use super::ParseReport;
use crate::db::now_utc;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRun {
    pub id: String,
    pub state: String,
    pub source_path: String,
    pub source_sha256: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: String,
    pub parsed_count: i64,
    pub committed_count: i64,
    pub skipped_rows: i64,
    pub skipped_tables: i64,
    pub message: Option<String>,
}

pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn begin_run(
    conn: &Connection,
    state: &str,
    source_path: &Path,
    sha256: &str,
) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO import_runs(id, state, source_path, source_sha256, started_at, status)
         VALUES(?, ?, ?, ?, ?, 'running')",
        (
            &id,
            state,
            source_path.to_string_lossy().to_string(),
            sha256,
            now_utc(),
        ),
    )?;
    Ok(id)
}

pub fn finish_run(
    conn: &Connection,
    id: &str,
    status: &str,
    report: Option<&ParseReport>,
    committed: usize,
    message: Option<&str>,
) -> rusqlite::Result<()> {
    let (parsed, skipped_rows, skipped_tables) = report
        .map(|r| (r.records, r.skipped_rows, r.skipped_tables.len()))
        .unwrap_or_default();
    conn.execute(
        "UPDATE import_runs
         SET finished_at = ?, status = ?, parsed_count = ?, committed_count = ?,
             skipped_rows = ?, skipped_tables = ?, message = ?
         WHERE id = ?",
        (
            now_utc(),
            status,
            parsed as i64,
            committed as i64,
            skipped_rows as i64,
            skipped_tables as i64,
            message,
            id,
        ),
    )?;
    Ok(())
}

pub fn list_runs(conn: &Connection, limit: u32) -> rusqlite::Result<Vec<ImportRun>> {
    let mut stmt = conn.prepare(
        "SELECT id, state, source_path, source_sha256, started_at, finished_at, status,
                parsed_count, committed_count, skipped_rows, skipped_tables, message
         FROM import_runs
         ORDER BY started_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(ImportRun {
                id: row.get(0)?,
                state: row.get(1)?,
                source_path: row.get(2)?,
                source_sha256: row.get(3)?,
                started_at: row.get(4)?,
                finished_at: row.get(5)?,
                status: row.get(6)?,
                parsed_count: row.get(7)?,
                committed_count: row.get(8)?,
                skipped_rows: row.get(9)?,
                skipped_tables: row.get(10)?,
                message: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
