use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "crimestat.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS states(
            id INTEGER PRIMARY KEY,
            abbreviated_name TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_visible INTEGER NOT NULL DEFAULT 1,
            date_created_utc TEXT NOT NULL,
            date_updated_utc TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS local_government_areas(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            state_id INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_visible INTEGER NOT NULL DEFAULT 1,
            date_created_utc TEXT NOT NULL,
            date_updated_utc TEXT,
            FOREIGN KEY(state_id) REFERENCES states(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lgas_state ON local_government_areas(state_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS offence_categories(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_visible INTEGER NOT NULL DEFAULT 1,
            date_created_utc TEXT NOT NULL,
            date_updated_utc TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS offences(
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            offence_category_id INTEGER,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_visible INTEGER NOT NULL DEFAULT 1,
            date_created_utc TEXT NOT NULL,
            date_updated_utc TEXT,
            FOREIGN KEY(offence_category_id) REFERENCES offence_categories(id)
        )",
        [],
    )?;
    // Importer lookups key offences by upper-cased name, so names must not collide.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_offences_name ON offences(name COLLATE NOCASE)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS crimes(
            id INTEGER PRIMARY KEY,
            local_government_area_id INTEGER NOT NULL,
            offence_id INTEGER NOT NULL,
            month INTEGER NOT NULL,
            year INTEGER NOT NULL,
            count INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            is_visible INTEGER NOT NULL DEFAULT 1,
            date_created_utc TEXT NOT NULL,
            date_updated_utc TEXT,
            FOREIGN KEY(local_government_area_id) REFERENCES local_government_areas(id),
            FOREIGN KEY(offence_id) REFERENCES offences(id),
            UNIQUE(local_government_area_id, offence_id, month, year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_crimes_offence ON crimes(offence_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_crimes_year_month ON crimes(year, month)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS import_runs(
            id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            source_path TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL,
            parsed_count INTEGER NOT NULL DEFAULT 0,
            committed_count INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    // Workspaces created before file fingerprinting and skip accounting lack these.
    ensure_import_runs_sha256(conn)?;
    ensure_import_runs_skip_counts(conn)?;

    Ok(())
}

fn ensure_import_runs_sha256(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "import_runs", "source_sha256")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE import_runs ADD COLUMN source_sha256 TEXT", [])?;
    Ok(())
}

fn ensure_import_runs_skip_counts(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "import_runs", "skipped_rows")? {
        conn.execute(
            "ALTER TABLE import_runs ADD COLUMN skipped_rows INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    if !table_has_column(conn, "import_runs", "skipped_tables")? {
        conn.execute(
            "ALTER TABLE import_runs ADD COLUMN skipped_tables INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    if !table_has_column(conn, "import_runs", "message")? {
        conn.execute("ALTER TABLE import_runs ADD COLUMN message TEXT", [])?;
    }
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("corrupt setting {key}"))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn now_utc() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
