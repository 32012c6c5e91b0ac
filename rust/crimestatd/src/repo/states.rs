use super::{count_rows, require_name, RepoError, RepoResult};
use crate::db::now_utc;
use crate::listing::{ListQuery, Page, SortKey};
use crate::model::{State, StateInput};
use rusqlite::{Connection, OptionalExtension, Row};

const STATE_COLUMNS: &str =
    "id, abbreviated_name, name, is_deleted, is_visible, date_created_utc, date_updated_utc";

const STATE_SORT_KEYS: &[SortKey] = &[
    SortKey {
        name: "AbbreviatedName",
        expr: "abbreviated_name",
        then: &[],
    },
    SortKey {
        name: "Date",
        expr: "date_created_utc",
        then: &["name COLLATE NOCASE"],
    },
    SortKey {
        name: "ID",
        expr: "id",
        then: &[],
    },
    SortKey {
        name: "IsDeleted",
        expr: "is_deleted",
        then: &["name COLLATE NOCASE"],
    },
    SortKey {
        name: "IsVisible",
        expr: "is_visible",
        then: &["name COLLATE NOCASE"],
    },
    SortKey {
        name: "Name",
        expr: "name COLLATE NOCASE",
        then: &[],
    },
];

/// States and territories of Australia, seeded on request into an empty workspace.
pub const DEFAULT_STATES: &[(&str, &str)] = &[
    ("ACT", "Australian Capital Territory"),
    ("NSW", "New South Wales"),
    ("NT", "Northern Territory"),
    ("QLD", "Queensland"),
    ("SA", "South Australia"),
    ("TAS", "Tasmania"),
    ("VIC", "Victoria"),
    ("WA", "Western Australia"),
];

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<State> {
    Ok(State {
        id: row.get(0)?,
        abbreviated_name: row.get(1)?,
        name: row.get(2)?,
        is_deleted: row.get(3)?,
        is_visible: row.get(4)?,
        date_created_utc: row.get(5)?,
        date_updated_utc: row.get(6)?,
    })
}

fn normalize_abbreviation(s: &str) -> RepoResult<String> {
    let abbr = require_name("abbreviatedName", s)?.to_ascii_uppercase();
    if abbr.chars().count() > 8 {
        return Err(RepoError::Invalid(
            "abbreviatedName must be at most 8 characters".into(),
        ));
    }
    Ok(abbr)
}

pub fn add_state(conn: &Connection, input: &StateInput) -> RepoResult<i64> {
    let abbr = normalize_abbreviation(&input.abbreviated_name)?;
    let name = require_name("name", &input.name)?;
    conn.execute(
        "INSERT INTO states(abbreviated_name, name, is_deleted, is_visible, date_created_utc)
         VALUES(?, ?, ?, ?, ?)",
        (&abbr, &name, input.is_deleted, input.is_visible, now_utc()),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_state_by_id(conn: &Connection, id: i64) -> RepoResult<Option<State>> {
    let sql = format!("SELECT {STATE_COLUMNS} FROM states WHERE id = ?");
    Ok(conn.query_row(&sql, [id], state_from_row).optional()?)
}

pub fn get_state_by_abbreviated_name(conn: &Connection, abbr: &str) -> RepoResult<Option<State>> {
    let sql = format!("SELECT {STATE_COLUMNS} FROM states WHERE abbreviated_name = ?");
    Ok(conn
        .query_row(&sql, [abbr.trim().to_ascii_uppercase()], state_from_row)
        .optional()?)
}

pub fn list_states(conn: &Connection, query: &ListQuery) -> RepoResult<Page<State>> {
    let total = count_rows(conn, "SELECT COUNT(*) FROM states", [])?;
    let sql = format!(
        "SELECT {STATE_COLUMNS} FROM states {} LIMIT ? OFFSET ?",
        query.order_by(STATE_SORT_KEYS, "id ASC")
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map((query.page_size as i64, query.offset()), state_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, query))
}

pub fn update_state(conn: &Connection, id: i64, input: &StateInput) -> RepoResult<()> {
    let abbr = normalize_abbreviation(&input.abbreviated_name)?;
    let name = require_name("name", &input.name)?;
    let changed = conn.execute(
        "UPDATE states
         SET abbreviated_name = ?, name = ?, is_deleted = ?, is_visible = ?, date_updated_utc = ?
         WHERE id = ?",
        (&abbr, &name, input.is_deleted, input.is_visible, now_utc(), id),
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound { entity: "state", id });
    }
    Ok(())
}

/// Inserts any of [`DEFAULT_STATES`] not already present. Returns how many were added.
pub fn seed_default_states(conn: &Connection) -> RepoResult<usize> {
    let now = now_utc();
    let mut stmt = conn.prepare(
        "INSERT INTO states(abbreviated_name, name, is_deleted, is_visible, date_created_utc)
         VALUES(?, ?, 0, 1, ?)
         ON CONFLICT(abbreviated_name) DO NOTHING",
    )?;
    let mut added = 0usize;
    for (abbr, name) in DEFAULT_STATES {
        added += stmt.execute((abbr, name, &now))?;
    }
    Ok(added)
}
