use super::{count_rows, require_name, row_exists, RepoError, RepoResult};
use crate::db::now_utc;
use crate::listing::{ListQuery, Page, SortKey};
use crate::model::{Offence, OffenceCategory, OffenceCategoryInput, OffenceInput};
use rusqlite::{Connection, OptionalExtension, Row};

// Offence categories and offences share the same admin list columns.
const NAMED_SORT_KEYS: &[SortKey] = &[
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

const CATEGORY_COLUMNS: &str =
    "id, name, is_deleted, is_visible, date_created_utc, date_updated_utc";
const OFFENCE_COLUMNS: &str =
    "id, name, offence_category_id, is_deleted, is_visible, date_created_utc, date_updated_utc";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<OffenceCategory> {
    Ok(OffenceCategory {
        id: row.get(0)?,
        name: row.get(1)?,
        is_deleted: row.get(2)?,
        is_visible: row.get(3)?,
        date_created_utc: row.get(4)?,
        date_updated_utc: row.get(5)?,
    })
}

fn offence_from_row(row: &Row<'_>) -> rusqlite::Result<Offence> {
    Ok(Offence {
        id: row.get(0)?,
        name: row.get(1)?,
        offence_category_id: row.get(2)?,
        is_deleted: row.get(3)?,
        is_visible: row.get(4)?,
        date_created_utc: row.get(5)?,
        date_updated_utc: row.get(6)?,
    })
}

pub fn add_offence_category(conn: &Connection, input: &OffenceCategoryInput) -> RepoResult<i64> {
    let name = require_name("name", &input.name)?;
    conn.execute(
        "INSERT INTO offence_categories(name, is_deleted, is_visible, date_created_utc)
         VALUES(?, ?, ?, ?)",
        (&name, input.is_deleted, input.is_visible, now_utc()),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_offence_category_by_id(
    conn: &Connection,
    id: i64,
) -> RepoResult<Option<OffenceCategory>> {
    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM offence_categories WHERE id = ?");
    Ok(conn.query_row(&sql, [id], category_from_row).optional()?)
}

pub fn list_offence_categories(
    conn: &Connection,
    query: &ListQuery,
) -> RepoResult<Page<OffenceCategory>> {
    let total = count_rows(conn, "SELECT COUNT(*) FROM offence_categories", [])?;
    let sql = format!(
        "SELECT {CATEGORY_COLUMNS} FROM offence_categories {} LIMIT ? OFFSET ?",
        query.order_by(NAMED_SORT_KEYS, "id ASC")
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map((query.page_size as i64, query.offset()), category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, query))
}

pub fn update_offence_category(
    conn: &Connection,
    id: i64,
    input: &OffenceCategoryInput,
) -> RepoResult<()> {
    let name = require_name("name", &input.name)?;
    let changed = conn.execute(
        "UPDATE offence_categories
         SET name = ?, is_deleted = ?, is_visible = ?, date_updated_utc = ?
         WHERE id = ?",
        (&name, input.is_deleted, input.is_visible, now_utc(), id),
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "offence category",
            id,
        });
    }
    Ok(())
}

fn validate_offence(conn: &Connection, input: &OffenceInput) -> RepoResult<String> {
    let name = require_name("name", &input.name)?;
    if let Some(cid) = input.offence_category_id {
        if !row_exists(conn, "offence_categories", cid)? {
            return Err(RepoError::Invalid(format!(
                "offenceCategoryId {cid} does not exist"
            )));
        }
    }
    Ok(name)
}

pub fn add_offence(conn: &Connection, input: &OffenceInput) -> RepoResult<i64> {
    let name = validate_offence(conn, input)?;
    conn.execute(
        "INSERT INTO offences(name, offence_category_id, is_deleted, is_visible, date_created_utc)
         VALUES(?, ?, ?, ?, ?)",
        (
            &name,
            input.offence_category_id,
            input.is_deleted,
            input.is_visible,
            now_utc(),
        ),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_offence_by_id(conn: &Connection, id: i64) -> RepoResult<Option<Offence>> {
    let sql = format!("SELECT {OFFENCE_COLUMNS} FROM offences WHERE id = ?");
    Ok(conn.query_row(&sql, [id], offence_from_row).optional()?)
}

pub fn offence_exists(conn: &Connection, id: i64) -> RepoResult<bool> {
    row_exists(conn, "offences", id)
}

/// Every non-deleted offence, used to build the importer's name lookup.
pub fn get_offences(conn: &Connection) -> RepoResult<Vec<Offence>> {
    let sql = format!(
        "SELECT {OFFENCE_COLUMNS} FROM offences WHERE is_deleted = 0 ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], offence_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_offences(conn: &Connection, query: &ListQuery) -> RepoResult<Page<Offence>> {
    let total = count_rows(conn, "SELECT COUNT(*) FROM offences", [])?;
    let sql = format!(
        "SELECT {OFFENCE_COLUMNS} FROM offences {} LIMIT ? OFFSET ?",
        query.order_by(NAMED_SORT_KEYS, "id ASC")
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map((query.page_size as i64, query.offset()), offence_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, query))
}

pub fn update_offence(conn: &Connection, id: i64, input: &OffenceInput) -> RepoResult<()> {
    let name = validate_offence(conn, input)?;
    let changed = conn.execute(
        "UPDATE offences
         SET name = ?, offence_category_id = ?, is_deleted = ?, is_visible = ?, date_updated_utc = ?
         WHERE id = ?",
        (
            &name,
            input.offence_category_id,
            input.is_deleted,
            input.is_visible,
            now_utc(),
            id,
        ),
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "offence",
            id,
        });
    }
    Ok(())
}
