use super::{count_rows, RepoError, RepoResult};
use crate::db::now_utc;
use crate::listing::{ListQuery, Page, SortKey};
use crate::model::{Crime, CrimeInput, CrimeRecord};
use crate::repo::{local_government_area_exists, offence_exists};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

/// Insert-or-replace-count for one fact row. A second import of the same
/// (area, offence, month, year) overwrites the count rather than duplicating it.
pub const ADD_CRIME_SQL: &str = "INSERT INTO crimes(
        local_government_area_id, offence_id, month, year, count,
        is_deleted, is_visible, date_created_utc)
     VALUES(?1, ?2, ?3, ?4, ?5, 0, 1, ?6)
     ON CONFLICT(local_government_area_id, offence_id, month, year)
     DO UPDATE SET count = excluded.count, date_updated_utc = excluded.date_created_utc";

const CRIME_COLUMNS: &str = "id, local_government_area_id, offence_id, month, year, count, \
                             is_deleted, is_visible, date_created_utc, date_updated_utc";

const CRIME_SORT_KEYS: &[SortKey] = &[
    SortKey {
        name: "Date",
        expr: "date_created_utc",
        then: &[],
    },
    SortKey {
        name: "ID",
        expr: "id",
        then: &[],
    },
    SortKey {
        name: "IsDeleted",
        expr: "is_deleted",
        then: &[],
    },
    SortKey {
        name: "IsVisible",
        expr: "is_visible",
        then: &[],
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrimeFilter {
    pub local_government_area_id: Option<i64>,
    pub offence_id: Option<i64>,
    pub year: Option<i32>,
}

impl CrimeFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conds: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        if let Some(v) = self.local_government_area_id {
            conds.push("local_government_area_id = ?");
            params.push(Value::Integer(v));
        }
        if let Some(v) = self.offence_id {
            conds.push("offence_id = ?");
            params.push(Value::Integer(v));
        }
        if let Some(v) = self.year {
            conds.push("year = ?");
            params.push(Value::Integer(v as i64));
        }
        if conds.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", conds.join(" AND ")), params)
        }
    }
}

fn crime_from_row(row: &Row<'_>) -> rusqlite::Result<Crime> {
    Ok(Crime {
        id: row.get(0)?,
        local_government_area_id: row.get(1)?,
        offence_id: row.get(2)?,
        month: row.get(3)?,
        year: row.get(4)?,
        count: row.get(5)?,
        is_deleted: row.get(6)?,
        is_visible: row.get(7)?,
        date_created_utc: row.get(8)?,
        date_updated_utc: row.get(9)?,
    })
}

/// Field-level checks shared by admin writes and the importer.
pub fn validate_crime_record(record: &CrimeRecord) -> RepoResult<()> {
    if !(1..=12).contains(&record.month) {
        return Err(RepoError::Invalid(format!(
            "month must be between 1 and 12, got {}",
            record.month
        )));
    }
    if !(1900..=9999).contains(&record.year) {
        return Err(RepoError::Invalid(format!(
            "year must be between 1900 and 9999, got {}",
            record.year
        )));
    }
    if record.count < 0 {
        return Err(RepoError::Invalid(format!(
            "count must not be negative, got {}",
            record.count
        )));
    }
    Ok(())
}

fn validate_references(conn: &Connection, record: &CrimeRecord) -> RepoResult<()> {
    validate_crime_record(record)?;
    if !local_government_area_exists(conn, record.local_government_area_id)? {
        return Err(RepoError::Invalid(format!(
            "localGovernmentAreaId {} is not a known local government area",
            record.local_government_area_id
        )));
    }
    if !offence_exists(conn, record.offence_id)? {
        return Err(RepoError::Invalid(format!(
            "offenceId {} does not exist",
            record.offence_id
        )));
    }
    Ok(())
}

/// Adds (or re-counts) a single fact row after checking its references.
pub fn add_crime(conn: &Connection, record: &CrimeRecord) -> RepoResult<i64> {
    validate_references(conn, record)?;
    conn.execute(
        ADD_CRIME_SQL,
        (
            record.local_government_area_id,
            record.offence_id,
            record.month,
            record.year,
            record.count,
            now_utc(),
        ),
    )?;
    let id: i64 = conn.query_row(
        "SELECT id FROM crimes
         WHERE local_government_area_id = ? AND offence_id = ? AND month = ? AND year = ?",
        (
            record.local_government_area_id,
            record.offence_id,
            record.month,
            record.year,
        ),
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn get_crime_by_id(conn: &Connection, id: i64) -> RepoResult<Option<Crime>> {
    let sql = format!("SELECT {CRIME_COLUMNS} FROM crimes WHERE id = ?");
    Ok(conn.query_row(&sql, [id], crime_from_row).optional()?)
}

pub fn list_crimes(
    conn: &Connection,
    query: &ListQuery,
    filter: &CrimeFilter,
) -> RepoResult<Page<Crime>> {
    let (where_sql, mut params) = filter.where_clause();
    let total = count_rows(
        conn,
        &format!("SELECT COUNT(*) FROM crimes {where_sql}"),
        params_from_iter(params.iter()),
    )?;

    let sql = format!(
        "SELECT {CRIME_COLUMNS} FROM crimes {where_sql} {} LIMIT ? OFFSET ?",
        query.order_by(CRIME_SORT_KEYS, "id ASC")
    );
    params.push(Value::Integer(query.page_size as i64));
    params.push(Value::Integer(query.offset()));
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(params.iter()), crime_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, query))
}

pub fn update_crime(conn: &Connection, id: i64, input: &CrimeInput) -> RepoResult<()> {
    validate_references(conn, &input.record())?;
    let changed = conn.execute(
        "UPDATE crimes
         SET local_government_area_id = ?, offence_id = ?, count = ?, month = ?, year = ?,
             is_deleted = ?, is_visible = ?, date_updated_utc = ?
         WHERE id = ?",
        (
            input.local_government_area_id,
            input.offence_id,
            input.count,
            input.month,
            input.year,
            input.is_deleted,
            input.is_visible,
            now_utc(),
            id,
        ),
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound { entity: "crime", id });
    }
    Ok(())
}

pub fn count_crimes(conn: &Connection) -> RepoResult<i64> {
    count_rows(conn, "SELECT COUNT(*) FROM crimes", [])
}
