use super::{count_rows, require_name, row_exists, RepoError, RepoResult};
use crate::db::now_utc;
use crate::listing::{ListQuery, Page, SortKey};
use crate::model::{LocalGovernmentArea, LocalGovernmentAreaInput, LocalGovernmentAreaState};
use rusqlite::{Connection, OptionalExtension, Row};

const AREA_COLUMNS: &str = "a.id, a.name, a.state_id, a.is_deleted, a.is_visible, \
                            a.date_created_utc, a.date_updated_utc";

const AREA_SORT_KEYS: &[SortKey] = &[
    SortKey {
        name: "Date",
        expr: "a.date_created_utc",
        then: &["s.name COLLATE NOCASE", "a.name COLLATE NOCASE"],
    },
    SortKey {
        name: "ID",
        expr: "a.id",
        then: &[],
    },
    SortKey {
        name: "IsDeleted",
        expr: "a.is_deleted",
        then: &["s.name COLLATE NOCASE", "a.name COLLATE NOCASE"],
    },
    SortKey {
        name: "IsVisible",
        expr: "a.is_visible",
        then: &["s.name COLLATE NOCASE", "a.name COLLATE NOCASE"],
    },
    SortKey {
        name: "Name",
        expr: "a.name COLLATE NOCASE",
        then: &["s.name COLLATE NOCASE"],
    },
    SortKey {
        name: "StateName",
        expr: "s.name COLLATE NOCASE",
        then: &["a.name COLLATE NOCASE"],
    },
];

fn area_from_row(row: &Row<'_>) -> rusqlite::Result<LocalGovernmentArea> {
    Ok(LocalGovernmentArea {
        id: row.get(0)?,
        name: row.get(1)?,
        state_id: row.get(2)?,
        is_deleted: row.get(3)?,
        is_visible: row.get(4)?,
        date_created_utc: row.get(5)?,
        date_updated_utc: row.get(6)?,
    })
}

fn validate(conn: &Connection, input: &LocalGovernmentAreaInput) -> RepoResult<String> {
    let name = require_name("name", &input.name)?;
    if !row_exists(conn, "states", input.state_id)? {
        return Err(RepoError::Invalid(format!(
            "stateId {} does not exist",
            input.state_id
        )));
    }
    Ok(name)
}

pub fn add_local_government_area(
    conn: &Connection,
    input: &LocalGovernmentAreaInput,
) -> RepoResult<i64> {
    let name = validate(conn, input)?;
    conn.execute(
        "INSERT INTO local_government_areas(name, state_id, is_deleted, is_visible, date_created_utc)
         VALUES(?, ?, ?, ?, ?)",
        (&name, input.state_id, input.is_deleted, input.is_visible, now_utc()),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_local_government_area_by_id(
    conn: &Connection,
    id: i64,
) -> RepoResult<Option<LocalGovernmentArea>> {
    let sql = format!("SELECT {AREA_COLUMNS} FROM local_government_areas a WHERE a.id = ?");
    Ok(conn.query_row(&sql, [id], area_from_row).optional()?)
}

pub fn local_government_area_exists(conn: &Connection, id: i64) -> RepoResult<bool> {
    row_exists(conn, "local_government_areas", id)
}

/// Non-deleted areas of one state, used to resolve names during import.
pub fn get_local_government_areas_by_state_id(
    conn: &Connection,
    state_id: i64,
) -> RepoResult<Vec<LocalGovernmentArea>> {
    let sql = format!(
        "SELECT {AREA_COLUMNS} FROM local_government_areas a
         WHERE a.state_id = ? AND a.is_deleted = 0
         ORDER BY a.name COLLATE NOCASE, a.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([state_id], area_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_local_government_area_states(
    conn: &Connection,
    query: &ListQuery,
) -> RepoResult<Page<LocalGovernmentAreaState>> {
    let total = count_rows(conn, "SELECT COUNT(*) FROM local_government_areas", [])?;
    let sql = format!(
        "SELECT {AREA_COLUMNS}, s.name
         FROM local_government_areas a
         JOIN states s ON s.id = a.state_id
         {} LIMIT ? OFFSET ?",
        query.order_by(AREA_SORT_KEYS, "a.id ASC")
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map((query.page_size as i64, query.offset()), |row| {
            Ok(LocalGovernmentAreaState {
                area: area_from_row(row)?,
                state_name: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page::new(items, total, query))
}

pub fn update_local_government_area(
    conn: &Connection,
    id: i64,
    input: &LocalGovernmentAreaInput,
) -> RepoResult<()> {
    let name = validate(conn, input)?;
    let changed = conn.execute(
        "UPDATE local_government_areas
         SET name = ?, state_id = ?, is_deleted = ?, is_visible = ?, date_updated_utc = ?
         WHERE id = ?",
        (&name, input.state_id, input.is_deleted, input.is_visible, now_utc(), id),
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            entity: "local government area",
            id,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::listing::SortDirection;
    use crate::model::StateInput;
    use crate::repo::add_state;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().expect("open");
        init_schema(&c).expect("schema");
        c
    }

    fn state(c: &Connection, abbr: &str, name: &str) -> i64 {
        add_state(
            c,
            &StateInput {
                abbreviated_name: abbr.into(),
                name: name.into(),
                is_deleted: false,
                is_visible: true,
            },
        )
        .unwrap()
    }

    fn area(c: &Connection, name: &str, state_id: i64, is_deleted: bool) -> i64 {
        add_local_government_area(
            c,
            &LocalGovernmentAreaInput {
                name: name.into(),
                state_id,
                is_deleted,
                is_visible: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn rejects_unknown_state() {
        let c = conn();
        let r = add_local_government_area(
            &c,
            &LocalGovernmentAreaInput {
                name: "Belconnen".into(),
                state_id: 99,
                is_deleted: false,
                is_visible: true,
            },
        );
        assert!(matches!(r, Err(RepoError::Invalid(_))));
    }

    #[test]
    fn by_state_skips_deleted_areas() {
        let c = conn();
        let act = state(&c, "ACT", "Australian Capital Territory");
        let nsw = state(&c, "NSW", "New South Wales");
        area(&c, "Belconnen", act, false);
        area(&c, "Gungahlin", act, true);
        area(&c, "Albury", nsw, false);

        let names: Vec<String> = get_local_government_areas_by_state_id(&c, act)
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Belconnen".to_string()]);
    }

    #[test]
    fn state_name_sort_breaks_ties_by_area_name() {
        let c = conn();
        let act = state(&c, "ACT", "Australian Capital Territory");
        let nsw = state(&c, "NSW", "New South Wales");
        area(&c, "Woden", act, false);
        area(&c, "Albury", nsw, false);
        area(&c, "Belconnen", act, false);

        let q = ListQuery {
            sort_by: Some("StateName".into()),
            sort_direction: Some(SortDirection::Descending),
            ..ListQuery::default()
        };
        let page = list_local_government_area_states(&c, &q).unwrap();
        let names: Vec<&str> = page.items.iter().map(|a| a.area.name.as_str()).collect();
        assert_eq!(names, vec!["Albury", "Belconnen", "Woden"]);
        assert_eq!(page.items[0].state_name, "New South Wales");
        assert_eq!(page.total, 3);
    }
}
