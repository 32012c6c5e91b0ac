mod areas;
mod crimes;
mod offences;
mod states;

pub use areas::*;
pub use crimes::*;
pub use offences::*;
pub use states::*;

use rusqlite::{Connection, ErrorCode, OptionalExtension};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("{0}")]
    Invalid(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Db(rusqlite::Error),
}

impl From<rusqlite::Error> for RepoError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(f, msg)
                if f.code == ErrorCode::ConstraintViolation =>
            {
                RepoError::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            _ => RepoError::Db(e),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

fn require_name(field: &str, value: &str) -> RepoResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(RepoError::Invalid(format!("{field} must not be empty")));
    }
    Ok(v.to_string())
}

fn row_exists(conn: &Connection, table: &str, id: i64) -> RepoResult<bool> {
    let sql = format!("SELECT 1 FROM {table} WHERE id = ?");
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

fn count_rows(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> RepoResult<i64> {
    Ok(conn.query_row(sql, params, |r| r.get(0))?)
}
