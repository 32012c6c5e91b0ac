use super::ImportError;
use crate::db::now_utc;
use crate::model::CrimeRecord;
use crate::repo::ADD_CRIME_SQL;
use rusqlite::Connection;
use std::io::Write;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub committed: usize,
    pub batches: usize,
}

/// Writes records in chunks of `batch_size`, one transaction per chunk, so a
/// bulk load never holds a single huge transaction open. A failing chunk is
/// rolled back; chunks before it stay committed.
pub fn commit_batches(
    conn: &Connection,
    crimes: &[CrimeRecord],
    batch_size: usize,
) -> Result<CommitSummary, ImportError> {
    log::info!("Beginning commit...");
    let total = crimes.len();
    let mut summary = CommitSummary::default();

    for chunk in crimes.chunks(batch_size.max(1)) {
        log::info!(
            "Committing {} records, {} left",
            chunk.len(),
            total - summary.committed - chunk.len()
        );
        commit_chunk(conn, chunk).map_err(|source| ImportError::Commit {
            committed: summary.committed,
            total,
            source,
        })?;
        summary.committed += chunk.len();
        summary.batches += 1;
    }

    log::info!("Commit completed");
    Ok(summary)
}

fn commit_chunk(conn: &Connection, chunk: &[CrimeRecord]) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let now = now_utc();
        let mut stmt = tx.prepare_cached(ADD_CRIME_SQL)?;
        for r in chunk {
            stmt.execute((
                r.local_government_area_id,
                r.offence_id,
                r.month,
                r.year,
                r.count,
                &now,
            ))?;
        }
    }
    tx.commit()
}

/// Renders one chunk as a standalone SQL script equivalent to what
/// [`commit_batches`] executes for it.
pub fn render_script(chunk: &[CrimeRecord], stamp: &str) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("BEGIN TRANSACTION;\n\n");
    for r in chunk {
        out.push_str(&format!(
            "INSERT INTO crimes(local_government_area_id, offence_id, month, year, count, is_deleted, is_visible, date_created_utc) \
             VALUES({}, {}, {}, {}, {}, 0, 1, '{}') \
             ON CONFLICT(local_government_area_id, offence_id, month, year) \
             DO UPDATE SET count = excluded.count, date_updated_utc = excluded.date_created_utc;\n",
            r.local_government_area_id,
            r.offence_id,
            r.month,
            r.year,
            r.count,
            stamp.replace('\'', "''"),
        ));
    }
    out.push_str("\nCOMMIT;\n");
    out
}

/// Writes every chunk's script to `out` instead of touching the database.
pub fn write_scripts<W: Write>(
    out: &mut W,
    crimes: &[CrimeRecord],
    batch_size: usize,
) -> std::io::Result<CommitSummary> {
    let stamp = now_utc();
    let mut summary = CommitSummary::default();
    for chunk in crimes.chunks(batch_size.max(1)) {
        out.write_all(render_script(chunk, &stamp).as_bytes())?;
        summary.committed += chunk.len();
        summary.batches += 1;
    }
    out.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn seeded() -> Connection {
        let c = Connection::open_in_memory().expect("open");
        c.execute("PRAGMA foreign_keys = ON", []).unwrap();
        init_schema(&c).expect("schema");
        c.execute_batch(
            "INSERT INTO states(id, abbreviated_name, name, date_created_utc) VALUES(1, 'ACT', 'ACT', 'x');
             INSERT INTO local_government_areas(id, name, state_id, date_created_utc) VALUES(1, 'Belconnen', 1, 'x');
             INSERT INTO offences(id, name, date_created_utc) VALUES(1, 'Burglary', 'x');",
        )
        .unwrap();
        c
    }

    fn rec(month: u32, offence_id: i64) -> CrimeRecord {
        CrimeRecord {
            local_government_area_id: 1,
            offence_id,
            month,
            year: 2015,
            count: month as i64,
        }
    }

    fn crime_count(c: &Connection) -> i64 {
        c.query_row("SELECT COUNT(*) FROM crimes", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn commits_in_chunks() {
        let c = seeded();
        let records: Vec<_> = (1..=5).map(|m| rec(m, 1)).collect();
        let summary = commit_batches(&c, &records, 2).expect("commit");
        assert_eq!(
            summary,
            CommitSummary {
                committed: 5,
                batches: 3
            }
        );
        assert_eq!(crime_count(&c), 5);
    }

    #[test]
    fn failed_chunk_rolls_back_and_keeps_earlier_chunks() {
        let c = seeded();
        // Offence 99 violates the foreign key in the second chunk.
        let records = vec![rec(1, 1), rec(2, 1), rec(3, 1), rec(4, 99), rec(5, 1)];
        let err = commit_batches(&c, &records, 2).expect_err("fk failure");
        match err {
            ImportError::Commit {
                committed, total, ..
            } => {
                assert_eq!(committed, 2);
                assert_eq!(total, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(crime_count(&c), 2);
    }

    #[test]
    fn rendered_script_replays_to_the_same_rows() {
        let records: Vec<_> = (1..=3).map(|m| rec(m, 1)).collect();
        let mut script = Vec::new();
        let summary = write_scripts(&mut script, &records, 2).expect("write");
        assert_eq!(summary.batches, 2);
        let script = String::from_utf8(script).unwrap();
        assert_eq!(script.matches("BEGIN TRANSACTION;").count(), 2);
        assert_eq!(script.matches("COMMIT;").count(), 2);

        let c = seeded();
        c.execute_batch(&script).expect("replay script");
        assert_eq!(crime_count(&c), 3);
        let count: i64 = c
            .query_row("SELECT count FROM crimes WHERE month = 3", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }
}
