//! Per-state importers that turn government spreadsheet exports into crime fact rows.

pub mod act;
pub mod commit;
pub mod dates;
pub mod history;

use crate::model::{CrimeRecord, LocalGovernmentArea, Offence, State};
use crate::repo::{
    get_local_government_areas_by_state_id, get_offences, get_state_by_abbreviated_name,
    RepoError,
};
use crate::spreadsheet::SpreadsheetError;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("state {0} is not defined in this workspace")]
    UnknownState(String),
    #[error("no importer is available for state {0}")]
    UnsupportedState(String),
    #[error(transparent)]
    Spreadsheet(#[from] SpreadsheetError),
    #[error("{sheet} row {row} column {column}: cannot read date header '{text}'")]
    BadDate {
        sheet: String,
        row: usize,
        column: usize,
        text: String,
    },
    #[error("{sheet} row {row} column {column}: count '{text}' is not a non-negative whole number")]
    BadCount {
        sheet: String,
        row: usize,
        column: usize,
        text: String,
    },
    #[error("{sheet} row {row} column {column}: count has no date header")]
    ColumnWithoutDate {
        sheet: String,
        row: usize,
        column: usize,
    },
    #[error("commit failed after {committed} of {total} records: {source}")]
    Commit {
        committed: usize,
        total: usize,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to write script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl ImportError {
    /// Stable error code for IPC responses.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::UnknownState(_) => "unknown_state",
            ImportError::UnsupportedState(_) => "unsupported_state",
            ImportError::Spreadsheet(_)
            | ImportError::BadDate { .. }
            | ImportError::BadCount { .. }
            | ImportError::ColumnWithoutDate { .. } => "import_parse_failed",
            ImportError::Commit { .. } => "import_commit_failed",
            ImportError::Script { .. } | ImportError::Source { .. } => "io_failed",
            ImportError::Repo(_) | ImportError::Db(_) => "db_query_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedTable {
    pub sheet: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParseReport {
    pub tables: usize,
    pub skipped_tables: Vec<SkippedTable>,
    pub skipped_rows: usize,
    pub unknown_offences: BTreeSet<String>,
    pub blank_cells: usize,
    pub records: usize,
}

impl ParseReport {
    pub fn skip_table(&mut self, sheet: &str, reason: &str) {
        self.skipped_tables.push(SkippedTable {
            sheet: sheet.to_string(),
            reason: reason.to_string(),
        });
    }
}

/// Reference data an importer resolves names against.
pub struct Lookups {
    pub state: State,
    areas: Vec<LocalGovernmentArea>,
    area_index: HashMap<String, usize>,
    offences: HashMap<String, Offence>,
}

impl Lookups {
    pub fn load(conn: &Connection, state_abbr: &str) -> Result<Self, ImportError> {
        let state = get_state_by_abbreviated_name(conn, state_abbr)?
            .ok_or_else(|| ImportError::UnknownState(state_abbr.to_string()))?;
        let areas = get_local_government_areas_by_state_id(conn, state.id)?;
        let offences = get_offences(conn)?;
        Ok(Self::from_parts(state, areas, offences))
    }

    pub fn from_parts(state: State, areas: Vec<LocalGovernmentArea>, offences: Vec<Offence>) -> Self {
        let mut area_index = HashMap::new();
        for (i, a) in areas.iter().enumerate() {
            area_index.entry(area_key(&a.name)).or_insert(i);
        }
        let offences = offences
            .into_iter()
            .map(|o| (offence_key(&o.name), o))
            .collect();
        Self {
            state,
            areas,
            area_index,
            offences,
        }
    }

    pub fn area_by_name(&self, name: &str) -> Option<&LocalGovernmentArea> {
        self.area_index
            .get(&area_key(name))
            .and_then(|&i| self.areas.get(i))
    }

    pub fn offence_by_name(&self, name: &str) -> Option<&Offence> {
        self.offences.get(&offence_key(name))
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    pub fn offence_count(&self) -> usize {
        self.offences.len()
    }
}

fn area_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn offence_key(name: &str) -> String {
    name.trim().to_uppercase()
}

/// A state-specific export format.
pub trait StateImporter {
    /// Abbreviated state name, matching `states.abbreviated_name`.
    fn state(&self) -> &'static str;

    fn file_name(&self) -> String {
        format!("{}.xml", self.state())
    }

    /// Appends one record per (area, offence, month) count found in `path`.
    fn parse(
        &self,
        path: &Path,
        lookups: &Lookups,
        crimes: &mut Vec<CrimeRecord>,
    ) -> Result<ParseReport, ImportError>;
}

pub fn importers() -> Vec<Box<dyn StateImporter>> {
    vec![Box::new(act::ActXmlImporter)]
}

pub fn importer_for(state: &str) -> Option<Box<dyn StateImporter>> {
    let wanted = state.trim();
    importers()
        .into_iter()
        .find(|i| i.state().eq_ignore_ascii_case(wanted))
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub data_source_directory: PathBuf,
    /// Empty means every state with an importer.
    pub states: Vec<String>,
    pub batch_size: usize,
    /// Write SQL scripts here instead of committing.
    pub script_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateOutcome {
    pub state: String,
    pub status: String,
    pub source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ParseReport>,
    pub committed: usize,
    pub batches: usize,
}

/// Runs the importer for each requested state whose export file exists.
pub fn run_import(conn: &Connection, opts: &ImportOptions) -> Result<Vec<StateOutcome>, ImportError> {
    let selected: Vec<Box<dyn StateImporter>> = if opts.states.is_empty() {
        importers()
    } else {
        opts.states
            .iter()
            .map(|s| importer_for(s).ok_or_else(|| ImportError::UnsupportedState(s.clone())))
            .collect::<Result<_, _>>()?
    };

    let mut script = match &opts.script_out {
        Some(p) => {
            let f = File::create(p).map_err(|source| ImportError::Script {
                path: p.to_string_lossy().to_string(),
                source,
            })?;
            Some((p.clone(), BufWriter::new(f)))
        }
        None => None,
    };

    let mut outcomes = Vec::new();
    for importer in &selected {
        outcomes.push(run_state(conn, importer.as_ref(), opts, script.as_mut())?);
    }
    Ok(outcomes)
}

fn run_state(
    conn: &Connection,
    importer: &dyn StateImporter,
    opts: &ImportOptions,
    script: Option<&mut (PathBuf, BufWriter<File>)>,
) -> Result<StateOutcome, ImportError> {
    let state = importer.state();
    let path = opts.data_source_directory.join(importer.file_name());
    let mut outcome = StateOutcome {
        state: state.to_string(),
        status: "skipped".into(),
        source_path: path.to_string_lossy().to_string(),
        reason: None,
        run_id: None,
        report: None,
        committed: 0,
        batches: 0,
    };
    if !path.is_file() {
        log::info!("{state}: {} not found, skipping", path.to_string_lossy());
        outcome.reason = Some("file not found".into());
        return Ok(outcome);
    }

    let lookups = Lookups::load(conn, state)?;
    log::debug!(
        "{state}: {} areas of {}, {} offences loaded",
        lookups.area_count(),
        lookups.state.name,
        lookups.offence_count()
    );
    let sha = history::sha256_file(&path).map_err(|source| ImportError::Source {
        path: outcome.source_path.clone(),
        source,
    })?;
    let run_id = history::begin_run(conn, state, &path, &sha)?;
    outcome.run_id = Some(run_id.clone());

    let mut crimes = Vec::new();
    let report = match importer.parse(&path, &lookups, &mut crimes) {
        Ok(r) => r,
        Err(e) => {
            log::error!("{state}: {e}");
            record_failure(conn, state, &run_id, None, 0, &e);
            return Err(e);
        }
    };
    log::info!(
        "{state}: {} records from {} tables ({} rows skipped)",
        report.records,
        report.tables,
        report.skipped_rows
    );

    let scripted = script.is_some();
    let result = if crimes.is_empty() {
        Ok(commit::CommitSummary::default())
    } else if let Some((script_path, writer)) = script {
        commit::write_scripts(writer, &crimes, opts.batch_size).map_err(|source| {
            ImportError::Script {
                path: script_path.to_string_lossy().to_string(),
                source,
            }
        })
    } else {
        commit::commit_batches(conn, &crimes, opts.batch_size)
    };

    match result {
        Ok(summary) => {
            outcome.status = if scripted { "scripted" } else { "imported" }.into();
            outcome.committed = summary.committed;
            outcome.batches = summary.batches;
            // Scripted rows are not in the database yet.
            let committed = if scripted { 0 } else { summary.committed };
            history::finish_run(conn, &run_id, &outcome.status, Some(&report), committed, None)?;
            outcome.report = Some(report);
            Ok(outcome)
        }
        Err(e) => {
            log::error!("{state}: {e}");
            let committed = match &e {
                ImportError::Commit { committed, .. } => *committed,
                _ => 0,
            };
            record_failure(conn, state, &run_id, Some(&report), committed, &e);
            Err(e)
        }
    }
}

/// The import error is what the caller sees; a history write failure is only logged.
fn record_failure(
    conn: &Connection,
    state: &str,
    run_id: &str,
    report: Option<&ParseReport>,
    committed: usize,
    err: &ImportError,
) {
    if let Err(e) = history::finish_run(
        conn,
        run_id,
        "failed",
        report,
        committed,
        Some(&err.to_string()),
    ) {
        log::warn!("{state}: could not mark import run {run_id} as failed: {e}");
    }
}
