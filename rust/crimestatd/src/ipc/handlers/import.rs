use crate::config;
use crate::import::{self, history, ImportError, ImportOptions};
use crate::ipc::helpers::{
    get_opt_i64, get_str, require_db, respond, to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::repo;
use serde_json::json;
use std::path::PathBuf;

const DEFAULT_RUNS_LIMIT: i64 = 20;

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        let details = match &e {
            ImportError::BadDate {
                sheet, row, column, ..
            }
            | ImportError::BadCount {
                sheet, row, column, ..
            }
            | ImportError::ColumnWithoutDate { sheet, row, column } => {
                Some(json!({ "sheet": sheet, "row": row, "column": column }))
            }
            ImportError::Commit {
                committed, total, ..
            } => Some(json!({ "committed": committed, "total": total })),
            _ => None,
        };
        let err = HandlerErr::new(e.code(), e.to_string());
        match details {
            Some(d) => err.with_details(d),
            None => err,
        }
    }
}

fn requested_states(params: &serde_json::Value) -> Result<Vec<String>, HandlerErr> {
    match params.get("states") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.trim().to_uppercase())
                    .ok_or_else(|| HandlerErr::new("bad_params", "states must be strings"))
            })
            .collect(),
        Some(_) => Err(HandlerErr::new("bad_params", "states must be an array")),
    }
}

fn import_run(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let data_source_directory = PathBuf::from(get_str(&req.params, "dataSourceDirectory")?);
    if !data_source_directory.is_dir() {
        return Err(HandlerErr::new("not_found", "data source directory not found")
            .with_details(json!({ "path": data_source_directory.to_string_lossy() })));
    }
    let requested = match get_opt_i64(&req.params, "batchSize")? {
        Some(n) if n < 1 => return Err(HandlerErr::new("bad_params", "batchSize must be positive")),
        Some(n) => Some(n as usize),
        None => None,
    };
    let batch_size = config::resolve_batch_size(conn, requested)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let script_out = req
        .params
        .get("scriptOutPath")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()));

    let opts = ImportOptions {
        data_source_directory,
        states: requested_states(&req.params)?,
        batch_size,
        script_out,
    };
    let outcomes = import::run_import(conn, &opts)?;
    let total_crimes = repo::count_crimes(conn)?;
    Ok(json!({
        "batchSize": batch_size,
        "states": to_json(&outcomes)?,
        "totalCrimes": total_crimes,
    }))
}

fn import_runs_list(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let limit = get_opt_i64(&req.params, "limit")?
        .unwrap_or(DEFAULT_RUNS_LIMIT)
        .clamp(1, 1000);
    let runs = history::list_runs(conn, limit as u32)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "runs": to_json(&runs)? }))
}

fn import_states(_state: &AppState, _req: &Request) -> HandlerResult {
    let states: Vec<serde_json::Value> = import::importers()
        .iter()
        .map(|i| json!({ "state": i.state(), "fileName": i.file_name() }))
        .collect();
    Ok(json!({ "importers": states }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "import.run" => import_run(state, req),
        "import.runs.list" => import_runs_list(state, req),
        "import.states" => import_states(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
