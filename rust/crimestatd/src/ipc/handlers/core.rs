use crate::config;
use crate::db;
use crate::ipc::helpers::{get_str, require_db, respond, HandlerErr, HandlerResult};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            log::info!("workspace opened at {}", path.to_string_lossy());
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn settings_get(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let key = get_str(&req.params, "key")?;
    let value = db::settings_get_json(conn, &key)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "key": key, "value": value }))
}

fn settings_set(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let key = get_str(&req.params, "key")?;
    let Some(value) = req.params.get("value") else {
        return Err(HandlerErr::new("bad_params", "missing value"));
    };
    config::validate_setting(&key, value).map_err(|msg| HandlerErr::new("bad_params", msg))?;
    db::settings_set_json(conn, &key, value)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "settings.get" => Some(respond(req, settings_get(state, req))),
        "settings.set" => Some(respond(req, settings_set(state, req))),
        _ => None,
    }
}
