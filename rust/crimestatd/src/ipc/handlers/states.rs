use crate::ipc::helpers::{
    delete_requested, get_i64, get_str, list_query, parse_input, require_db, respond, to_json,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::StateInput;
use crate::repo;
use serde_json::json;

fn states_list(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let query = list_query(&req.params)?;
    to_json(&repo::list_states(conn, &query)?)
}

fn states_get(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let found = match req.params.get("abbreviatedName") {
        Some(_) => {
            let abbr = get_str(&req.params, "abbreviatedName")?;
            repo::get_state_by_abbreviated_name(conn, &abbr)?
        }
        None => repo::get_state_by_id(conn, get_i64(&req.params, "id")?)?,
    };
    let Some(found) = found else {
        return Err(HandlerErr::new("not_found", "state not found"));
    };
    Ok(json!({ "state": found }))
}

fn states_create(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let input: StateInput = parse_input(&req.params)?;
    let id = repo::add_state(conn, &input)?;
    Ok(json!({ "id": id }))
}

fn states_update(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    if delete_requested(&req.params) {
        return Ok(json!({ "updated": false }));
    }
    let id = get_i64(&req.params, "id")?;
    let input: StateInput = parse_input(&req.params)?;
    repo::update_state(conn, id, &input)?;
    Ok(json!({ "updated": true }))
}

fn states_seed_defaults(state: &AppState, _req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let added = repo::seed_default_states(conn)?;
    log::info!("seeded {added} states");
    Ok(json!({ "added": added }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "states.list" => states_list(state, req),
        "states.get" => states_get(state, req),
        "states.create" => states_create(state, req),
        "states.update" => states_update(state, req),
        "states.seedDefaults" => states_seed_defaults(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
