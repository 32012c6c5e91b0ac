use crate::ipc::helpers::{
    delete_requested, get_i64, list_query, parse_input, require_db, respond, to_json, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::LocalGovernmentAreaInput;
use crate::repo;
use serde_json::json;

fn lgas_list(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let query = list_query(&req.params)?;
    to_json(&repo::list_local_government_area_states(conn, &query)?)
}

fn lgas_get(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let id = get_i64(&req.params, "id")?;
    let Some(area) = repo::get_local_government_area_by_id(conn, id)? else {
        return Err(HandlerErr::new("not_found", "local government area not found")
            .with_details(json!({ "id": id })));
    };
    Ok(json!({ "localGovernmentArea": area }))
}

fn lgas_by_state(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let state_id = get_i64(&req.params, "stateId")?;
    let areas = repo::get_local_government_areas_by_state_id(conn, state_id)?;
    Ok(json!({ "localGovernmentAreas": areas }))
}

fn lgas_create(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let input: LocalGovernmentAreaInput = parse_input(&req.params)?;
    let id = repo::add_local_government_area(conn, &input)?;
    Ok(json!({ "id": id }))
}

fn lgas_update(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    if delete_requested(&req.params) {
        return Ok(json!({ "updated": false }));
    }
    let id = get_i64(&req.params, "id")?;
    let input: LocalGovernmentAreaInput = parse_input(&req.params)?;
    repo::update_local_government_area(conn, id, &input)?;
    Ok(json!({ "updated": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "lgas.list" => lgas_list(state, req),
        "lgas.get" => lgas_get(state, req),
        "lgas.byState" => lgas_by_state(state, req),
        "lgas.create" => lgas_create(state, req),
        "lgas.update" => lgas_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
