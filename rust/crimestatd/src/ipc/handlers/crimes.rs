use crate::ipc::helpers::{
    delete_requested, get_i64, get_opt_i64, list_query, parse_input, require_db, respond,
    to_json, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::CrimeInput;
use crate::repo::{self, CrimeFilter};
use serde_json::json;

fn crime_filter(params: &serde_json::Value) -> Result<CrimeFilter, HandlerErr> {
    let year = match get_opt_i64(params, "year")? {
        Some(y) => Some(
            i32::try_from(y).map_err(|_| HandlerErr::new("bad_params", "year out of range"))?,
        ),
        None => None,
    };
    Ok(CrimeFilter {
        local_government_area_id: get_opt_i64(params, "localGovernmentAreaId")?,
        offence_id: get_opt_i64(params, "offenceId")?,
        year,
    })
}

fn crimes_list(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let query = list_query(&req.params)?;
    let filter = crime_filter(&req.params)?;
    to_json(&repo::list_crimes(conn, &query, &filter)?)
}

fn crimes_get(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let id = get_i64(&req.params, "id")?;
    let Some(crime) = repo::get_crime_by_id(conn, id)? else {
        return Err(HandlerErr::new("not_found", "crime not found").with_details(json!({ "id": id })));
    };
    Ok(json!({ "crime": crime }))
}

fn crimes_create(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let input: CrimeInput = parse_input(&req.params)?;
    let id = repo::add_crime(conn, &input.record())?;
    Ok(json!({ "id": id }))
}

fn crimes_update(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    if delete_requested(&req.params) {
        return Ok(json!({ "updated": false }));
    }
    let id = get_i64(&req.params, "id")?;
    let input: CrimeInput = parse_input(&req.params)?;
    repo::update_crime(conn, id, &input)?;
    Ok(json!({ "updated": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "crimes.list" => crimes_list(state, req),
        "crimes.get" => crimes_get(state, req),
        "crimes.create" => crimes_create(state, req),
        "crimes.update" => crimes_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
