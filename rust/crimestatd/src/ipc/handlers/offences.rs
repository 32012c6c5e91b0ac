use crate::ipc::helpers::{
    delete_requested, get_i64, list_query, parse_input, require_db, respond, to_json, HandlerErr,
    HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{OffenceCategoryInput, OffenceInput};
use crate::repo;
use serde_json::json;

fn categories_list(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let query = list_query(&req.params)?;
    to_json(&repo::list_offence_categories(conn, &query)?)
}

fn categories_get(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let id = get_i64(&req.params, "id")?;
    let Some(category) = repo::get_offence_category_by_id(conn, id)? else {
        return Err(HandlerErr::new("not_found", "offence category not found")
            .with_details(json!({ "id": id })));
    };
    Ok(json!({ "offenceCategory": category }))
}

fn categories_create(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let input: OffenceCategoryInput = parse_input(&req.params)?;
    let id = repo::add_offence_category(conn, &input)?;
    Ok(json!({ "id": id }))
}

fn categories_update(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    if delete_requested(&req.params) {
        return Ok(json!({ "updated": false }));
    }
    let id = get_i64(&req.params, "id")?;
    let input: OffenceCategoryInput = parse_input(&req.params)?;
    repo::update_offence_category(conn, id, &input)?;
    Ok(json!({ "updated": true }))
}

fn offences_list(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let query = list_query(&req.params)?;
    to_json(&repo::list_offences(conn, &query)?)
}

fn offences_get(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let id = get_i64(&req.params, "id")?;
    let Some(offence) = repo::get_offence_by_id(conn, id)? else {
        return Err(HandlerErr::new("not_found", "offence not found")
            .with_details(json!({ "id": id })));
    };
    Ok(json!({ "offence": offence }))
}

fn offences_create(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    let input: OffenceInput = parse_input(&req.params)?;
    let id = repo::add_offence(conn, &input)?;
    Ok(json!({ "id": id }))
}

fn offences_update(state: &AppState, req: &Request) -> HandlerResult {
    let conn = require_db(state)?;
    if delete_requested(&req.params) {
        return Ok(json!({ "updated": false }));
    }
    let id = get_i64(&req.params, "id")?;
    let input: OffenceInput = parse_input(&req.params)?;
    repo::update_offence(conn, id, &input)?;
    Ok(json!({ "updated": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "offenceCategories.list" => categories_list(state, req),
        "offenceCategories.get" => categories_get(state, req),
        "offenceCategories.create" => categories_create(state, req),
        "offenceCategories.update" => categories_update(state, req),
        "offences.list" => offences_list(state, req),
        "offences.get" => offences_get(state, req),
        "offences.create" => offences_create(state, req),
        "offences.update" => offences_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
