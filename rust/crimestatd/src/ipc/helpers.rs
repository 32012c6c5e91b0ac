use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::listing::ListQuery;
use crate::repo::RepoError;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RepoError> for HandlerErr {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Invalid(msg) => HandlerErr::new("bad_params", msg),
            RepoError::NotFound { entity, id } => {
                HandlerErr::new("not_found", format!("{entity} {id} not found"))
                    .with_details(json!({ "entity": entity, "id": id }))
            }
            RepoError::Conflict(msg) => HandlerErr::new("conflict", msg),
            RepoError::Db(e) => HandlerErr::new("db_query_failed", e.to_string()),
        }
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

pub fn respond(req: &Request, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn get_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    get_opt_i64(params, key)?.ok_or_else(|| HandlerErr::new("bad_params", format!("missing {key}")))
}

pub fn get_opt_i64(params: &serde_json::Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{key} must be an integer"))),
    }
}

pub fn get_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(HandlerErr::new("bad_params", format!("missing {key}"))),
    }
}

/// Deserializes the whole params object into a typed input.
pub fn parse_input<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid params: {e}")))
}

pub fn list_query(params: &serde_json::Value) -> Result<ListQuery, HandlerErr> {
    ListQuery::from_params(params).map_err(|msg| HandlerErr::new("bad_params", msg))
}

/// Admin edit forms post `isDelete: true` from their delete button; those posts are ignored.
pub fn delete_requested(params: &serde_json::Value) -> bool {
    params
        .get("isDelete")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("internal", e.to_string()))
}
