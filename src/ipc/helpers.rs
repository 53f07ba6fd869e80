use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::access::{self, Capability};
use crate::calc::{self, DateRange};
use crate::errors::CoreError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::User;
use crate::store::BulkRow;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        let details = match &e {
            CoreError::DuplicateKey { entity, key } | CoreError::NotFound { entity, key } => {
                Some(json!({ "entity": entity, "key": key }))
            }
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

pub type HandlerResult = Result<Value, HandlerErr>;

pub fn respond(req: &Request, result: HandlerResult) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => {
            tracing::debug!(method = %req.method, code = e.code, "{}", e.message);
            e.response(&req.id)
        }
    }
}

pub fn to_value<T: Serialize>(v: &T) -> HandlerResult {
    serde_json::to_value(v).map_err(|e| HandlerErr::new("server_error", e.to_string()))
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{key}")))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{key}")))
}

/// Deserializes the whole params object; absent params read as `{}`.
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerErr> {
    let params = if params.is_null() { json!({}) } else { params.clone() };
    serde_json::from_value(params)
        .map_err(|e| HandlerErr::bad_params(format!("invalid params: {e}")))
}

/// Deserializes `params[key]`.
pub fn parse_param<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing params.{key}")));
    };
    serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid params.{key}: {e}")))
}

/// Reads `params.rows` one element at a time so a malformed row is reported
/// at its position instead of failing the request.
pub fn bulk_rows<T: DeserializeOwned>(params: &Value) -> Result<Vec<BulkRow<T>>, HandlerErr> {
    let rows: Vec<Value> = parse_param(params, "rows")?;
    Ok(BulkRow::numbered(rows.into_iter().map(|v| {
        serde_json::from_value(v).map_err(|e| format!("invalid row: {e}"))
    })))
}

fn parse_date(params: &Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    let Some(raw) = get_optional_str(params, key) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| HandlerErr::bad_params(format!("{key} must be YYYY-MM-DD")))
}

/// `month` (YYYY-MM) wins over `start`/`end`; neither means all time.
pub fn date_range(params: &Value) -> Result<DateRange, HandlerErr> {
    if let Some(month) = get_optional_str(params, "month") {
        return Ok(calc::month_range(&month)?);
    }
    let range = DateRange {
        start: parse_date(params, "start")?,
        end: parse_date(params, "end")?,
    };
    if let (Some(s), Some(e)) = (range.start, range.end) {
        if s > e {
            return Err(HandlerErr::bad_params("start must not be after end"));
        }
    }
    Ok(range)
}

pub fn session(state: &AppState) -> Result<User, HandlerErr> {
    state
        .dashboard
        .current_user()
        .cloned()
        .ok_or_else(|| HandlerErr::new("unauthenticated", "sign in first"))
}

pub fn guard(state: &AppState, cap: Capability) -> Result<User, HandlerErr> {
    let user = session(state)?;
    access::require(&user, cap)?;
    Ok(user)
}

pub fn guard_self_or(state: &AppState, target: &str, cap: Capability) -> Result<User, HandlerErr> {
    let user = session(state)?;
    access::require_self_or(&user, target, cap)?;
    Ok(user)
}
