use serde_json::{json, Map, Value};

use crate::access::Capability;
use crate::ipc::helpers::{guard, respond, to_value, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::AppSettings;

/// Nested objects merge key by key; anything else replaces the current value.
/// Keys the settings object does not have are refused.
fn merge_patch(current: &mut Map<String, Value>, patch: &Map<String, Value>, path: &str) -> Result<(), String> {
    for (k, v) in patch {
        let Some(slot) = current.get_mut(k) else {
            return Err(format!("unknown setting: {path}{k}"));
        };
        match (slot.as_object_mut(), v.as_object()) {
            (Some(inner), Some(sub)) => merge_patch(inner, sub, &format!("{path}{k}."))?,
            _ => *slot = v.clone(),
        }
    }
    Ok(())
}

fn handle_get(state: &mut AppState) -> HandlerResult {
    Ok(json!({ "settings": state.dashboard.settings() }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let mut current = to_value(state.dashboard.settings())?;
    let Some(obj) = current.as_object_mut() else {
        return Err(HandlerErr::new("server_error", "settings are not an object"));
    };
    merge_patch(obj, patch, "").map_err(HandlerErr::bad_params)?;
    let next: AppSettings = serde_json::from_value(current)
        .map_err(|e| HandlerErr::bad_params(format!("invalid settings: {e}")))?;
    let saved = state.dashboard.update_settings(next)?;
    Ok(json!({ "settings": saved }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_get(state),
        "settings.update" => handle_update(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
