use serde_json::json;

use crate::access::Capability;
use crate::activity::LogFilter;
use crate::ipc::helpers::{get_required_str, guard, parse_param, parse_params, respond, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::LogEntity;

fn handle_list(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let filter: LogFilter = parse_params(&req.params)?;
    let entries = state.dashboard.list_logs(&filter);
    Ok(json!({ "total": entries.len(), "entries": entries }))
}

/// PDF and PNG reports are rendered by the UI; it reports them here.
fn handle_record_export(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let entity: LogEntity = parse_param(&req.params, "entity")?;
    let details = get_required_str(&req.params, "details")?;
    state.dashboard.record_export(entity, &details)?;
    Ok(json!({ "recorded": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "logs.list" => handle_list(state, req),
        "logs.recordExport" => handle_record_export(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
