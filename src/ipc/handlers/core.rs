use serde_json::json;
use std::path::PathBuf;

use crate::ipc::helpers::{get_required_str, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState) -> HandlerResult {
    let d = &state.dashboard;
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": d.workspace_path().map(|p| p.to_string_lossy().to_string()),
        "sessionUser": d.current_user().map(|u| u.username.clone()),
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> HandlerResult {
    let path = PathBuf::from(get_required_str(&req.params, "path")?);
    state
        .dashboard
        .open_workspace(&path)
        .map_err(|e| HandlerErr::new("db_open_failed", e.to_string()))?;
    let d = &state.dashboard;
    Ok(json!({
        "workspacePath": path.to_string_lossy(),
        "sessionUser": d.current_user(),
        "settings": d.settings(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(respond(req, handle_health(state))),
        "workspace.select" => Some(respond(req, handle_workspace_select(state, req))),
        _ => None,
    }
}
