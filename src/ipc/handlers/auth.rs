use serde_json::json;

use crate::access::Capability;
use crate::ipc::helpers::{get_required_str, guard, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};

fn handle_login(state: &mut AppState, req: &Request) -> HandlerResult {
    let username = get_required_str(&req.params, "username")?;
    let password = req
        .params
        .get("password")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let user = state.dashboard.login(&username, password)?;
    Ok(json!({ "user": user }))
}

fn handle_logout(state: &mut AppState) -> HandlerResult {
    let user = state.dashboard.logout();
    Ok(json!({ "signedOut": user.map(|u| u.username) }))
}

fn handle_session(state: &mut AppState) -> HandlerResult {
    Ok(json!({ "user": state.dashboard.current_user() }))
}

fn handle_reset_request(state: &mut AppState, req: &Request) -> HandlerResult {
    let who = get_required_str(&req.params, "emailOrUsername")?;
    state.dashboard.reset_password_request(&who)?;
    Ok(json!({ "accepted": true }))
}

fn handle_change_password(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::OwnAccount)?;
    let current = req
        .params
        .get("currentPassword")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing params.currentPassword"))?;
    let next = req
        .params
        .get("newPassword")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params("missing params.newPassword"))?;
    state.dashboard.change_password(current, next)?;
    Ok(json!({ "changed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.login" => handle_login(state, req),
        "auth.logout" => handle_logout(state),
        "auth.session" => handle_session(state),
        "auth.resetPasswordRequest" => handle_reset_request(state, req),
        "auth.changePassword" => handle_change_password(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
