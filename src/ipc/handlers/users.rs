use serde_json::json;

use crate::access::{self, Capability};
use crate::ipc::helpers::{
    bulk_rows, get_optional_str, get_required_str, guard, guard_self_or, parse_param, respond,
    to_value, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, User};
use crate::store::{BulkOutcome, UserRow};

pub fn bulk_result(outcome: &BulkOutcome) -> serde_json::Value {
    json!({
        "successCount": outcome.success_count,
        "errors": outcome.errors,
        "message": outcome.summary_message(),
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let role = match get_optional_str(&req.params, "role") {
        Some(raw) => Some(Role::parse(&raw).ok_or_else(|| {
            let known: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
            HandlerErr::bad_params(format!("unknown role: {raw} (expected {})", known.join(", ")))
        })?),
        None => None,
    };
    let users: Vec<&User> = state
        .dashboard
        .store()
        .users()
        .iter()
        .filter(|u| role.map_or(true, |r| u.role == r))
        .collect();
    Ok(json!({ "users": to_value(&users)? }))
}

fn handle_create(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let user: User = parse_param(&req.params, "user")?;
    let created = state.dashboard.add_user(user)?;
    Ok(json!({ "user": created }))
}

fn handle_bulk_create(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let rows = bulk_rows::<UserRow>(&req.params)?;
    let outcome = state.dashboard.add_users_bulk(&rows);
    Ok(bulk_result(&outcome))
}

/// Without `ManageUsers` a caller may only rename themselves. An absent
/// `photo` keeps the current one; `null` clears it.
fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let mut user: User = parse_param(&req.params, "user")?;
    let photo_given = req
        .params
        .get("user")
        .is_some_and(|u| u.get("photo").is_some());
    let actor = guard_self_or(state, &user.username, Capability::ManageUsers)?;
    let existing = state.dashboard.store().user(&user.username).cloned();
    if let Some(existing) = existing {
        if !access::allows(actor.role, Capability::ManageUsers) {
            user.role = existing.role;
            user.jenis_kelamin = existing.jenis_kelamin;
        }
        if !photo_given {
            user.photo = existing.photo;
        }
    }
    let updated = state.dashboard.update_user(user)?;
    Ok(json!({ "user": updated }))
}

fn handle_update_photo(state: &mut AppState, req: &Request) -> HandlerResult {
    let username = get_required_str(&req.params, "username")?;
    guard_self_or(state, &username, Capability::ManageUsers)?;
    let photo = get_required_str(&req.params, "photo")?;
    let updated = state.dashboard.update_user_photo(&username, &photo)?;
    Ok(json!({ "user": updated }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let username = get_required_str(&req.params, "username")?;
    let removed = state.dashboard.delete_user(&username)?;
    Ok(json!({ "deleted": removed.username }))
}

fn handle_reset_password(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let username = get_required_str(&req.params, "username")?;
    state.dashboard.admin_reset_password(&username)?;
    Ok(json!({ "reset": username }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "users.list" => handle_list(state, req),
        "users.create" => handle_create(state, req),
        "users.bulkCreate" => handle_bulk_create(state, req),
        "users.update" => handle_update(state, req),
        "users.updatePhoto" => handle_update_photo(state, req),
        "users.delete" => handle_delete(state, req),
        "users.resetPassword" => handle_reset_password(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
