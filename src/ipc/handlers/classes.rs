use serde_json::json;

use crate::access::Capability;
use crate::ipc::helpers::{
    get_optional_str, get_required_i64, guard, parse_param, respond, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Kelas, NewKelas, Tingkat};

fn handle_list(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let tingkat = match get_optional_str(&req.params, "tingkat") {
        Some(raw) => Some(
            Tingkat::parse(&raw)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown tingkat: {raw}")))?,
        ),
        None => None,
    };
    let store = state.dashboard.store();
    let rows: Vec<serde_json::Value> = store
        .classes()
        .iter()
        .filter(|k| tingkat.map_or(true, |t| k.tingkat == t))
        .map(|k| {
            let students = store
                .assignments()
                .iter()
                .filter(|s| s.id_kelas == Some(k.id))
                .count();
            json!({
                "id": k.id,
                "kelas": k.kelas,
                "tingkat": k.tingkat,
                "id_guru": k.id_guru,
                "waliKelas": k.id_guru.as_deref().and_then(|g| store.user(g)).map(|u| u.nama.clone()),
                "studentCount": students,
            })
        })
        .collect();
    Ok(json!({ "classes": rows }))
}

fn handle_create(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let new: NewKelas = parse_param(&req.params, "class")?;
    let row = state.dashboard.add_class(new)?;
    Ok(json!({ "class": row }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let row: Kelas = parse_param(&req.params, "class")?;
    let row = state.dashboard.update_class(row)?;
    Ok(json!({ "class": row }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let id = get_required_i64(&req.params, "id")?;
    let removed = state.dashboard.delete_class(id)?;
    Ok(json!({ "deleted": removed.id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => handle_list(state, req),
        "classes.create" => handle_create(state, req),
        "classes.update" => handle_update(state, req),
        "classes.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
