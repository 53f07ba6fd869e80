use serde_json::json;

use crate::access::Capability;
use crate::errors::CoreError;
use crate::ipc::helpers::{
    date_range, get_optional_str, get_required_i64, guard, guard_self_or, parse_param, respond,
    session, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Bimbingan, NewBimbingan, NewPelanggaran, Pelanggaran};

/// A student may list their own records; anything wider needs `ViewDiscipline`.
fn list_guard(state: &AppState, req: &Request) -> Result<Option<String>, HandlerErr> {
    match get_optional_str(&req.params, "nipd") {
        Some(nipd) => {
            guard_self_or(state, &nipd, Capability::ViewDiscipline)?;
            Ok(Some(nipd))
        }
        None => {
            guard(state, Capability::ViewDiscipline)?;
            Ok(None)
        }
    }
}

fn violations(state: &mut AppState, req: &Request, op: &str) -> HandlerResult {
    if op == "list" {
        let nipd = list_guard(state, req)?;
        let range = date_range(&req.params)?;
        let rows: Vec<&Pelanggaran> = state
            .dashboard
            .store()
            .violations()
            .iter()
            .filter(|p| nipd.as_deref().map_or(true, |n| p.nipd == n) && range.contains(p.tanggal))
            .collect();
        return Ok(json!({ "violations": rows }));
    }
    if op == "get" {
        session(state)?;
        let id = get_required_i64(&req.params, "id")?;
        let row = state
            .dashboard
            .store()
            .violation(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("violation", id))?;
        guard_self_or(state, &row.nipd, Capability::ViewDiscipline)?;
        return Ok(json!({ "violation": row }));
    }
    guard(state, Capability::ManageDiscipline)?;
    let d = &mut state.dashboard;
    match op {
        "create" => {
            let new: NewPelanggaran = parse_param(&req.params, "violation")?;
            Ok(json!({ "violation": d.add_violation(new)? }))
        }
        "update" => {
            let row: Pelanggaran = parse_param(&req.params, "violation")?;
            Ok(json!({ "violation": d.update_violation(row)? }))
        }
        _ => {
            let id = get_required_i64(&req.params, "id")?;
            Ok(json!({ "deleted": d.delete_violation(id)?.id }))
        }
    }
}

fn guidance(state: &mut AppState, req: &Request, op: &str) -> HandlerResult {
    if op == "list" {
        let nipd = list_guard(state, req)?;
        let range = date_range(&req.params)?;
        let rows: Vec<&Bimbingan> = state
            .dashboard
            .store()
            .guidance()
            .iter()
            .filter(|b| nipd.as_deref().map_or(true, |n| b.nipd == n) && range.contains(b.tanggal))
            .collect();
        return Ok(json!({ "guidance": rows }));
    }
    if op == "get" {
        session(state)?;
        let id = get_required_i64(&req.params, "id")?;
        let row = state
            .dashboard
            .store()
            .guidance_record(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("guidance record", id))?;
        guard_self_or(state, &row.nipd, Capability::ViewDiscipline)?;
        return Ok(json!({ "record": row }));
    }
    guard(state, Capability::ManageDiscipline)?;
    let d = &mut state.dashboard;
    match op {
        "create" => {
            let new: NewBimbingan = parse_param(&req.params, "record")?;
            Ok(json!({ "record": d.add_guidance(new)? }))
        }
        "update" => {
            let row: Bimbingan = parse_param(&req.params, "record")?;
            Ok(json!({ "record": d.update_guidance(row)? }))
        }
        _ => {
            let id = get_required_i64(&req.params, "id")?;
            Ok(json!({ "deleted": d.delete_guidance(id)?.id }))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (family, op) = req.method.split_once('.')?;
    if !matches!(op, "list" | "get" | "create" | "update" | "delete") {
        return None;
    }
    let result = match family {
        "violations" => violations(state, req, op),
        "guidance" => guidance(state, req, op),
        _ => return None,
    };
    Some(respond(req, result))
}
