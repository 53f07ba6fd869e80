use serde_json::json;

use crate::access::Capability;
use crate::ipc::helpers::{get_required_i64, guard, parse_param, respond, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{Introspeksi, NewIntrospeksi, NewSanksi, Sanksi};

// Sanctions and the remediation catalog share one shape: list, create,
// update and delete by id.

fn sanctions(state: &mut AppState, req: &Request, op: &str) -> HandlerResult {
    let d = &mut state.dashboard;
    match op {
        "create" => {
            let new: NewSanksi = parse_param(&req.params, "sanction")?;
            Ok(json!({ "sanction": d.add_sanction(new)? }))
        }
        "update" => {
            let row: Sanksi = parse_param(&req.params, "sanction")?;
            Ok(json!({ "sanction": d.update_sanction(row)? }))
        }
        _ => {
            let id = get_required_i64(&req.params, "id")?;
            Ok(json!({ "deleted": d.delete_sanction(id)?.id }))
        }
    }
}

fn remediation(state: &mut AppState, req: &Request, op: &str) -> HandlerResult {
    let d = &mut state.dashboard;
    match op {
        "create" => {
            let new: NewIntrospeksi = parse_param(&req.params, "entry")?;
            Ok(json!({ "entry": d.add_remediation(new)? }))
        }
        "update" => {
            let row: Introspeksi = parse_param(&req.params, "entry")?;
            Ok(json!({ "entry": d.update_remediation(row)? }))
        }
        _ => {
            let id = get_required_i64(&req.params, "id")?;
            Ok(json!({ "deleted": d.delete_remediation(id)?.id }))
        }
    }
}

fn dispatch(state: &mut AppState, req: &Request, family: &str, op: &str) -> HandlerResult {
    if op == "list" {
        guard(state, Capability::ViewDiscipline)?;
        let store = state.dashboard.store();
        return Ok(match family {
            "sanctions" => json!({ "sanctions": store.sanctions() }),
            _ => json!({ "entries": store.remediation() }),
        });
    }
    guard(state, Capability::ManageDiscipline)?;
    match family {
        "sanctions" => sanctions(state, req, op),
        _ => remediation(state, req, op),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (family, op) = req.method.split_once('.')?;
    if !matches!(family, "sanctions" | "remediation")
        || !matches!(op, "list" | "create" | "update" | "delete")
    {
        return None;
    }
    Some(respond(req, dispatch(state, req, family, op)))
}
