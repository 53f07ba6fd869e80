use serde_json::json;
use std::path::PathBuf;

use crate::access::Capability;
use crate::export::{self, ReportKind};
use crate::import;
use crate::ipc::handlers::users::bulk_result;
use crate::ipc::helpers::{
    date_range, get_required_str, guard, parse_param, respond, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::LogEntity;

fn handle_import_users(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let path = PathBuf::from(get_required_str(&req.params, "path")?);
    let outcome = import::import_users(&mut state.dashboard, &path)
        .map_err(|e| HandlerErr::new("parse_failed", format!("{e:#}")))?;
    Ok(bulk_result(&outcome))
}

fn handle_import_assignments(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let path = PathBuf::from(get_required_str(&req.params, "path")?);
    let outcome = import::import_class_assignments(&mut state.dashboard, &path)
        .map_err(|e| HandlerErr::new("parse_failed", format!("{e:#}")))?;
    Ok(bulk_result(&outcome))
}

fn handle_export_report(state: &mut AppState, req: &Request) -> HandlerResult {
    let kind: ReportKind = parse_param(&req.params, "kind")?;
    let cap = match kind {
        ReportKind::Logs => Capability::ManageUsers,
        _ => Capability::ManageDiscipline,
    };
    guard(state, cap)?;
    let out_path = PathBuf::from(get_required_str(&req.params, "outPath")?);
    let range = date_range(&req.params)?;
    let summary = export::export_report(&state.dashboard, kind, range, &out_path)
        .map_err(|e| HandlerErr::new("export_failed", format!("{e:#}")))?;
    state.dashboard.record_export(
        LogEntity::Reports,
        &format!(
            "Exported {} report ({} row(s)) to {}",
            kind.as_str(),
            summary.rows,
            out_path.to_string_lossy()
        ),
    )?;
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rows": summary.rows,
        "bytes": summary.bytes,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "import.users" => handle_import_users(state, req),
        "import.classAssignments" => handle_import_assignments(state, req),
        "export.report" => handle_export_report(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
