use serde_json::json;
use std::path::PathBuf;

use crate::access::Capability;
use crate::backup;
use crate::ipc::helpers::{get_required_str, guard, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};

fn handle_export(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let out_path = PathBuf::from(get_required_str(&req.params, "outPath")?);
    state.dashboard.simulate_backup_delay();
    let snap = state.dashboard.snapshot();
    let summary = backup::export_snapshot_bundle(&snap, &out_path)
        .map_err(|e| HandlerErr::new("export_failed", format!("{e:#}")))?;
    state.dashboard.record_backup(&out_path);
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "bundleId": summary.bundle_id,
        "sha256": summary.sha256,
        "entryCount": summary.entry_count,
    }))
}

fn handle_import(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageUsers)?;
    let in_path = PathBuf::from(get_required_str(&req.params, "inPath")?);
    state.dashboard.simulate_backup_delay();
    let (snap, summary) = backup::import_snapshot_bundle(&in_path)
        .map_err(|e| HandlerErr::new("import_failed", format!("{e:#}")))?;
    state.dashboard.restore(snap, &in_path)?;
    Ok(json!({
        "bundleFormatDetected": summary.bundle_format_detected,
        "bundleId": summary.bundle_id,
        "exportedAt": summary.exported_at,
        "sessionUser": state.dashboard.current_user().map(|u| u.username.clone()),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.export" => handle_export(state, req),
        "backup.import" => handle_import(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
