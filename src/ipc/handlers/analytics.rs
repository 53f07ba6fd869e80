use chrono::NaiveDate;
use serde_json::json;

use crate::access::Capability;
use crate::calc::{self, RecordKind};
use crate::ipc::helpers::{
    date_range, get_optional_str, get_required_str, guard, guard_self_or, parse_param, respond,
    HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};

fn today_param(req: &Request) -> Result<NaiveDate, HandlerErr> {
    match get_optional_str(&req.params, "today") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| HandlerErr::bad_params("today must be YYYY-MM-DD")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn handle_student_summaries(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let range = date_range(&req.params)?;
    Ok(json!({ "rows": state.dashboard.student_summaries(range) }))
}

fn handle_student_report(state: &mut AppState, req: &Request) -> HandlerResult {
    let nipd = get_required_str(&req.params, "nipd")?;
    guard_self_or(state, &nipd, Capability::ViewDiscipline)?;
    let range = date_range(&req.params)?;
    Ok(json!({ "report": state.dashboard.student_report(&nipd, range)? }))
}

fn handle_unassigned(state: &mut AppState) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    Ok(json!({ "students": state.dashboard.unassigned_students() }))
}

fn handle_class_violations(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let range = date_range(&req.params)?;
    Ok(json!({ "rows": state.dashboard.class_violation_counts(range) }))
}

fn handle_top_offenders(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let range = date_range(&req.params)?;
    Ok(json!({ "rows": state.dashboard.top_offenders(range) }))
}

fn handle_most_common(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let kind: RecordKind = parse_param(&req.params, "kind")?;
    let range = date_range(&req.params)?;
    Ok(json!({ "item": state.dashboard.most_common(kind, range) }))
}

/// `month` defaults to the month containing `today`.
fn handle_dashboard(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let today = today_param(req)?;
    let month = get_optional_str(&req.params, "month").unwrap_or_else(|| calc::month_key(today));
    let range = calc::month_range(&month)?;
    Ok(json!({ "overview": state.dashboard.dashboard(today, range) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "analytics.studentSummaries" => handle_student_summaries(state, req),
        "analytics.studentReport" => handle_student_report(state, req),
        "analytics.unassigned" => handle_unassigned(state),
        "analytics.classViolations" => handle_class_violations(state, req),
        "analytics.topOffenders" => handle_top_offenders(state, req),
        "analytics.mostCommon" => handle_most_common(state, req),
        "analytics.dashboard" => handle_dashboard(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
