use serde_json::json;

use crate::access::Capability;
use crate::ipc::handlers::users::bulk_result;
use crate::ipc::helpers::{bulk_rows, get_required_str, guard, respond, HandlerErr, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, Siswa};
use crate::store::AssignmentRow;

fn handle_list(state: &mut AppState) -> HandlerResult {
    guard(state, Capability::ViewDiscipline)?;
    let store = state.dashboard.store();
    let rows: Vec<serde_json::Value> = store
        .users()
        .iter()
        .filter(|u| u.role == Role::Student)
        .map(|u| {
            let class = store.class_of(&u.username);
            json!({
                "nipd": u.username,
                "nama": u.nama,
                "jenis_kelamin": u.jenis_kelamin,
                "id_kelas": class.map(|k| k.id),
                "kelas": class.map(|k| k.kelas.clone()),
            })
        })
        .collect();
    Ok(json!({ "students": rows }))
}

fn assignment_param(req: &Request) -> Result<Siswa, HandlerErr> {
    let nipd = get_required_str(&req.params, "nipd")?;
    let id_kelas = match req.params.get("id_kelas") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| HandlerErr::bad_params("id_kelas must be an integer or null"))?,
        ),
    };
    Ok(Siswa { nipd, id_kelas })
}

fn handle_assign(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let row = state.dashboard.add_assignment(assignment_param(req)?)?;
    Ok(json!({ "assignment": row }))
}

fn handle_update(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let row = state.dashboard.update_assignment(assignment_param(req)?)?;
    Ok(json!({ "assignment": row }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let nipd = get_required_str(&req.params, "nipd")?;
    let removed = state.dashboard.delete_assignment(&nipd)?;
    Ok(json!({ "deleted": removed.nipd }))
}

fn handle_bulk_assign(state: &mut AppState, req: &Request) -> HandlerResult {
    guard(state, Capability::ManageDiscipline)?;
    let rows = bulk_rows::<AssignmentRow>(&req.params)?;
    let outcome = state.dashboard.assign_students_bulk(&rows);
    Ok(bulk_result(&outcome))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_list(state),
        "students.assign" => handle_assign(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        "students.bulkAssign" => handle_bulk_assign(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
