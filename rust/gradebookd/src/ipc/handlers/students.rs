use crate::error::Error;
use crate::import;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::store::Store;
use serde_json::json;
use std::path::PathBuf;

fn students_list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let students = store.classes().students(classroom_id)?;
    Ok(json!({ "students": students }))
}

fn students_create(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let name = get_required_str(params, "name")?;
    let seat_label = get_optional_str(params, "seatLabel");
    let notes = get_optional_str(params, "notes");
    if store.classes().classroom(classroom_id)?.is_none() {
        return Err(Error::not_found("classroom").into());
    }
    let student_id = store.classes().add_student(
        classroom_id,
        &name,
        seat_label.as_deref(),
        notes.as_deref(),
    )?;
    Ok(json!({ "studentId": student_id }))
}

fn parse_student(v: &serde_json::Value) -> Result<Student, HandlerErr> {
    serde_json::from_value(v.clone()).map_err(|e| HandlerErr {
        code: "bad_params",
        message: format!("invalid student: {e}"),
        details: None,
    })
}

/// Accepts either `student` (one) or `students` (a batch written in one
/// transaction).
fn students_upsert(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    if let Some(one) = params.get("student") {
        let student = parse_student(one)?;
        let student_id = store.classes().upsert_student(&student)?;
        return Ok(json!({ "studentId": student_id }));
    }
    let Some(many) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing student or students"));
    };
    let students = many
        .iter()
        .map(parse_student)
        .collect::<Result<Vec<_>, _>>()?;
    let student_ids = store.classes().upsert_students(&students)?;
    Ok(json!({ "studentIds": student_ids }))
}

fn students_import(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let path = PathBuf::from(get_required_str(params, "path")?);
    let summary = import::import_students(store, &path, classroom_id)?;
    Ok(json!(summary))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler = match req.method.as_str() {
        "students.list" => students_list,
        "students.create" => students_create,
        "students.upsert" => students_upsert,
        "students.import" => students_import,
        _ => return None,
    };
    let Some(store) = state.store.as_ref() else {
        return Some(HandlerErr::no_workspace().response(&req.id));
    };
    Some(respond(&req.id, handler(store, &req.params)))
}
