use crate::error::Error;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::json;

fn classes_list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    let classes = store.classes().classrooms_for_teacher(teacher_id)?;
    // Include roster sizes so the home screen can show them without a
    // second round trip per class.
    let mut out = Vec::with_capacity(classes.len());
    for c in classes {
        let student_count = store.classes().students(c.id)?.len();
        let mut v = json!(c);
        v["studentCount"] = json!(student_count);
        out.push(v);
    }
    Ok(json!({ "classes": out }))
}

fn classes_create(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    let name = get_required_str(params, "name")?;
    let grade_level = get_optional_str(params, "gradeLevel").unwrap_or_default();
    let academic_year = get_optional_str(params, "academicYear");
    let classroom_id = store.classes().add_classroom(
        teacher_id,
        &name,
        grade_level.trim(),
        academic_year.as_deref(),
    )?;
    Ok(json!({ "classroomId": classroom_id }))
}

fn classes_get(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let classroom = store
        .classes()
        .classroom(classroom_id)?
        .ok_or_else(|| Error::not_found("classroom"))?;
    Ok(json!({ "classroom": classroom }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler = match req.method.as_str() {
        "classes.list" => classes_list,
        "classes.create" => classes_create,
        "classes.get" => classes_get,
        _ => return None,
    };
    let Some(store) = state.store.as_ref() else {
        return Some(HandlerErr::no_workspace().response(&req.id));
    };
    Some(respond(&req.id, handler(store, &req.params)))
}
