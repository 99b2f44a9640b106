use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_f64, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, OpenSession, Request};
use crate::model::Student;
use crate::session::GradeSession;
use crate::store::Store;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};
use uuid::Uuid;

fn grades_for_exam(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let exam = get_required_str(params, "exam")?;
    let grades = store.grades().for_exam(classroom_id, exam.trim())?;
    Ok(json!({ "grades": grades }))
}

fn grades_for_student(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let grades = store.grades().for_student(student_id)?;
    Ok(json!({ "grades": grades }))
}

fn grades_list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let grades = store.grades().all(classroom_id)?;
    Ok(json!({ "grades": grades }))
}

fn session_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let classroom_id = get_required_i64(params, "classroomId")?;
    let holder = Rc::new(RefCell::new(GradeSession::open(store, classroom_id)?));

    let weak = Rc::downgrade(&holder);
    let roster_watch = store
        .classes()
        .watch_students(classroom_id, move |rows: &[Student]| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            match session.try_borrow_mut() {
                Ok(mut s) => s.refresh_roster(rows.to_vec()),
                Err(_) => warn!(classroom_id, "grade session busy, roster refresh skipped"),
            };
        })?;

    let session_id = Uuid::new_v4().to_string();
    let roster = json!(holder.borrow().roster());
    state.grade_sessions.insert(
        session_id.clone(),
        OpenSession {
            holder,
            roster_watch,
        },
    );
    debug!(%session_id, classroom_id, "grade session opened");
    Ok(json!({
        "sessionId": session_id,
        "classroomId": classroom_id,
        "roster": roster,
    }))
}

fn find_session(state: &AppState, params: &serde_json::Value) -> Result<Rc<RefCell<GradeSession>>, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let open = state.grade_sessions.get(&session_id).ok_or_else(|| HandlerErr {
        code: "not_found",
        message: "grade session not found".to_string(),
        details: Some(json!({ "sessionId": session_id })),
    })?;
    Ok(open.holder.clone())
}

/// The score is kept as typed; it is only checked when the session is saved.
fn session_set_score(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let holder = find_session(state, params)?;
    let student_id = get_required_i64(params, "studentId")?;
    let text = match params.get("score") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(_) => return Err(HandlerErr::bad_params("score must be text or a number")),
    };
    holder.borrow_mut().set_score(student_id, text.clone())?;
    Ok(json!({ "studentId": student_id, "score": text }))
}

fn session_save(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let holder = find_session(state, params)?;
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let subject = get_optional_str(params, "subject").unwrap_or_default();
    let exam = get_required_str(params, "exam")?;
    let max_score = get_required_f64(params, "maxScore")?;
    let session = holder.borrow();
    let records = session.save(store, &subject, &exam, max_score)?;
    let discarded = session.scores().len() - records.len();
    Ok(json!({ "records": records, "discarded": discarded }))
}

fn session_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let Some(open) = state.grade_sessions.remove(&session_id) else {
        return Ok(json!({ "closed": false }));
    };
    if let Some(store) = state.store.as_ref() {
        store.unsubscribe(open.roster_watch);
    }
    Ok(json!({ "closed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.session.open" => return Some(respond(&req.id, session_open(state, &req.params))),
        "grades.session.setScore" => return Some(respond(&req.id, session_set_score(state, &req.params))),
        "grades.session.save" => return Some(respond(&req.id, session_save(state, &req.params))),
        "grades.session.close" => return Some(respond(&req.id, session_close(state, &req.params))),
        _ => {}
    }

    let handler = match req.method.as_str() {
        "grades.forExam" => grades_for_exam,
        "grades.forStudent" => grades_for_student,
        "grades.list" => grades_list,
        _ => return None,
    };
    let Some(store) = state.store.as_ref() else {
        return Some(HandlerErr::no_workspace().response(&req.id));
    };
    Some(respond(&req.id, handler(store, &req.params)))
}
