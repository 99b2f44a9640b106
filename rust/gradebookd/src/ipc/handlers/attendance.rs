use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_day, get_required_day, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, OpenSession, Request};
use crate::model::{AttendanceStatus, Student};
use crate::session::AttendanceSession;
use crate::store::Store;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};
use uuid::Uuid;

fn attendance_for_date(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let date = get_required_day(params, "date")?;
    let records = store.attendance().for_date(classroom_id, date)?;
    Ok(json!({ "date": date, "records": records }))
}

fn attendance_list(store: &Store, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let classroom_id = get_required_i64(params, "classroomId")?;
    let records = store.attendance().all(classroom_id)?;
    Ok(json!({ "records": records }))
}

fn session_view(session_id: &str, session: &AttendanceSession) -> serde_json::Value {
    let marks: Vec<serde_json::Value> = session
        .marks()
        .iter()
        .map(|(student_id, status)| json!({ "studentId": student_id, "status": status }))
        .collect();
    json!({
        "sessionId": session_id,
        "classroomId": session.classroom_id(),
        "roster": session.roster(),
        "marks": marks,
    })
}

fn session_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let classroom_id = get_required_i64(params, "classroomId")?;
    let holder = Rc::new(RefCell::new(AttendanceSession::open(store, classroom_id)?));

    let weak = Rc::downgrade(&holder);
    let roster_watch = store
        .classes()
        .watch_students(classroom_id, move |rows: &[Student]| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            match session.try_borrow_mut() {
                Ok(mut s) => s.refresh_roster(rows.to_vec()),
                Err(_) => warn!(classroom_id, "attendance session busy, roster refresh skipped"),
            };
        })?;

    let session_id = Uuid::new_v4().to_string();
    let view = session_view(&session_id, &holder.borrow());
    state.attendance_sessions.insert(
        session_id.clone(),
        OpenSession {
            holder,
            roster_watch,
        },
    );
    debug!(%session_id, classroom_id, "attendance session opened");
    Ok(view)
}

fn find_session(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<Rc<RefCell<AttendanceSession>>, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let open = state
        .attendance_sessions
        .get(&session_id)
        .ok_or_else(|| HandlerErr {
            code: "not_found",
            message: "attendance session not found".to_string(),
            details: Some(json!({ "sessionId": session_id })),
        })?;
    Ok(open.holder.clone())
}

fn session_mark(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let holder = find_session(state, params)?;
    let student_id = get_required_i64(params, "studentId")?;
    let status: AttendanceStatus = get_required_str(params, "status")?
        .parse()
        .map_err(|e: crate::Error| HandlerErr::bad_params(e.to_string()))?;
    holder.borrow_mut().mark(student_id, status)?;
    Ok(json!({ "studentId": student_id, "status": status }))
}

fn session_save(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let holder = find_session(state, params)?;
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let date = get_optional_day(params, "date")?;
    let session = holder.borrow();
    let records = match date {
        Some(date) => session.save_for_day(store, date)?,
        None => session.save(store)?,
    };
    Ok(json!({ "records": records }))
}

fn session_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    let Some(open) = state.attendance_sessions.remove(&session_id) else {
        return Ok(json!({ "closed": false }));
    };
    if let Some(store) = state.store.as_ref() {
        store.unsubscribe(open.roster_watch);
    }
    Ok(json!({ "closed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.session.open" => return Some(respond(&req.id, session_open(state, &req.params))),
        "attendance.session.mark" => return Some(respond(&req.id, session_mark(state, &req.params))),
        "attendance.session.save" => return Some(respond(&req.id, session_save(state, &req.params))),
        "attendance.session.close" => return Some(respond(&req.id, session_close(state, &req.params))),
        _ => {}
    }

    let handler = match req.method.as_str() {
        "attendance.forDate" => attendance_for_date,
        "attendance.list" => attendance_list,
        _ => return None,
    };
    let Some(store) = state.store.as_ref() else {
        return Some(HandlerErr::no_workspace().response(&req.id));
    };
    Some(respond(&req.id, handler(store, &req.params)))
}
