use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_required_day, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Outbox, PendingEvent, Request};
use crate::model::{AttendanceRecord, Classroom, GradeRecord, Student};
use crate::watch::{SubscriptionId, Topic};
use serde::Serialize;
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;
use tracing::warn;

/// Listener that queues each emission as a `watch.changed` event.
fn emitter<T: Serialize + 'static>(
    outbox: Outbox,
    slot: Rc<Cell<u64>>,
    topic: Topic,
) -> impl FnMut(&[T]) + 'static {
    move |rows: &[T]| {
        let rows = match serde_json::to_value(rows) {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to serialize live query rows: {e}");
                return;
            }
        };
        outbox.borrow_mut().push(PendingEvent {
            subscription: slot.clone(),
            topic,
            rows,
        });
    }
}

fn watch_subscribe(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let query = get_required_str(params, "query")?;
    let slot = Rc::new(Cell::new(0));
    let outbox = state.outbox.clone();

    let (id, topic) = match query.as_str() {
        "classrooms" => {
            let teacher_id = get_required_i64(params, "teacherId")?;
            let topic = Topic::Classrooms { teacher_id };
            let id = store
                .classes()
                .watch_classrooms(teacher_id, emitter::<Classroom>(outbox, slot.clone(), topic))?;
            (id, topic)
        }
        "students" => {
            let classroom_id = get_required_i64(params, "classroomId")?;
            let topic = Topic::Students { classroom_id };
            let id = store
                .classes()
                .watch_students(classroom_id, emitter::<Student>(outbox, slot.clone(), topic))?;
            (id, topic)
        }
        "attendance.forDate" => {
            let classroom_id = get_required_i64(params, "classroomId")?;
            let date = get_required_day(params, "date")?;
            let topic = Topic::Attendance { classroom_id };
            let id = store
                .attendance()
                .watch_for_date(classroom_id, date, emitter::<AttendanceRecord>(outbox, slot.clone(), topic))?;
            (id, topic)
        }
        "attendance.list" => {
            let classroom_id = get_required_i64(params, "classroomId")?;
            let topic = Topic::Attendance { classroom_id };
            let id = store
                .attendance()
                .watch_all(classroom_id, emitter::<AttendanceRecord>(outbox, slot.clone(), topic))?;
            (id, topic)
        }
        "grades.forExam" => {
            let classroom_id = get_required_i64(params, "classroomId")?;
            let exam = get_required_str(params, "exam")?;
            let topic = Topic::Grades { classroom_id };
            let id = store.grades().watch_for_exam(
                classroom_id,
                exam.trim(),
                emitter::<GradeRecord>(outbox, slot.clone(), topic),
            )?;
            (id, topic)
        }
        "grades.forStudent" => {
            let student_id = get_required_i64(params, "studentId")?;
            let topic = Topic::StudentGrades { student_id };
            let id = store
                .grades()
                .watch_for_student(student_id, emitter::<GradeRecord>(outbox, slot.clone(), topic))?;
            (id, topic)
        }
        "grades.list" => {
            let classroom_id = get_required_i64(params, "classroomId")?;
            let topic = Topic::Grades { classroom_id };
            let id = store
                .grades()
                .watch_all(classroom_id, emitter::<GradeRecord>(outbox, slot.clone(), topic))?;
            (id, topic)
        }
        other => {
            return Err(HandlerErr {
                code: "bad_params",
                message: format!("unknown query: {other}"),
                details: None,
            })
        }
    };
    slot.set(id.0);
    Ok(json!({ "subscriptionId": id, "topic": topic }))
}

fn watch_unsubscribe(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let store = state.store.as_ref().ok_or_else(HandlerErr::no_workspace)?;
    let id = get_required_i64(params, "subscriptionId")?;
    let removed = u64::try_from(id)
        .map(|id| store.unsubscribe(SubscriptionId(id)))
        .unwrap_or(false);
    Ok(json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "watch.subscribe" => Some(respond(&req.id, watch_subscribe(state, &req.params))),
        "watch.unsubscribe" => Some(respond(&req.id, watch_unsubscribe(state, &req.params))),
        _ => None,
    }
}
