use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::json;

use crate::session::{AttendanceSession, GradeSession};
use crate::store::Store;
use crate::watch::{SubscriptionId, Topic};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A session holder plus the roster subscription that keeps it current.
pub struct OpenSession<S> {
    pub holder: Rc<RefCell<S>>,
    pub roster_watch: SubscriptionId,
}

/// Rows produced by a live query, waiting to be written after the current
/// response. The id slot is filled once `watch.subscribe` returns, so the
/// initial emission carries the right id too.
pub struct PendingEvent {
    pub subscription: Rc<Cell<u64>>,
    pub topic: Topic,
    pub rows: serde_json::Value,
}

pub type Outbox = Rc<RefCell<Vec<PendingEvent>>>;

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Store>,
    pub attendance_sessions: HashMap<String, OpenSession<AttendanceSession>>,
    pub grade_sessions: HashMap<String, OpenSession<GradeSession>>,
    pub outbox: Outbox,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event lines queued since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<serde_json::Value> {
        self.outbox
            .borrow_mut()
            .drain(..)
            .map(|ev| {
                json!({
                    "event": "watch.changed",
                    "subscriptionId": ev.subscription.get(),
                    "topic": ev.topic,
                    "rows": ev.rows,
                })
            })
            .collect()
    }
}
