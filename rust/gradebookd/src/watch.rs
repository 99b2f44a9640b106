//! Live queries.
//!
//! A subscription pairs a [`Topic`] with a listener that re-runs its query
//! and hands the fresh rows to the caller. The store calls
//! [`Watchers::notify`] after a write has committed, so listeners only ever
//! observe committed state. Listeners fire in registration order.

use rusqlite::Connection;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Topic {
    #[serde(rename_all = "camelCase")]
    Classrooms { teacher_id: i64 },
    #[serde(rename_all = "camelCase")]
    Students { classroom_id: i64 },
    #[serde(rename_all = "camelCase")]
    Attendance { classroom_id: i64 },
    #[serde(rename_all = "camelCase")]
    Grades { classroom_id: i64 },
    #[serde(rename_all = "camelCase")]
    StudentGrades { student_id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

type Listener = Box<dyn FnMut(&Connection)>;

struct Entry {
    id: SubscriptionId,
    topic: Topic,
    listener: Listener,
}

#[derive(Default)]
pub struct Watchers {
    next_id: Cell<u64>,
    entries: RefCell<Vec<Entry>>,
    // Ids of entries checked out by running dispatches, innermost last.
    checked_out: RefCell<Vec<SubscriptionId>>,
    // Checked-out ids unsubscribed before their dispatch finished.
    cancelled: RefCell<HashSet<SubscriptionId>>,
}

impl Watchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live query. `query` runs immediately and `on_change`
    /// receives the initial rows before this returns.
    pub fn subscribe<T, Q, F>(
        &self,
        conn: &Connection,
        topic: Topic,
        query: Q,
        mut on_change: F,
    ) -> Result<SubscriptionId>
    where
        T: 'static,
        Q: Fn(&Connection) -> Result<Vec<T>> + 'static,
        F: FnMut(&[T]) + 'static,
    {
        let initial = query(conn)?;
        on_change(&initial);

        let id = SubscriptionId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        let listener: Listener = Box::new(move |conn: &Connection| match query(conn) {
            Ok(rows) => on_change(&rows),
            Err(e) => warn!(subscription = id.0, "live query refresh failed: {e}"),
        });
        self.entries.borrow_mut().push(Entry {
            id,
            topic,
            listener,
        });
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            entries.remove(pos);
            return true;
        }
        drop(entries);
        if self.checked_out.borrow().contains(&id) {
            return self.cancelled.borrow_mut().insert(id);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, conn: &Connection, changed: &[Topic]) {
        if changed.is_empty() {
            return;
        }
        // Listeners may subscribe or unsubscribe while running, so dispatch
        // from a checked-out list and merge afterwards.
        let mut dispatching = std::mem::take(&mut *self.entries.borrow_mut());
        let base = self.checked_out.borrow().len();
        self.checked_out
            .borrow_mut()
            .extend(dispatching.iter().map(|e| e.id));
        for entry in dispatching.iter_mut() {
            if self.cancelled.borrow().contains(&entry.id) {
                continue;
            }
            if changed.contains(&entry.topic) {
                (entry.listener)(conn);
            }
        }
        self.checked_out.borrow_mut().truncate(base);

        {
            let mut cancelled = self.cancelled.borrow_mut();
            dispatching.retain(|e| !cancelled.remove(&e.id));
        }
        let mut entries = self.entries.borrow_mut();
        dispatching.append(&mut entries);
        *entries = dispatching;
    }
}
