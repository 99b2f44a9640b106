use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::debug;

use crate::db::{self, bind_id, ATTENDANCE_COLUMNS};
use crate::error::Result;
use crate::model::AttendanceRecord;
use crate::store::Store;
use crate::watch::{SubscriptionId, Topic};

pub struct AttendanceRepository<'a> {
    store: &'a Store,
}

pub(crate) fn attendance_for_date(
    conn: &Connection,
    classroom_id: i64,
    date: i64,
) -> Result<Vec<AttendanceRecord>> {
    let sql = format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE classroom_id = ? AND date = ? ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((classroom_id, date), db::attendance_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn attendance_for_classroom(
    conn: &Connection,
    classroom_id: i64,
) -> Result<Vec<AttendanceRecord>> {
    let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE classroom_id = ? ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([classroom_id], db::attendance_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn upsert_row(conn: &Connection, r: &AttendanceRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO attendance(id, student_id, classroom_id, date, status)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           student_id = excluded.student_id,
           classroom_id = excluded.classroom_id,
           date = excluded.date,
           status = excluded.status",
        (
            bind_id(r.id),
            r.student_id,
            r.classroom_id,
            r.date,
            r.status.as_str(),
        ),
    )?;
    Ok(if r.id == crate::model::UNASSIGNED_ID {
        conn.last_insert_rowid()
    } else {
        r.id
    })
}

fn stored_classroom(conn: &Connection, id: i64) -> Result<Option<i64>> {
    let Some(id) = bind_id(id) else {
        return Ok(None);
    };
    Ok(conn
        .query_row("SELECT classroom_id FROM attendance WHERE id = ?", [id], |r| r.get(0))
        .optional()?)
}

/// Classrooms touched by a batch, including the ones records are moved out of.
#[derive(Default)]
struct Touched(BTreeSet<i64>);

impl Touched {
    fn record(&mut self, conn: &Connection, r: &AttendanceRecord) -> Result<()> {
        self.0.extend(stored_classroom(conn, r.id)?);
        self.0.insert(r.classroom_id);
        Ok(())
    }

    fn topics(self) -> Vec<Topic> {
        self.0
            .into_iter()
            .map(|classroom_id| Topic::Attendance { classroom_id })
            .collect()
    }
}

impl<'a> AttendanceRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Batch insert-or-replace keyed by id, in one transaction.
    pub fn save(&self, records: &[AttendanceRecord]) -> Result<Vec<i64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        self.store.write(|tx| {
            let mut touched = Touched::default();
            let mut ids = Vec::with_capacity(records.len());
            for r in records {
                touched.record(tx, r)?;
                ids.push(upsert_row(tx, r)?);
            }
            debug!(count = ids.len(), "saved attendance batch");
            Ok((ids, touched.topics()))
        })
    }

    /// Like [`save`](Self::save), but first drops any rows already stored
    /// for the same (student, classroom, day), so each student keeps one
    /// record per day.
    pub fn replace_day(&self, records: &[AttendanceRecord]) -> Result<Vec<i64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        self.store.write(|tx| {
            let mut touched = Touched::default();
            let mut ids = Vec::with_capacity(records.len());
            for r in records {
                touched.record(tx, r)?;
                let removed = tx.execute(
                    "DELETE FROM attendance WHERE student_id = ? AND classroom_id = ? AND date = ? AND id != ?",
                    (r.student_id, r.classroom_id, r.date, r.id),
                )?;
                if removed > 0 {
                    debug!(student_id = r.student_id, removed, "replaced same-day attendance");
                }
                ids.push(upsert_row(tx, r)?);
            }
            Ok((ids, touched.topics()))
        })
    }

    pub fn for_date(&self, classroom_id: i64, date: i64) -> Result<Vec<AttendanceRecord>> {
        attendance_for_date(self.store.conn(), classroom_id, date)
    }

    pub fn watch_for_date(
        &self,
        classroom_id: i64,
        date: i64,
        on_change: impl FnMut(&[AttendanceRecord]) + 'static,
    ) -> Result<SubscriptionId> {
        self.store.subscribe(
            Topic::Attendance { classroom_id },
            move |conn| attendance_for_date(conn, classroom_id, date),
            on_change,
        )
    }

    pub fn all(&self, classroom_id: i64) -> Result<Vec<AttendanceRecord>> {
        attendance_for_classroom(self.store.conn(), classroom_id)
    }

    pub fn watch_all(
        &self,
        classroom_id: i64,
        on_change: impl FnMut(&[AttendanceRecord]) + 'static,
    ) -> Result<SubscriptionId> {
        self.store.subscribe(
            Topic::Attendance { classroom_id },
            move |conn| attendance_for_classroom(conn, classroom_id),
            on_change,
        )
    }
}
