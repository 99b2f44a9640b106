use std::collections::BTreeMap;
use tracing::info;

use crate::config::SavePolicy;
use crate::day;
use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, Student, UNASSIGNED_ID};
use crate::store::Store;

/// Attendance marks for one screen visit. Nothing is persisted until
/// [`save`](Self::save); marks are never merged with records already
/// stored for the day.
#[derive(Debug, Clone)]
pub struct AttendanceSession {
    classroom_id: i64,
    roster: Vec<Student>,
    marks: BTreeMap<i64, AttendanceStatus>,
}

impl AttendanceSession {
    pub fn open(store: &Store, classroom_id: i64) -> Result<Self> {
        if store.classes().classroom(classroom_id)?.is_none() {
            return Err(Error::not_found("classroom"));
        }
        let roster = store.classes().students(classroom_id)?;
        Ok(Self::from_roster(classroom_id, roster))
    }

    pub fn from_roster(classroom_id: i64, roster: Vec<Student>) -> Self {
        let marks = roster
            .iter()
            .map(|s| (s.id, AttendanceStatus::Present))
            .collect();
        Self {
            classroom_id,
            roster,
            marks,
        }
    }

    /// Applies a newer roster. Marks of students still on it are kept,
    /// students seen for the first time start as present and marks of
    /// students who left are dropped.
    pub fn refresh_roster(&mut self, roster: Vec<Student>) {
        self.marks.retain(|id, _| roster.iter().any(|s| s.id == *id));
        for s in &roster {
            self.marks.entry(s.id).or_insert(AttendanceStatus::Present);
        }
        self.roster = roster;
    }

    pub fn classroom_id(&self) -> i64 {
        self.classroom_id
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn marks(&self) -> &BTreeMap<i64, AttendanceStatus> {
        &self.marks
    }

    pub fn status(&self, student_id: i64) -> Option<AttendanceStatus> {
        self.marks.get(&student_id).copied()
    }

    /// Replaces the mark for one student.
    pub fn mark(&mut self, student_id: i64, status: AttendanceStatus) -> Result<()> {
        match self.marks.get_mut(&student_id) {
            Some(slot) => {
                *slot = status;
                Ok(())
            }
            None => Err(Error::not_found(format!("student {student_id} in session"))),
        }
    }

    pub fn records_for_day(&self, date: i64) -> Vec<AttendanceRecord> {
        self.marks
            .iter()
            .map(|(&student_id, &status)| AttendanceRecord {
                id: UNASSIGNED_ID,
                student_id,
                classroom_id: self.classroom_id,
                date,
                status,
            })
            .collect()
    }

    /// Persists every mark stamped with today's local midnight.
    pub fn save(&self, store: &Store) -> Result<Vec<AttendanceRecord>> {
        self.save_for_day(store, day::today_millis())
    }

    pub fn save_for_day(&self, store: &Store, date: i64) -> Result<Vec<AttendanceRecord>> {
        let mut records = self.records_for_day(date);
        let ids = match store.config().attendance_policy {
            SavePolicy::Append => store.attendance().save(&records)?,
            SavePolicy::Replace => store.attendance().replace_day(&records)?,
        };
        for (r, id) in records.iter_mut().zip(ids) {
            r.id = id;
        }
        info!(
            classroom_id = self.classroom_id,
            count = records.len(),
            "saved attendance session"
        );
        Ok(records)
    }
}
