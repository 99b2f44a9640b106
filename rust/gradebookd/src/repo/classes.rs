use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::debug;

use crate::db::{self, bind_id, CLASSROOM_COLUMNS, STUDENT_COLUMNS};
use crate::error::{Error, Result};
use crate::model::{sort_roster, Classroom, Student};
use crate::store::Store;
use crate::watch::{SubscriptionId, Topic};

pub struct ClassRepository<'a> {
    store: &'a Store,
}

pub(crate) fn classrooms_for_teacher(conn: &Connection, teacher_id: i64) -> Result<Vec<Classroom>> {
    let sql = format!("SELECT {CLASSROOM_COLUMNS} FROM classrooms WHERE teacher_id = ? ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([teacher_id], db::classroom_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn students_for_classroom(conn: &Connection, classroom_id: i64) -> Result<Vec<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE classroom_id = ?");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map([classroom_id], db::student_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    sort_roster(&mut rows);
    Ok(rows)
}

/// Classroom a stored student currently belongs to, if the id exists.
fn stored_classroom(conn: &Connection, id: i64) -> Result<Option<i64>> {
    let Some(id) = bind_id(id) else {
        return Ok(None);
    };
    Ok(conn
        .query_row("SELECT classroom_id FROM students WHERE id = ?", [id], |r| r.get(0))
        .optional()?)
}

fn upsert_student_row(conn: &Connection, s: &Student) -> Result<i64> {
    if s.name.trim().is_empty() {
        return Err(Error::InvalidInput("student name must not be empty".to_string()));
    }
    conn.execute(
        "INSERT INTO students(id, classroom_id, name, seat_label, external_id, notes)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           classroom_id = excluded.classroom_id,
           name = excluded.name,
           seat_label = excluded.seat_label,
           external_id = excluded.external_id,
           notes = excluded.notes",
        (
            bind_id(s.id),
            s.classroom_id,
            &s.name,
            &s.seat_label,
            &s.external_id,
            &s.notes,
        ),
    )?;
    Ok(if s.id == crate::model::UNASSIGNED_ID {
        conn.last_insert_rowid()
    } else {
        s.id
    })
}

impl<'a> ClassRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn classrooms_for_teacher(&self, teacher_id: i64) -> Result<Vec<Classroom>> {
        classrooms_for_teacher(self.store.conn(), teacher_id)
    }

    pub fn watch_classrooms(
        &self,
        teacher_id: i64,
        on_change: impl FnMut(&[Classroom]) + 'static,
    ) -> Result<SubscriptionId> {
        self.store.subscribe(
            Topic::Classrooms { teacher_id },
            move |conn| classrooms_for_teacher(conn, teacher_id),
            on_change,
        )
    }

    /// Adds a classroom. A blank academic year falls back to the workspace default.
    pub fn add_classroom(
        &self,
        teacher_id: i64,
        name: &str,
        grade_level: &str,
        academic_year: Option<&str>,
    ) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("class name must not be empty".to_string()));
        }
        let academic_year = academic_year
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.store.config().default_academic_year.as_str())
            .to_string();
        self.store.write(|tx| {
            let exists = tx
                .query_row("SELECT 1 FROM teachers WHERE id = ?", [teacher_id], |r| {
                    r.get::<_, i64>(0)
                })
                .optional()?
                .is_some();
            if !exists {
                return Err(Error::not_found("teacher"));
            }
            tx.execute(
                "INSERT INTO classrooms(teacher_id, name, grade_level, academic_year)
                 VALUES(?, ?, ?, ?)",
                (teacher_id, name, grade_level, &academic_year),
            )?;
            Ok((
                tx.last_insert_rowid(),
                vec![Topic::Classrooms { teacher_id }],
            ))
        })
    }

    pub fn classroom(&self, id: i64) -> Result<Option<Classroom>> {
        let sql = format!("SELECT {CLASSROOM_COLUMNS} FROM classrooms WHERE id = ?");
        Ok(self
            .store
            .conn()
            .query_row(&sql, [id], db::classroom_from_row)
            .optional()?)
    }

    pub fn add_student(
        &self,
        classroom_id: i64,
        name: &str,
        seat_label: Option<&str>,
        notes: Option<&str>,
    ) -> Result<i64> {
        let mut student = Student::new(
            classroom_id,
            name.trim(),
            seat_label
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        student.notes = notes.map(str::to_string);
        self.upsert_student(&student)
    }

    pub fn upsert_student(&self, student: &Student) -> Result<i64> {
        self.store.write(|tx| {
            let previous = stored_classroom(tx, student.id)?;
            let id = upsert_student_row(tx, student)?;
            let mut topics = vec![Topic::Students { classroom_id: student.classroom_id }];
            if let Some(classroom_id) = previous.filter(|&c| c != student.classroom_id) {
                topics.push(Topic::Students { classroom_id });
            }
            Ok((id, topics))
        })
    }

    /// Inserts or replaces every student in one transaction; nothing is
    /// written if any row fails. A student moved to another classroom
    /// notifies both classrooms.
    pub fn upsert_students(&self, students: &[Student]) -> Result<Vec<i64>> {
        if students.is_empty() {
            return Ok(Vec::new());
        }
        self.store.write(|tx| {
            let mut ids = Vec::with_capacity(students.len());
            let mut classrooms = BTreeSet::new();
            for s in students {
                classrooms.extend(stored_classroom(tx, s.id)?);
                ids.push(upsert_student_row(tx, s)?);
                classrooms.insert(s.classroom_id);
            }
            debug!(count = ids.len(), "upserted students");
            let topics = classrooms
                .into_iter()
                .map(|classroom_id| Topic::Students { classroom_id })
                .collect();
            Ok((ids, topics))
        })
    }

    pub fn students(&self, classroom_id: i64) -> Result<Vec<Student>> {
        students_for_classroom(self.store.conn(), classroom_id)
    }

    pub fn watch_students(
        &self,
        classroom_id: i64,
        on_change: impl FnMut(&[Student]) + 'static,
    ) -> Result<SubscriptionId> {
        self.store.subscribe(
            Topic::Students { classroom_id },
            move |conn| students_for_classroom(conn, classroom_id),
            on_change,
        )
    }

    pub fn student(&self, id: i64) -> Result<Option<Student>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
        Ok(self
            .store
            .conn()
            .query_row(&sql, [id], db::student_from_row)
            .optional()?)
    }
}
