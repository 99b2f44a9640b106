use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeSet;
use tracing::debug;

use crate::db::{self, bind_id, GRADE_COLUMNS};
use crate::error::Result;
use crate::model::GradeRecord;
use crate::store::Store;
use crate::watch::{SubscriptionId, Topic};

pub struct GradeRepository<'a> {
    store: &'a Store,
}

pub(crate) fn grades_for_exam(conn: &Connection, classroom_id: i64, exam: &str) -> Result<Vec<GradeRecord>> {
    let sql = format!(
        "SELECT {GRADE_COLUMNS} FROM grades WHERE classroom_id = ? AND exam_name = ? ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((classroom_id, exam), db::grade_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn grades_for_student(conn: &Connection, student_id: i64) -> Result<Vec<GradeRecord>> {
    let sql = format!("SELECT {GRADE_COLUMNS} FROM grades WHERE student_id = ? ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([student_id], db::grade_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub(crate) fn grades_for_classroom(conn: &Connection, classroom_id: i64) -> Result<Vec<GradeRecord>> {
    let sql = format!("SELECT {GRADE_COLUMNS} FROM grades WHERE classroom_id = ? ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([classroom_id], db::grade_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn upsert_row(conn: &Connection, g: &GradeRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO grades(id, student_id, classroom_id, subject_name, exam_name, score, max_score, date)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           student_id = excluded.student_id,
           classroom_id = excluded.classroom_id,
           subject_name = excluded.subject_name,
           exam_name = excluded.exam_name,
           score = excluded.score,
           max_score = excluded.max_score,
           date = excluded.date",
        (
            bind_id(g.id),
            g.student_id,
            g.classroom_id,
            &g.subject_name,
            &g.exam_name,
            g.score,
            g.max_score,
            g.date,
        ),
    )?;
    Ok(if g.id == crate::model::UNASSIGNED_ID {
        conn.last_insert_rowid()
    } else {
        g.id
    })
}

/// `(classroom_id, student_id)` of a stored grade, if the id exists.
fn stored_owner(conn: &Connection, id: i64) -> Result<Option<(i64, i64)>> {
    let Some(id) = bind_id(id) else {
        return Ok(None);
    };
    Ok(conn
        .query_row(
            "SELECT classroom_id, student_id FROM grades WHERE id = ?",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?)
}

/// Classrooms and students touched by a batch, old owners included.
#[derive(Default)]
struct Touched {
    classrooms: BTreeSet<i64>,
    students: BTreeSet<i64>,
}

impl Touched {
    fn record(&mut self, conn: &Connection, g: &GradeRecord) -> Result<()> {
        if let Some((classroom_id, student_id)) = stored_owner(conn, g.id)? {
            self.classrooms.insert(classroom_id);
            self.students.insert(student_id);
        }
        self.classrooms.insert(g.classroom_id);
        self.students.insert(g.student_id);
        Ok(())
    }

    fn topics(self) -> Vec<Topic> {
        self.classrooms
            .into_iter()
            .map(|classroom_id| Topic::Grades { classroom_id })
            .chain(
                self.students
                    .into_iter()
                    .map(|student_id| Topic::StudentGrades { student_id }),
            )
            .collect()
    }
}

impl<'a> GradeRepository<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Batch insert-or-replace keyed by id, in one transaction.
    pub fn save(&self, grades: &[GradeRecord]) -> Result<Vec<i64>> {
        if grades.is_empty() {
            return Ok(Vec::new());
        }
        self.store.write(|tx| {
            let mut touched = Touched::default();
            let mut ids = Vec::with_capacity(grades.len());
            for g in grades {
                touched.record(tx, g)?;
                ids.push(upsert_row(tx, g)?);
            }
            debug!(count = ids.len(), "saved grade batch");
            Ok((ids, touched.topics()))
        })
    }

    /// Like [`save`](Self::save), but a student's earlier rows for the same
    /// exam in the same classroom are dropped first.
    pub fn replace_exam(&self, grades: &[GradeRecord]) -> Result<Vec<i64>> {
        if grades.is_empty() {
            return Ok(Vec::new());
        }
        self.store.write(|tx| {
            let mut touched = Touched::default();
            let mut ids = Vec::with_capacity(grades.len());
            for g in grades {
                touched.record(tx, g)?;
                tx.execute(
                    "DELETE FROM grades WHERE student_id = ? AND classroom_id = ? AND exam_name = ? AND id != ?",
                    (g.student_id, g.classroom_id, &g.exam_name, g.id),
                )?;
                ids.push(upsert_row(tx, g)?);
            }
            Ok((ids, touched.topics()))
        })
    }

    pub fn for_exam(&self, classroom_id: i64, exam: &str) -> Result<Vec<GradeRecord>> {
        grades_for_exam(self.store.conn(), classroom_id, exam)
    }

    pub fn watch_for_exam(
        &self,
        classroom_id: i64,
        exam: &str,
        on_change: impl FnMut(&[GradeRecord]) + 'static,
    ) -> Result<SubscriptionId> {
        let exam = exam.to_string();
        self.store.subscribe(
            Topic::Grades { classroom_id },
            move |conn| grades_for_exam(conn, classroom_id, &exam),
            on_change,
        )
    }

    pub fn for_student(&self, student_id: i64) -> Result<Vec<GradeRecord>> {
        grades_for_student(self.store.conn(), student_id)
    }

    pub fn watch_for_student(
        &self,
        student_id: i64,
        on_change: impl FnMut(&[GradeRecord]) + 'static,
    ) -> Result<SubscriptionId> {
        self.store.subscribe(
            Topic::StudentGrades { student_id },
            move |conn| grades_for_student(conn, student_id),
            on_change,
        )
    }

    pub fn all(&self, classroom_id: i64) -> Result<Vec<GradeRecord>> {
        grades_for_classroom(self.store.conn(), classroom_id)
    }

    pub fn watch_all(
        &self,
        classroom_id: i64,
        on_change: impl FnMut(&[GradeRecord]) + 'static,
    ) -> Result<SubscriptionId> {
        self.store.subscribe(
            Topic::Grades { classroom_id },
            move |conn| grades_for_classroom(conn, classroom_id),
            on_change,
        )
    }
}
