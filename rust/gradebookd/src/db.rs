use rusqlite::{Connection, Row};
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::model::{AttendanceRecord, Classroom, GradeRecord, Student, Teacher};

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

pub fn open_db(workspace: &Path) -> Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    init_schema(&conn)?;
    debug!("opened database at {}", db_path.display());
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            school_name TEXT NOT NULL,
            credential_hash TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_name ON teachers(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classrooms(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            teacher_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            grade_level TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classrooms_teacher ON classrooms(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            classroom_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            seat_label TEXT,
            external_id TEXT,
            notes TEXT,
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_classroom ON students(classroom_id)",
        [],
    )?;

    // No UNIQUE(student_id, date): repeated same-day saves are allowed to coexist.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            classroom_id INTEGER NOT NULL,
            date INTEGER NOT NULL,
            status TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_classroom_date ON attendance(classroom_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            classroom_id INTEGER NOT NULL,
            subject_name TEXT NOT NULL,
            exam_name TEXT NOT NULL,
            score REAL NOT NULL,
            max_score REAL NOT NULL,
            date INTEGER NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(classroom_id) REFERENCES classrooms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_classroom_exam ON grades(classroom_id, exam_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    Ok(())
}

/// Rowid to bind for an insert-or-replace: NULL lets SQLite assign one.
pub(crate) fn bind_id(id: i64) -> Option<i64> {
    (id != crate::model::UNASSIGNED_ID).then_some(id)
}

pub(crate) const TEACHER_COLUMNS: &str = "id, name, school_name, credential_hash";

pub(crate) fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: r.get(0)?,
        name: r.get(1)?,
        school_name: r.get(2)?,
        credential_hash: r.get(3)?,
    })
}

pub(crate) const CLASSROOM_COLUMNS: &str = "id, teacher_id, name, grade_level, academic_year";

pub(crate) fn classroom_from_row(r: &Row<'_>) -> rusqlite::Result<Classroom> {
    Ok(Classroom {
        id: r.get(0)?,
        teacher_id: r.get(1)?,
        name: r.get(2)?,
        grade_level: r.get(3)?,
        academic_year: r.get(4)?,
    })
}

pub(crate) const STUDENT_COLUMNS: &str = "id, classroom_id, name, seat_label, external_id, notes";

pub(crate) fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        classroom_id: r.get(1)?,
        name: r.get(2)?,
        seat_label: r.get(3)?,
        external_id: r.get(4)?,
        notes: r.get(5)?,
    })
}

pub(crate) const ATTENDANCE_COLUMNS: &str = "id, student_id, classroom_id, date, status";

pub(crate) fn attendance_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let status: String = r.get(4)?;
    let status = status.parse().map_err(|e: crate::error::Error| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())),
        )
    })?;
    Ok(AttendanceRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        classroom_id: r.get(2)?,
        date: r.get(3)?,
        status,
    })
}

pub(crate) const GRADE_COLUMNS: &str =
    "id, student_id, classroom_id, subject_name, exam_name, score, max_score, date";

pub(crate) fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<GradeRecord> {
    Ok(GradeRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        classroom_id: r.get(2)?,
        subject_name: r.get(3)?,
        exam_name: r.get(4)?,
        score: r.get(5)?,
        max_score: r.get(6)?,
        date: r.get(7)?,
    })
}
