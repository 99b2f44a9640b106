//! Report model shared by the spreadsheet and PDF writers.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, GradeRecord, Student};
use crate::store::Store;

pub const MISSING_SCORE: &str = "-";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub student_id: i64,
    pub name: String,
    pub seat_label: Option<String>,
    pub absences: usize,
    /// One entry per exam column; `None` renders as [`MISSING_SCORE`].
    pub scores: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassReport {
    pub class_name: String,
    pub exam_columns: Vec<String>,
    pub rows: Vec<ReportRow>,
}

impl ClassReport {
    /// Rows follow roster order. When a student has several records for the
    /// same exam, the latest by date wins and then the last inserted.
    pub fn build(
        class_name: &str,
        students: &[Student],
        attendance: &[AttendanceRecord],
        grades: &[GradeRecord],
    ) -> Self {
        let exam_columns: Vec<String> = grades
            .iter()
            .map(|g| g.exam_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut absences: HashMap<i64, usize> = HashMap::new();
        for a in attendance {
            if a.status == AttendanceStatus::Absent {
                *absences.entry(a.student_id).or_default() += 1;
            }
        }

        let mut latest: HashMap<(i64, &str), &GradeRecord> = HashMap::new();
        for g in grades {
            latest
                .entry((g.student_id, g.exam_name.as_str()))
                .and_modify(|cur| {
                    if (g.date, g.id) > (cur.date, cur.id) {
                        *cur = g;
                    }
                })
                .or_insert(g);
        }

        let rows = students
            .iter()
            .map(|s| ReportRow {
                student_id: s.id,
                name: s.name.clone(),
                seat_label: s.seat_label.clone(),
                absences: absences.get(&s.id).copied().unwrap_or(0),
                scores: exam_columns
                    .iter()
                    .map(|exam| latest.get(&(s.id, exam.as_str())).map(|g| g.score))
                    .collect(),
            })
            .collect();

        Self {
            class_name: class_name.to_string(),
            exam_columns,
            rows,
        }
    }

    /// Snapshot of the classroom's current roster, attendance and grades.
    pub fn snapshot(store: &Store, classroom_id: i64) -> Result<Self> {
        let classroom = store
            .classes()
            .classroom(classroom_id)?
            .ok_or_else(|| Error::not_found("classroom"))?;
        let students = store.classes().students(classroom_id)?;
        let attendance = store.attendance().all(classroom_id)?;
        let grades = store.grades().all(classroom_id)?;
        Ok(Self::build(&classroom.name, &students, &attendance, &grades))
    }
}

/// Score text for drawn reports: always at least one decimal.
pub fn score_text(score: Option<f64>) -> String {
    match score {
        Some(v) if v.fract() == 0.0 => format!("{v:.1}"),
        Some(v) => v.to_string(),
        None => MISSING_SCORE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(id: i64, student_id: i64, exam: &str, score: f64, date: i64) -> GradeRecord {
        GradeRecord {
            id,
            student_id,
            classroom_id: 1,
            subject_name: "Math".to_string(),
            exam_name: exam.to_string(),
            score,
            max_score: 20.0,
            date,
        }
    }

    #[test]
    fn latest_grade_wins_for_duplicate_exam_rows() {
        let students = vec![Student { id: 1, ..Student::new(1, "Ada", None) }];
        let grades = vec![
            grade(1, 1, "Midterm", 10.0, 200),
            grade(2, 1, "Midterm", 12.0, 100),
            grade(3, 1, "Midterm", 14.0, 200),
        ];
        let report = ClassReport::build("7A", &students, &[], &grades);
        assert_eq!(report.rows[0].scores, vec![Some(14.0)]);
    }

    #[test]
    fn score_text_keeps_one_decimal() {
        assert_eq!(score_text(Some(15.0)), "15.0");
        assert_eq!(score_text(Some(15.25)), "15.25");
        assert_eq!(score_text(None), "-");
    }
}
