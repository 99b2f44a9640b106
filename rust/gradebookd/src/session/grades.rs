use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::SavePolicy;
use crate::day;
use crate::error::{Error, Result};
use crate::model::{GradeRecord, Student, UNASSIGNED_ID};
use crate::store::Store;

/// Free-text scores typed for one exam. Text is only validated on save.
#[derive(Debug, Clone)]
pub struct GradeSession {
    classroom_id: i64,
    roster: Vec<Student>,
    scores: BTreeMap<i64, String>,
}

/// A score entry counts when its trimmed text is a finite, non-negative number.
pub fn parse_score(text: &str) -> Option<f64> {
    let v = text.trim().parse::<f64>().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v)
}

impl GradeSession {
    pub fn open(store: &Store, classroom_id: i64) -> Result<Self> {
        if store.classes().classroom(classroom_id)?.is_none() {
            return Err(Error::not_found("classroom"));
        }
        let roster = store.classes().students(classroom_id)?;
        Ok(Self::from_roster(classroom_id, roster))
    }

    pub fn from_roster(classroom_id: i64, roster: Vec<Student>) -> Self {
        Self {
            classroom_id,
            roster,
            scores: BTreeMap::new(),
        }
    }

    /// Applies a newer roster. Scores typed for students who left it are
    /// dropped; the rest are kept.
    pub fn refresh_roster(&mut self, roster: Vec<Student>) {
        self.scores.retain(|id, _| roster.iter().any(|s| s.id == *id));
        self.roster = roster;
    }

    pub fn classroom_id(&self) -> i64 {
        self.classroom_id
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn scores(&self) -> &BTreeMap<i64, String> {
        &self.scores
    }

    pub fn set_score(&mut self, student_id: i64, text: impl Into<String>) -> Result<()> {
        if !self.roster.iter().any(|s| s.id == student_id) {
            return Err(Error::not_found(format!("student {student_id} in session")));
        }
        self.scores.insert(student_id, text.into());
        Ok(())
    }

    /// Builds one record per parsable score; the rest are dropped.
    pub fn records(
        &self,
        subject: &str,
        exam: &str,
        max_score: f64,
        date: i64,
    ) -> Vec<GradeRecord> {
        self.scores
            .iter()
            .filter_map(|(&student_id, text)| {
                let Some(score) = parse_score(text) else {
                    debug!(student_id, "skipping unparsable score");
                    return None;
                };
                Some(GradeRecord {
                    id: UNASSIGNED_ID,
                    student_id,
                    classroom_id: self.classroom_id,
                    subject_name: subject.to_string(),
                    exam_name: exam.to_string(),
                    score,
                    max_score,
                    date,
                })
            })
            .collect()
    }

    pub fn save(
        &self,
        store: &Store,
        subject: &str,
        exam: &str,
        max_score: f64,
    ) -> Result<Vec<GradeRecord>> {
        let exam = exam.trim();
        if exam.is_empty() {
            return Err(Error::InvalidInput("exam name must not be empty".to_string()));
        }
        if !max_score.is_finite() || max_score < 0.0 {
            return Err(Error::InvalidInput(format!("invalid max score: {max_score}")));
        }
        let mut records = self.records(subject.trim(), exam, max_score, day::now_millis());
        let ids = match store.config().grade_policy {
            SavePolicy::Append => store.grades().save(&records)?,
            SavePolicy::Replace => store.grades().replace_exam(&records)?,
        };
        for (r, id) in records.iter_mut().zip(ids) {
            r.id = id;
        }
        info!(
            classroom_id = self.classroom_id,
            entered = self.scores.len(),
            saved = records.len(),
            "saved grade session"
        );
        Ok(records)
    }
}
