use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Id carried by entities that have not been stored yet. Insert-or-replace
/// assigns a fresh rowid to these; any other id replaces the existing row.
pub const UNASSIGNED_ID: i64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub school_name: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    #[serde(default)]
    pub id: i64,
    pub teacher_id: i64,
    pub name: String,
    pub grade_level: String,
    pub academic_year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub id: i64,
    pub classroom_id: i64,
    pub name: String,
    #[serde(default)]
    pub seat_label: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Student {
    pub fn new(classroom_id: i64, name: impl Into<String>, seat_label: Option<String>) -> Self {
        Self {
            id: UNASSIGNED_ID,
            classroom_id,
            name: name.into(),
            seat_label,
            external_id: None,
            notes: None,
        }
    }

    fn seat_number(&self) -> Option<i64> {
        self.seat_label
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
    }
}

/// Roster order: numeric seats ascending, then everything without a numeric
/// seat; ties by name, then id.
pub fn roster_order(a: &Student, b: &Student) -> Ordering {
    let seat = match (a.seat_number(), b.seat_number()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    seat.then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_roster(students: &mut [Student]) {
    students.sort_by(roster_order);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(Error::Format(format!("unknown attendance status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(default)]
    pub id: i64,
    pub student_id: i64,
    pub classroom_id: i64,
    /// Epoch millis of local midnight.
    pub date: i64,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    #[serde(default)]
    pub id: i64,
    pub student_id: i64,
    pub classroom_id: i64,
    pub subject_name: String,
    pub exam_name: String,
    pub score: f64,
    pub max_score: f64,
    /// Epoch millis.
    pub date: i64,
}
