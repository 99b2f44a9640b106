//! In-memory state for one attendance or grade-entry visit.

mod attendance;
mod grades;

pub use attendance::AttendanceSession;
pub use grades::{parse_score, GradeSession};
