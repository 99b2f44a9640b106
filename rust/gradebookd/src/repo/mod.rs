//! Per-entity façades over the [`Store`](crate::store::Store).

mod attendance;
mod classes;
mod grades;
mod teachers;

pub use attendance::AttendanceRepository;
pub use classes::ClassRepository;
pub use grades::GradeRepository;
pub use teachers::{hash_credential, CredentialVerifier, ExactMatch, TeacherRepository};
