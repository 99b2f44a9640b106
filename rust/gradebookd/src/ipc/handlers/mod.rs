pub mod attendance;
pub mod classes;
pub mod core;
pub mod grades;
pub mod reports;
pub mod students;
pub mod teachers;
pub mod watch;
