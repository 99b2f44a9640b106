pub mod config;
pub mod day;
pub mod db;
pub mod error;
pub mod export;
pub mod import;
pub mod ipc;
pub mod model;
pub mod repo;
pub mod report;
pub mod session;
pub mod store;
pub mod watch;

pub use error::{Error, Result};
pub use store::Store;
