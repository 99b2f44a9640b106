//! Workspace settings read from `gradebook.toml`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub const CONFIG_FILE_NAME: &str = "gradebook.toml";

/// What a second save for the same day (attendance) or exam (grades) does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePolicy {
    /// Insert a new set of rows next to the earlier ones.
    #[default]
    Append,
    /// Replace the earlier rows for the same student.
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfPagination {
    #[default]
    Spill,
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_academic_year: String,
    pub attendance_policy: SavePolicy,
    pub grade_policy: SavePolicy,
    pub pdf_pagination: PdfPagination,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_academic_year: "2025-2026".to_string(),
            attendance_policy: SavePolicy::Append,
            grade_policy: SavePolicy::Append,
            pdf_pagination: PdfPagination::Spill,
        }
    }
}

impl Config {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Best-effort load. A missing or malformed file yields the defaults;
    /// it must never keep a workspace from opening.
    pub fn load_from_workspace(workspace: &Path) -> Self {
        let path = workspace.join(CONFIG_FILE_NAME);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no {} in workspace, using defaults", CONFIG_FILE_NAME);
                return Self::default();
            }
            Err(e) => {
                warn!("failed to read {}: {e}", path.display());
                return Self::default();
            }
        };
        match Self::parse(&text) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("ignoring malformed {}: {e}", path.display());
                Self::default()
            }
        }
    }
}
