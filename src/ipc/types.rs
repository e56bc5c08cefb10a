use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_DB_FILE: &str = "attendance_history.db";
pub const DEFAULT_ROSTER_FILE: &str = "students.csv";

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Selected workspace plus optional source-file overrides. Only paths are
/// held across requests: every refresh cycle re-reads both sources in full,
/// so there is nothing to cache or invalidate between ticks.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db_file: Option<String>,
    pub roster_file: Option<String>,
}

impl AppState {
    pub fn db_path(&self) -> Option<PathBuf> {
        let workspace = self.workspace.as_ref()?;
        Some(workspace.join(self.db_file.as_deref().unwrap_or(DEFAULT_DB_FILE)))
    }

    pub fn roster_path(&self) -> Option<PathBuf> {
        let workspace = self.workspace.as_ref()?;
        Some(workspace.join(self.roster_file.as_deref().unwrap_or(DEFAULT_ROSTER_FILE)))
    }
}
