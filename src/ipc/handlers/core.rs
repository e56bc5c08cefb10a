use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Points the daemon at a workspace directory holding the attendance
/// database and the roster file. The sources themselves may not exist yet
/// (the scanner creates the database on first scan); each snapshot re-checks
/// them, so selection only validates the directory.
fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    if !path.is_dir() {
        return err(
            &req.id,
            "bad_params",
            format!("not a directory: {}", path.display()),
            None,
        );
    }

    let file_override = |key: &str| {
        req.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    state.db_file = file_override("dbFile");
    state.roster_file = file_override("rosterFile");
    state.workspace = Some(path.clone());

    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "dbPath": state.db_path().map(|p| p.to_string_lossy().to_string()),
            "rosterPath": state.roster_path().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
