use crate::db;
use crate::export;
use crate::ipc::error::{err, ok, source_err};
use crate::ipc::types::{AppState, Request};
use crate::stats::{self, ScopeFilter};
use serde_json::json;
use std::path::PathBuf;

/// Serializes today's filtered rows to a CSV file for download. An empty
/// drilldown still produces a header-only file.
fn rows_csv(state: &AppState, req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    let Some(db_path) = state.db_path() else {
        return Err(err(
            &req.id,
            "no_workspace",
            "select a workspace first",
            None,
        ));
    };
    let Some(out_path) = req
        .params
        .get("outPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return Err(err(&req.id, "bad_params", "missing params.outPath", None));
    };

    let grade = req
        .params
        .get("grade")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let class = req
        .params
        .get("class")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let filter = ScopeFilter {
        grade: grade.as_deref(),
        class_name: class.as_deref(),
    };

    let records = db::load_history(&db_path).map_err(|e| source_err(&req.id, e))?;
    let rows = match stats::latest_date(&records) {
        Some(today) => stats::filter_day(&records, today, filter),
        None => Vec::new(),
    };

    export::write_rows_csv(&out_path, &rows).map_err(|e| {
        err(
            &req.id,
            "export_write_failed",
            e.to_string(),
            Some(json!({ "outPath": out_path.to_string_lossy() })),
        )
    })?;

    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "rows": rows.len(),
    }))
}

fn handle_rows_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    match rows_csv(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "export.rowsCsv" => Some(handle_rows_csv(state, req)),
        _ => None,
    }
}
