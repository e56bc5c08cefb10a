use crate::db;
use crate::ipc::error::{err, ok, source_err};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use crate::stats::{self, AttendanceRecord, ScopeFilter};
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;

fn source_paths(state: &AppState, req: &Request) -> Result<(PathBuf, PathBuf), serde_json::Value> {
    match (state.db_path(), state.roster_path()) {
        (Some(db), Some(roster)) => Ok((db, roster)),
        _ => Err(err(
            &req.id,
            "no_workspace",
            "select a workspace first",
            None,
        )),
    }
}

fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

const MAX_TREND_DAYS: usize = 366;
const MAX_RECENT_LIMIT: usize = 500;

fn bounded_count(
    req: &Request,
    key: &str,
    default: usize,
    max: usize,
) -> Result<usize, serde_json::Value> {
    let Some(v) = req.params.get(key) else {
        return Ok(default);
    };
    match v.as_u64() {
        Some(n) if n >= 1 && n <= max as u64 => Ok(n as usize),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be an integer between 1 and {}", key, max),
            None,
        )),
    }
}

fn record_json(r: &AttendanceRecord) -> serde_json::Value {
    json!({
        "date": r.date.format("%Y-%m-%d").to_string(),
        "className": r.class_name,
        "studentId": r.student_id,
        "name": r.name,
        "status": r.status.as_str(),
        "checkoutStatus": r.checkout_status.map(|c| c.as_str()),
        "time": r.timestamp.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
    })
}

/// One full refresh cycle: re-read both sources, aggregate, return every
/// figure the dashboard renders. The presentation layer calls this once per
/// tick; a failed cycle is simply retried on the next one.
fn snapshot(state: &AppState, req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    let (db_path, roster_path) = source_paths(state, req)?;
    let trend_days = bounded_count(
        req,
        "trendDays",
        stats::DEFAULT_TREND_DAYS as usize,
        MAX_TREND_DAYS,
    )?;
    let recent_limit = bounded_count(
        req,
        "recentLimit",
        stats::DEFAULT_RECENT_LIMIT,
        MAX_RECENT_LIMIT,
    )?;

    let records = db::load_history(&db_path).map_err(|e| source_err(&req.id, e))?;
    let Some(today) = stats::latest_date(&records) else {
        // Zero usable rows is a terminal state of its own, not a failure.
        return Ok(json!({
            "empty": true,
            "notice": "No attendance data yet."
        }));
    };

    let roster = roster::load_roster(&roster_path).map_err(|e| source_err(&req.id, e))?;

    let grade = optional_str(req, "grade");
    let class = optional_str(req, "class");
    let filter = ScopeFilter {
        grade: grade.as_deref(),
        class_name: class.as_deref(),
    };

    let roster_count = roster.count_for_scope(filter);
    let day_rows = stats::filter_day(&records, today, filter);
    let kpis = stats::aggregate(&records, roster_count, filter);
    let trend = stats::weekly_late_trend(&records, today, trend_days as u32);
    let heatmap = stats::late_heatmap(&day_rows);
    let recent: Vec<serde_json::Value> = stats::recent_scans(&records, recent_limit)
        .iter()
        .map(record_json)
        .collect();

    let status_counts = json!({
        "ontime": kpis.ontime,
        "late": kpis.late,
        "absent": kpis.absent,
    });
    let checkout_counts = json!({
        "checkedOut": kpis.checked_out,
        "notCheckedOut": kpis.not_checked_out,
    });
    let late_alert = kpis.late > 0;

    Ok(json!({
        "empty": false,
        "today": today.format("%Y-%m-%d").to_string(),
        "kpis": kpis,
        "statusCounts": status_counts,
        "checkoutCounts": checkout_counts,
        "lateAlert": late_alert,
        "trend": trend,
        "heatmap": heatmap,
        "recent": recent,
    }))
}

/// Distinct grades and class names seen in the data, for the drilldown
/// dropdowns.
fn filters(state: &AppState, req: &Request) -> Result<serde_json::Value, serde_json::Value> {
    let (db_path, _) = source_paths(state, req)?;
    let records = db::load_history(&db_path).map_err(|e| source_err(&req.id, e))?;

    let mut grades: BTreeSet<String> = BTreeSet::new();
    let mut classes: BTreeSet<String> = BTreeSet::new();
    for r in &records {
        if let Some(g) = stats::grade_of(&r.class_name) {
            grades.insert(g);
        }
        if !r.class_name.is_empty() {
            classes.insert(r.class_name.clone());
        }
    }

    Ok(json!({
        "grades": grades.into_iter().collect::<Vec<_>>(),
        "classes": classes.into_iter().collect::<Vec<_>>(),
    }))
}

fn handle_snapshot(state: &mut AppState, req: &Request) -> serde_json::Value {
    match snapshot(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(resp) => resp,
    }
}

fn handle_filters(state: &mut AppState, req: &Request) -> serde_json::Value {
    match filters(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.snapshot" => Some(handle_snapshot(state, req)),
        "dashboard.filters" => Some(handle_filters(state, req)),
        _ => None,
    }
}
