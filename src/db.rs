use crate::stats::{AttendanceRecord, CheckoutStatus, SourceError, Status};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, OpenFlags};
use serde_json::json;
use std::path::Path;

pub const HISTORY_TABLE: &str = "history";
pub const REQUIRED_COLUMNS: [&str; 5] = ["date", "class_name", "student_id", "name", "status"];

/// Column layout discovered from the history file. `checkout_status` and
/// `time` are written only by newer scanner firmware.
struct HistoryShape {
    has_checkout: bool,
    has_time: bool,
}

/// Reads the full attendance history. The file is owned by the scanner
/// process; this side only ever opens it read-only, once per refresh cycle.
///
/// Rows whose date fails to parse or whose status is not a known value are
/// dropped, matching the tolerant ingestion the dashboard always had. A
/// missing file or table is `data_source_unavailable`; a missing required
/// column is `schema_error`.
pub fn load_history(db_path: &Path) -> Result<Vec<AttendanceRecord>, SourceError> {
    if !db_path.is_file() {
        return Err(SourceError::unavailable(format!(
            "attendance database not found: {}",
            db_path.display()
        )));
    }
    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| SourceError::unavailable(e.to_string()))?;

    let shape = verify_history_schema(&conn)?;

    let checkout_col = if shape.has_checkout {
        "checkout_status"
    } else {
        "NULL"
    };
    let time_col = if shape.has_time { "time" } else { "NULL" };
    let sql = format!(
        "SELECT date, class_name, student_id, name, status, {}, {} FROM {}",
        checkout_col, time_col, HISTORY_TABLE
    );

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| SourceError::unavailable(e.to_string()))?;
    let raw_rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, Option<String>>(0)?,
                r.get::<_, Option<String>>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, Option<String>>(4)?,
                r.get::<_, Option<String>>(5)?,
                r.get::<_, Option<String>>(6)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| SourceError::unavailable(e.to_string()))?;

    let mut records = Vec::with_capacity(raw_rows.len());
    for (date, class_name, student_id, name, status, checkout, time) in raw_rows {
        let Some(date) = date.as_deref().and_then(parse_date) else {
            continue;
        };
        let Some(status) = status.as_deref().and_then(Status::parse) else {
            continue;
        };
        records.push(AttendanceRecord {
            date,
            class_name: class_name.unwrap_or_default(),
            student_id: student_id.unwrap_or_default(),
            name: name.unwrap_or_default(),
            status,
            checkout_status: checkout.as_deref().and_then(CheckoutStatus::parse),
            timestamp: time.as_deref().and_then(parse_datetime),
        });
    }
    Ok(records)
}

fn verify_history_schema(conn: &Connection) -> Result<HistoryShape, SourceError> {
    let columns = table_columns(conn, HISTORY_TABLE)?;
    if columns.is_empty() {
        return Err(SourceError::unavailable(format!(
            "table {} missing from attendance database",
            HISTORY_TABLE
        )));
    }
    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|c| c == required) {
            return Err(SourceError::schema(
                format!("missing column in database: {}", required),
                json!({ "table": HISTORY_TABLE, "column": required }),
            ));
        }
    }
    Ok(HistoryShape {
        has_checkout: columns.iter().any(|c| c == "checkout_status"),
        has_time: columns.iter().any(|c| c == "time"),
    })
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, SourceError> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| SourceError::unavailable(e.to_string()))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| SourceError::unavailable(e.to_string()))?;
    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|e| SourceError::unavailable(e.to_string()))?
    {
        let name: String = row
            .get(1)
            .map_err(|e| SourceError::unavailable(e.to_string()))?;
        out.push(name);
    }
    Ok(out)
}

/// Dates arrive either bare or with a time-of-day suffix depending on which
/// scanner wrote the row.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        return Some(d);
    }
    parse_datetime(t).map(|dt| dt.date())
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let t = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(dt);
        }
    }
    None
}
