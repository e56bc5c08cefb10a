use crate::stats::AttendanceRecord;
use std::path::Path;

pub const EXPORT_HEADER: [&str; 6] = [
    "class_name",
    "student_id",
    "name",
    "status",
    "checkout_status",
    "time",
];

/// Writes a drilldown row set as CSV for download. Optional fields serialize
/// as empty cells.
pub fn write_rows_csv(out_path: &Path, rows: &[&AttendanceRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(out_path)?;
    writer.write_record(EXPORT_HEADER)?;
    for r in rows {
        let time = r
            .timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writer.write_record([
            r.class_name.as_str(),
            r.student_id.as_str(),
            r.name.as_str(),
            r.status.as_str(),
            r.checkout_status.map(|c| c.as_str()).unwrap_or(""),
            time.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
