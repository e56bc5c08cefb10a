use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Grade marker used by the school's class naming scheme, e.g. "ม.3/2"
/// is section 2 of grade "ม.3".
pub const GRADE_MARKER: &str = "ม.";
pub const SECTION_SEPARATOR: char = '/';

pub const DEFAULT_TREND_DAYS: u32 = 7;
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Failure raised by a data source while assembling a refresh cycle. Carries
/// the wire-level error code so handlers can forward it unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct SourceError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl SourceError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("data_source_unavailable", message)
    }

    pub fn schema(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            code: "schema_error".to_string(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ontime,
    Late,
    Absent,
}

impl Status {
    pub fn parse(raw: &str) -> Option<Status> {
        match raw.trim() {
            "ontime" => Some(Status::Ontime),
            "late" => Some(Status::Late),
            "absent" => Some(Status::Absent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ontime => "ontime",
            Status::Late => "late",
            Status::Absent => "absent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStatus {
    CheckedOut,
    NotCheckedOut,
}

impl CheckoutStatus {
    /// The scanner appliance writes Thai labels; normalized tokens are also
    /// accepted so fixtures and re-imports stay readable.
    pub fn parse(raw: &str) -> Option<CheckoutStatus> {
        match raw.trim() {
            "checked_out" | "ออกจากโรงเรียนแล้ว" => Some(CheckoutStatus::CheckedOut),
            "not_checked_out" | "ยังไม่สแกนออก" => Some(CheckoutStatus::NotCheckedOut),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckoutStatus::CheckedOut => "checked_out",
            CheckoutStatus::NotCheckedOut => "not_checked_out",
        }
    }
}

/// One scan event as appended by the external scanner. Read-only here.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub class_name: String,
    pub student_id: String,
    pub name: String,
    pub status: Status,
    pub checkout_status: Option<CheckoutStatus>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Extracts the grade ("ม.<digits>") from a class name. Class names that do
/// not carry the marker have no grade and are skipped by grade filtering.
pub fn grade_of(class_name: &str) -> Option<String> {
    let start = class_name.find(GRADE_MARKER)?;
    let rest = &class_name[start + GRADE_MARKER.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{}{}", GRADE_MARKER, digits))
}

/// Roster files store the class as e.g. "3/2" while history rows carry
/// "ม.3/2". A sectioned value without the marker gets prefixed; anything
/// else passes through unchanged.
pub fn normalize_roster_class(raw: &str) -> String {
    let t = raw.trim();
    if t.contains(SECTION_SEPARATOR) && !t.starts_with(GRADE_MARKER) {
        format!("{}{}", GRADE_MARKER, t)
    } else {
        t.to_string()
    }
}

/// "Today" is the most recent date present in the data, not the wall clock,
/// so the dashboard stays meaningful over a stale history file.
pub fn latest_date(records: &[AttendanceRecord]) -> Option<NaiveDate> {
    records.iter().map(|r| r.date).max()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeFilter<'a> {
    pub grade: Option<&'a str>,
    pub class_name: Option<&'a str>,
}

impl ScopeFilter<'_> {
    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        if let Some(class) = self.class_name {
            if record.class_name != class {
                return false;
            }
        }
        if let Some(grade) = self.grade {
            if grade_of(&record.class_name).as_deref() != Some(grade) {
                return false;
            }
        }
        true
    }
}

/// Today's rows narrowed to the active filter scope.
pub fn filter_day<'a>(
    records: &'a [AttendanceRecord],
    day: NaiveDate,
    filter: ScopeFilter<'_>,
) -> Vec<&'a AttendanceRecord> {
    records
        .iter()
        .filter(|r| r.date == day && filter.matches(r))
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_students: usize,
    pub ontime: usize,
    pub late: usize,
    pub absent: usize,
    pub scanned: usize,
    pub not_scanned: usize,
    pub attendance_rate: f64,
    pub checked_out: usize,
    pub not_checked_out: usize,
    pub checkout_rate: f64,
}

/// KPI figures for the latest day in `records`, narrowed by `filter`.
/// `roster_count` is the enrollment for the same scope, precomputed by the
/// caller from the roster.
///
/// `not_scanned` counts enrolled students without an ontime/late record
/// today, deduplicated by student id: absent rows are roster-marked
/// absences rather than scans, and a student who scans twice still counts
/// once. Clamped at zero when the scan count exceeds enrollment.
pub fn aggregate(
    records: &[AttendanceRecord],
    roster_count: usize,
    filter: ScopeFilter<'_>,
) -> Kpis {
    let subset = match latest_date(records) {
        Some(day) => filter_day(records, day, filter),
        None => Vec::new(),
    };

    let mut ontime = 0usize;
    let mut late = 0usize;
    let mut absent = 0usize;
    let mut checked_out = 0usize;
    let mut not_checked_out = 0usize;
    let mut scanned_students: HashSet<&str> = HashSet::new();

    for r in &subset {
        match r.status {
            Status::Ontime => ontime += 1,
            Status::Late => late += 1,
            Status::Absent => absent += 1,
        }
        if matches!(r.status, Status::Ontime | Status::Late) {
            scanned_students.insert(r.student_id.as_str());
        }
        match r.checkout_status {
            Some(CheckoutStatus::CheckedOut) => checked_out += 1,
            Some(CheckoutStatus::NotCheckedOut) => not_checked_out += 1,
            None => {}
        }
    }

    let scanned = ontime + late;
    let not_scanned = roster_count.saturating_sub(scanned_students.len());
    let attendance_rate = if roster_count > 0 {
        scanned as f64 / roster_count as f64 * 100.0
    } else {
        0.0
    };
    let checkout_rate = if roster_count > 0 {
        checked_out as f64 / roster_count as f64 * 100.0
    } else {
        0.0
    };

    Kpis {
        total_students: roster_count,
        ontime,
        late,
        absent,
        scanned,
        not_scanned,
        attendance_rate,
        checked_out,
        not_checked_out,
        checkout_rate,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub late: usize,
}

/// Per-day late counts over the trailing window ending at `window_end`,
/// ascending by date. Days with no late record are omitted rather than
/// zero-filled.
pub fn weekly_late_trend(
    records: &[AttendanceRecord],
    window_end: NaiveDate,
    window_days: u32,
) -> Vec<TrendPoint> {
    // An oversized window clamps to the start of the calendar instead of
    // overflowing the date range.
    let span = chrono::Duration::days(window_days.saturating_sub(1) as i64);
    let window_start = window_end.checked_sub_signed(span).unwrap_or(NaiveDate::MIN);
    let mut by_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for r in records {
        if r.status == Status::Late && r.date >= window_start && r.date <= window_end {
            *by_day.entry(r.date).or_insert(0) += 1;
        }
    }
    by_day
        .into_iter()
        .map(|(date, late)| TrendPoint { date, late })
        .collect()
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapMatrix {
    pub grades: Vec<String>,
    pub classes: Vec<String>,
    /// Row-major, rows follow `grades`, columns follow `classes`. Cells with
    /// no late record are zero.
    pub cells: Vec<Vec<usize>>,
}

/// Grade x class matrix of late counts for one day's rows. Rows without a
/// parseable grade are left out of the grade axis.
pub fn late_heatmap(day_records: &[&AttendanceRecord]) -> HeatmapMatrix {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut grades: BTreeSet<String> = BTreeSet::new();
    let mut classes: BTreeSet<String> = BTreeSet::new();

    for r in day_records {
        if r.status != Status::Late {
            continue;
        }
        let Some(grade) = grade_of(&r.class_name) else {
            continue;
        };
        grades.insert(grade.clone());
        classes.insert(r.class_name.clone());
        *counts.entry((grade, r.class_name.clone())).or_insert(0) += 1;
    }

    let grades: Vec<String> = grades.into_iter().collect();
    let classes: Vec<String> = classes.into_iter().collect();
    let cells = grades
        .iter()
        .map(|g| {
            classes
                .iter()
                .map(|c| {
                    counts
                        .get(&(g.clone(), c.clone()))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        })
        .collect();

    HeatmapMatrix {
        grades,
        classes,
        cells,
    }
}

/// Latest scan per (student, date) across the whole history, newest first,
/// at most `limit` rows. Rows without a scan time order by their date.
pub fn recent_scans(records: &[AttendanceRecord], limit: usize) -> Vec<AttendanceRecord> {
    // Later rows win timestamp ties, so a re-scan appended without a time
    // still shadows the earlier row for the same student and day.
    let mut sorted: Vec<(usize, &AttendanceRecord)> = records.iter().enumerate().collect();
    sorted.sort_by_key(|(idx, r)| {
        std::cmp::Reverse((
            r.timestamp.unwrap_or_else(|| r.date.and_time(chrono::NaiveTime::MIN)),
            *idx,
        ))
    });

    let mut seen: HashSet<(&str, NaiveDate)> = HashSet::new();
    let mut out = Vec::new();
    for (_, r) in sorted {
        if !seen.insert((r.student_id.as_str(), r.date)) {
            continue;
        }
        out.push(r.clone());
        if out.len() == limit {
            break;
        }
    }
    out
}
