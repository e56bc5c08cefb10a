use crate::stats::{grade_of, normalize_roster_class, ScopeFilter, SourceError};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;

pub const CLASS_COLUMN: &str = "Class";

/// Static enrollment reference, independent of attendance. Only class
/// membership matters to the dashboard, so the roster reduces to counts per
/// normalized class name.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    class_counts: BTreeMap<String, usize>,
}

impl Roster {
    pub fn total(&self) -> usize {
        self.class_counts.values().sum()
    }

    pub fn class_counts(&self) -> &BTreeMap<String, usize> {
        &self.class_counts
    }

    /// Enrollment for the active filter scope. A class filter wins over a
    /// grade filter; grade membership is decided by the extracted grade of
    /// each class name, never by substring containment.
    pub fn count_for_scope(&self, filter: ScopeFilter<'_>) -> usize {
        if let Some(class) = filter.class_name {
            return self.class_counts.get(class).copied().unwrap_or(0);
        }
        if let Some(grade) = filter.grade {
            return self
                .class_counts
                .iter()
                .filter(|(class, _)| grade_of(class).as_deref() == Some(grade))
                .map(|(_, n)| n)
                .sum();
        }
        self.total()
    }

    #[cfg(test)]
    fn from_classes<I: IntoIterator<Item = &'static str>>(classes: I) -> Roster {
        let mut roster = Roster::default();
        for c in classes {
            *roster.class_counts.entry(c.to_string()).or_insert(0) += 1;
        }
        roster
    }
}

/// Loads the student master CSV. Requires a `Class` column; every data row
/// counts one enrolled student under its normalized class name.
pub fn load_roster(path: &Path) -> Result<Roster, SourceError> {
    if !path.is_file() {
        return Err(SourceError::unavailable(format!(
            "roster file not found: {}",
            path.display()
        )));
    }
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| SourceError::unavailable(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| SourceError::unavailable(e.to_string()))?;
    let Some(class_idx) = headers.iter().position(|h| h.trim() == CLASS_COLUMN) else {
        return Err(SourceError::schema(
            format!("missing column in roster: {}", CLASS_COLUMN),
            json!({ "file": path.display().to_string(), "column": CLASS_COLUMN }),
        ));
    };

    let mut roster = Roster::default();
    for row in reader.records() {
        let row = row.map_err(|e| SourceError::unavailable(e.to_string()))?;
        let Some(raw) = row.get(class_idx) else {
            continue;
        };
        if raw.trim().is_empty() {
            continue;
        }
        let class = normalize_roster_class(raw);
        *roster.class_counts.entry(class).or_insert(0) += 1;
    }
    Ok(roster)
}
