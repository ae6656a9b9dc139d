use chrono::{DateTime, Datelike, Utc};

/// The `YYYY-MM` key used for per-month partner stats.
pub fn month_key(ts: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", ts.year(), ts.month())
}
