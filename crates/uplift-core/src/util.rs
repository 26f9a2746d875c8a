//! Small helpers: migration ID generation and duration formatting.

use chrono::Utc;
use std::time::Duration;

/// Generate a lexicographically sortable migration ID from the current UTC
/// time plus an optional human-readable name, e.g. `20200101120000-init`.
pub fn timestamp_id(name: Option<&str>) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    match name {
        Some(name) => format!("{timestamp}-{name}"),
        None => timestamp.to_string(),
    }
}

/// Format a duration for completion summaries: `321ms`, `2.34s`, `1m12s`.
pub fn format_ms(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{}s", secs / 60, secs % 60)
    }
}
