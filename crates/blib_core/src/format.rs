//! Human-friendly timestamps

use chrono::{DateTime, Datelike, Utc};

/// Age of a bookmark relative to `now`.
///
/// `just now`, `5m ago`, `3h ago`, `2d ago`; a week or older shows the date
/// (`Mar 1`), with the year only when it differs from the current one.
pub fn relative_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(created_at);
    let mins = diff.num_minutes();
    let hours = diff.num_hours();
    let days = diff.num_days();

    if mins < 1 {
        "just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else if created_at.year() != now.year() {
        created_at.format("%b %-d, %Y").to_string()
    } else {
        created_at.format("%b %-d").to_string()
    }
}
