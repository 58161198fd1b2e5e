//! Human-readable duration formatting.

/// Format a duration in seconds, e.g. `"45s"`, `"3m 20s"`, `"2h 5m"`, `"29d 23h"`.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

/// Describe how long until something lapses, or `"expired"` when nothing remains.
pub fn format_remaining(secs: u64) -> String {
    if secs == 0 {
        "expired".to_string()
    } else {
        format!("{} remaining", format_duration(secs))
    }
}
