//! Human-readable durations for ETA and elapsed time

/// `"42s"`, `"3m 5s"`, `"2h 7m"`
///
/// Negative and non-finite inputs render as `"0s"`.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }

    let total = seconds.round() as u64;
    if total < 60 {
        return format!("{}s", total);
    }
    if total < 3600 {
        return format!("{}m {}s", total / 60, total % 60);
    }
    format!("{}h {}m", total / 3600, (total % 3600) / 60)
}
