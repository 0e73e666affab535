//! Rendering of progress notices.

use std::time::Duration;

const BAR_CELLS: usize = 10;
const FILLED: char = '▰';
const EMPTY: char = '▱';
const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Displayed percent, never lower than a previous snapshot.
    pub percent: f64,
    pub current: u64,
    pub total: u64,
    /// Average bytes per second since the transfer started.
    pub speed_bytes_per_sec: f64,
    /// Estimated time remaining; zero when speed is unknown.
    pub eta: Duration,
}

/// Format a byte count, e.g. `1.50MB`. Zero renders as `0B`.
pub fn human_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0B".to_string();
    }
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", value.round() as u64, UNITS[unit])
    } else {
        format!("{:.2}{}", value, UNITS[unit])
    }
}

/// Format a duration as `Xh Ym`, `Xm Ys` or `Xs`.
pub fn human_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Ten-cell bar for a percent in `[0, 100]`.
pub fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * BAR_CELLS as f64).floor() as usize;
    let filled = filled.min(BAR_CELLS);
    let mut bar = String::with_capacity(BAR_CELLS * FILLED.len_utf8());
    bar.extend(std::iter::repeat(FILLED).take(filled));
    bar.extend(std::iter::repeat(EMPTY).take(BAR_CELLS - filled));
    bar
}

/// Full notice text for a snapshot.
pub fn render(action: &str, snapshot: &ProgressSnapshot) -> String {
    format!(
        "**{action}**\n\n{bar} `{percent:.1}%`\n\n**Speed:** `{speed}/s`\n**Done:** `{current} / {total}`\n**ETA:** `{eta}`",
        bar = progress_bar(snapshot.percent),
        percent = snapshot.percent,
        speed = human_bytes(snapshot.speed_bytes_per_sec),
        current = human_bytes(snapshot.current as f64),
        total = human_bytes(snapshot.total as f64),
        eta = human_duration(snapshot.eta),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(0.0), "0B");
        assert_eq!(human_bytes(512.0), "512B");
        assert_eq!(human_bytes(1536.0), "1.50KB");
        assert_eq!(human_bytes(10.0 * 1024.0 * 1024.0), "10.00MB");
        assert_eq!(human_bytes(3.0 * 1024f64.powi(3)), "3.00GB");
        assert_eq!(human_bytes(2048.0 * 1024f64.powi(4)), "2048.00TB");
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration(Duration::ZERO), "0s");
        assert_eq!(human_duration(Duration::from_secs(42)), "42s");
        assert_eq!(human_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(human_duration(Duration::from_secs(3 * 3600 + 7 * 60 + 9)), "3h 7m");
    }

    #[test]
    fn test_progress_bar_cells() {
        assert_eq!(progress_bar(0.0), "▱▱▱▱▱▱▱▱▱▱");
        assert_eq!(progress_bar(35.0), "▰▰▰▱▱▱▱▱▱▱");
        assert_eq!(progress_bar(100.0), "▰▰▰▰▰▰▰▰▰▰");
        assert_eq!(progress_bar(250.0).chars().count(), 10);
    }

    #[test]
    fn test_render_contains_fields() {
        let snapshot = ProgressSnapshot {
            percent: 50.0,
            current: 5 * 1024 * 1024,
            total: 10 * 1024 * 1024,
            speed_bytes_per_sec: 1024.0 * 1024.0,
            eta: Duration::from_secs(5),
        };
        let text = render("Downloading", &snapshot);
        assert!(text.starts_with("**Downloading**"));
        assert!(text.contains("▰▰▰▰▰▱▱▱▱▱ `50.0%`"));
        assert!(text.contains("`1.00MB/s`"));
        assert!(text.contains("`5.00MB / 10.00MB`"));
        assert!(text.contains("`5s`"));
    }
}
