//! Parsing of ffmpeg progress output.
//!
//! `-progress pipe:1` writes `key=value` lines; the position is in
//! `out_time=HH:MM:SS.micro`. The human-readable stats line carries the
//! same information as `time=HH:MM:SS.cc`, so both are accepted.

/// Parse `HH:MM:SS(.frac)` into seconds. Negative or `N/A` values yield `None`.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Extract the encoded position, in seconds, from one output line.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    line.split_whitespace().find_map(|token| {
        let (key, value) = token.split_once('=')?;
        match key {
            "out_time" | "time" => parse_timestamp(value),
            _ => None,
        }
    })
}

/// Position as a fraction of the total duration, clamped to `[0, 1]`.
pub fn fraction(position: f64, total: f64) -> f64 {
    if total <= 0.0 || position.is_nan() {
        return 0.0;
    }
    (position / total).clamp(0.0, 1.0)
}
