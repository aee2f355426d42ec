use std::{
    fmt::Write,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Pretty-print the elapsed time of a progress span (used by the indicatif layer).
pub fn elapsed_subsec(state: &indicatif::ProgressState, writer: &mut dyn Write) {
    let elapsed = state.elapsed();
    let _ = write!(writer, "{}.{}s", elapsed.as_secs(), elapsed.subsec_millis() / 100);
}

/// Pretty-print a duration using the largest unit that keeps the value above one
/// (used in logs and diagnostics).
pub fn format_duration(duration: Duration) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    let secs = duration.as_secs();
    let secs_f64 = duration.as_secs_f64();

    if secs >= DAY {
        format!("{:.3}d", secs_f64 / DAY as f64)
    } else if secs >= HOUR {
        format!("{:.3}h", secs_f64 / HOUR as f64)
    } else if secs >= MINUTE {
        format!("{:.3}m", secs_f64 / MINUTE as f64)
    } else if secs >= 1 {
        format!("{:.3}s", secs_f64)
    } else if duration.as_millis() >= 1 {
        format!("{:.3}ms", secs_f64 * 1_000.0)
    } else {
        format!("{:.3}μs", secs_f64 * 1_000_000.0)
    }
}

/// Returns the current time in nanoseconds since the UNIX epoch, or zero if the
/// system clock is set before the epoch.
pub fn now_as_u64() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

pub fn elapsed_duration_since(start_time: u64) -> Duration {
    Duration::from_nanos(now_as_u64().saturating_sub(start_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_each_unit() {
        assert_eq!(format_duration(Duration::from_micros(250)), "250.000μs");
        assert_eq!(format_duration(Duration::from_millis(12)), "12.000ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.500m");
        assert_eq!(format_duration(Duration::from_secs(2 * 3600)), "2.000h");
        assert_eq!(format_duration(Duration::from_secs(36 * 3600)), "1.500d");
    }

    #[test]
    fn elapsed_never_underflows() {
        let future = now_as_u64() + 1_000_000_000;
        assert_eq!(elapsed_duration_since(future), Duration::ZERO);
    }
}
