use std::time::Duration;

/// Render a duration the way a progress log line wants it: sub-second runs
/// in milliseconds, longer ones in seconds with one decimal.
pub fn format_elapsed(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn formats_sub_second_as_millis() {
        assert_eq!(format_elapsed(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn formats_long_runs_as_seconds() {
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.5s");
    }
}
