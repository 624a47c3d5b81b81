//! src/util/humanize.rs

use std::time::Duration;

use bytesize::ByteSize;

/// Binary-unit size, e.g. `1.5 KiB`.
pub fn human_readable_size(size: u64) -> String {
    ByteSize::b(size).to_string()
}

/// Compact elapsed time for job notifications: `850ms`, `3.2s`, `4m 05s`.
pub fn human_elapsed(elapsed: Duration) -> String {
    let millis: u128 = elapsed.as_millis();

    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        let secs: u64 = elapsed.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_elapsed_ranges() {
        assert_eq!(human_elapsed(Duration::from_millis(850)), "850ms");
        assert_eq!(human_elapsed(Duration::from_millis(3200)), "3.2s");
        assert_eq!(human_elapsed(Duration::from_secs(245)), "4m 05s");
    }

    #[test]
    fn test_size_is_nonempty() {
        assert!(!human_readable_size(0).is_empty());
        assert_ne!(human_readable_size(2048), human_readable_size(1));
    }
}
