//! Small standalone helpers shared across layers: byte-size parsing and
//! humanization. Kept as free functions in the teacher's `utils.rs` style
//! (plain functions, no state) rather than a trait or builder.

/// Binary unit suffixes, largest first, matching what rclone's progress
/// lines and `Content-Length`-derived sizes both use (§4.4, §8).
const UNITS: [(&str, f64); 5] = [
    ("TiB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("GiB", 1024.0 * 1024.0 * 1024.0),
    ("MiB", 1024.0 * 1024.0),
    ("KiB", 1024.0),
    ("B", 1.0),
];

/// Parses a humanized byte size such as `"12.3 MiB"`, `"1 KiB"`, or a bare
/// integer byte count. Returns `None` for unrecognized input (callers treat
/// that as "skip this line"/"contribute zero", never as a panic).
pub fn parse_bytes(input: &str) -> Option<u64> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    for (suffix, multiplier) in UNITS {
        if let Some(number) = s.strip_suffix(suffix) {
            let number: f64 = number.trim().parse().ok()?;
            return Some((number * multiplier).round() as u64);
        }
    }
    s.parse::<u64>().ok()
}

/// Formats a byte count using the same binary-unit ladder `parse_bytes`
/// understands, one decimal place, e.g. `1572864 -> "1.5 MiB"`.
pub fn humanize(bytes: u64) -> String {
    let value = bytes as f64;
    for (suffix, multiplier) in UNITS {
        if suffix == "B" {
            continue;
        }
        if value >= multiplier {
            return format!("{:.1} {suffix}", value / multiplier);
        }
    }
    format!("{bytes} B")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_units() {
        assert_eq!(parse_bytes("1 KiB"), Some(1024));
        assert_eq!(parse_bytes("1.5 MiB"), Some((1.5 * 1024.0 * 1024.0) as u64));
        assert_eq!(parse_bytes("42"), Some(42));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_bytes(""), None);
        assert_eq!(parse_bytes("not a size"), None);
    }

    #[test]
    fn humanize_round_trips_within_one_unit() {
        for n in [0u64, 1024, 1024 * 1024, 1024 * 1024 * 1024, 1024u64.pow(4)] {
            let s = humanize(n);
            if let Some(parsed) = parse_bytes(&s) {
                let diff = parsed.abs_diff(n);
                assert!(diff <= n.max(1) / 10, "{n} -> {s} -> {parsed}");
            }
        }
    }
}
