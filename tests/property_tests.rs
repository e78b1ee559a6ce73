//! Property tests for matching primitives

use famulus::automation::engine::{minutes_in_range, parse_time_range};
use famulus::core::types::normalize_command;
use proptest::prelude::*;

proptest! {
    /// Well-formed HH:MM-HH:MM strings always parse to their minute offsets
    #[test]
    fn time_range_parses_valid_clock_pairs(
        h1 in 0u16..24, m1 in 0u16..60, h2 in 0u16..24, m2 in 0u16..60
    ) {
        let text = format!("{:02}:{:02}-{:02}:{:02}", h1, m1, h2, m2);
        let parsed = parse_time_range(&text);
        prop_assert_eq!(parsed, Some((h1 * 60 + m1, h2 * 60 + m2)));
    }

    /// Every minute of the day is in a range or in its complement, never both
    /// (except at the shared endpoints, which both ranges include)
    #[test]
    fn wrapping_range_partitions_the_day(
        start in 0u16..1440, end in 0u16..1440, now in 0u16..1440
    ) {
        prop_assume!(start != end);
        let in_forward = minutes_in_range(now, start, end);
        // the complement range runs end->start the other way around the clock
        let in_backward = minutes_in_range(now, end, start);
        if now == start || now == end {
            prop_assert!(in_forward && in_backward);
        } else {
            prop_assert!(in_forward != in_backward);
        }
    }

    /// Command normalization is idempotent
    #[test]
    fn normalize_command_idempotent(text in ".{0,64}") {
        let once = normalize_command(&text);
        prop_assert_eq!(normalize_command(&once), once.clone());
    }

    /// Normalized commands never carry leading/trailing or doubled spaces
    #[test]
    fn normalize_command_collapses_whitespace(text in ".{0,64}") {
        let normalized = normalize_command(&text);
        prop_assert!(!normalized.starts_with(' '));
        prop_assert!(!normalized.ends_with(' '));
        prop_assert!(!normalized.contains("  "));
    }
}
