//! Terminal output utilities.

use crate::processing::IpRange;
use colored::{ColoredString, Colorize};

/// Format a value as a quoted, right-aligned field.
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let quoted = format!("\"{}\"", value.to_string());
    format!("{quoted:>width$}")
}

/// Free ranges as `start-end` pairs separated by spaces; single addresses
/// are printed once.
pub fn format_ranges(ranges: &[IpRange]) -> String {
    if ranges.is_empty() {
        return "none".to_string();
    }
    ranges
        .iter()
        .map(|r| {
            if r.start == r.end {
                r.start.clone()
            } else {
                format!("{}-{}", r.start, r.end)
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Colour an availability figure: red when nothing is left, yellow when
/// under a tenth of the block is free.
pub fn color_available(text: String, available: i64, total: u64) -> ColoredString {
    if available <= 0 {
        text.on_red()
    } else if (available as u64) * 10 < total {
        text.yellow()
    } else {
        text.normal()
    }
}
