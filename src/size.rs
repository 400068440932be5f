//! Human-readable size strings.
//!
//! Grammar: `<decimal><optional space><unit>` with unit one of `B`, `KB`,
//! `MB`, `GB` (case-insensitive).  The decimal separator may be `.` or `,`.
//! Units are binary: 1 KB = 1024 B.

use std::sync::LazyLock;

use regex::Regex;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d.,]*)\s*([KMG]?B)\b").expect("invalid size pattern")
});

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit.to_ascii_uppercase().as_str() {
        "B"  => Some(1),
        "KB" => Some(KIB),
        "MB" => Some(MIB),
        "GB" => Some(GIB),
        _    => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let normalized = raw.replace(',', ".");
    let trimmed = normalized.trim_end_matches('.');
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Find the first size token in `text` and convert it to bytes.
///
/// Fractional byte counts are truncated, so `47.5 KB` is 48 640 bytes.
/// Returns `None` when no token is present or its number cannot be read.
pub fn parse_size(text: &str) -> Option<u64> {
    SIZE_RE.captures_iter(text).find_map(|caps| {
        let number = parse_number(&caps[1])?;
        let mult = unit_multiplier(&caps[2])?;
        Some((number * mult as f64) as u64)
    })
}

/// Render a byte count with one decimal in the largest fitting unit.
pub fn humanize(bytes: u64) -> String {
    let b = bytes as f64;
    if bytes >= GIB {
        format!("{:.1} GB", b / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MB", b / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", b / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
