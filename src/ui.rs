//! Status lines and byte-size option values
//!
//! Status lines go to stderr so that stdout carries nothing but DDL.

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Note,
    Warning,
    Failure,
}

impl Status {
    fn marker(self) -> colored::ColoredString {
        match self {
            Self::Done => "✓".green(),
            Self::Note => "ℹ".blue(),
            Self::Warning => "⚠".yellow(),
            Self::Failure => "✗".red(),
        }
    }
}

/// Print one status line per line of `msg`, marking only the first
pub fn status(kind: Status, msg: &str) {
    let mut lines = msg.lines();
    let first = lines.next().unwrap_or_default();
    eprintln!("{} {first}", kind.marker());
    for line in lines {
        eprintln!("  {line}");
    }
}

// ============================================================================
// Byte sizes
// ============================================================================

/// Suffixes accepted by size options, largest first
const UNITS: [(&str, u64); 5] = [
    ("TB", 1 << 40),
    ("GB", 1 << 30),
    ("MB", 1 << 20),
    ("KB", 1 << 10),
    ("B", 1),
];

/// Render a table size in the same notation size options accept.
///
/// Whole multiples print exactly (`64MB`) and read back through
/// [`parse_size`]; anything else gets one decimal (`1.5KB`).
pub fn format_size(bytes: u64) -> String {
    let (suffix, unit) = UNITS
        .iter()
        .copied()
        .find(|&(_, unit)| bytes >= unit)
        .unwrap_or(("B", 1));
    if bytes % unit == 0 {
        format!("{}{suffix}", bytes / unit)
    } else {
        format!("{:.1}{suffix}", bytes as f64 / unit as f64)
    }
}

/// Parse a size option value: a whole number of bytes with an optional
/// `B`, `KB`, `MB`, `GB` or `TB` suffix (case-insensitive). Blank means 0.
pub fn parse_size(value: &str) -> Result<u64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }

    let upper = value.to_ascii_uppercase();
    let (digits, unit) = UNITS
        .iter()
        .find_map(|&(suffix, unit)| upper.strip_suffix(suffix).map(|rest| (rest, unit)))
        .unwrap_or((upper.as_str(), 1));
    let digits = digits.trim_end();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!(
            "expected a whole number with optional B/KB/MB/GB/TB suffix, got {value:?}"
        ));
    }

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .ok_or_else(|| format!("size {value:?} is too large"))
}
