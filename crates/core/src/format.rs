//! Human-readable byte-size formatting for the cache size report.

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count with base-1024 units and two decimals.
///
/// Zero is special-cased to `"0 Bytes"`. Values at or beyond 1024 GB
/// clamp to the GB unit.
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_with(bytes, 2)
}

/// Format a byte count with an explicit decimal precision.
pub fn format_bytes_with(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let exp = ((bytes as f64).log2() / 10.0).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);

    format!("{value:.decimals$} {}", UNITS[exp])
}
