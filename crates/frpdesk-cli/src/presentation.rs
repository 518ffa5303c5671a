//! Shared formatting helpers for table and detail output.
//!
//! Format-only: no domain logic, no store access. Anything that needs to
//! interpret an entity belongs in the handlers.

use chrono::{DateTime, Utc};

/// Truncates a string to a maximum length, adding "..." if needed.
///
/// # Examples
///
/// ```rust
/// use frpdesk_cli::presentation::truncate_string;
///
/// assert_eq!(truncate_string("tunnel", 10), "tunnel");
/// assert_eq!(truncate_string("a very long name", 10), "a very ...");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    // counted in chars, not bytes, so multibyte names never split mid-char
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Format an optional value for table display, returning a default if None.
pub fn format_optional<T: std::fmt::Display>(value: &Option<T>, default: &str) -> String {
    match value {
        Some(v) => v.to_string(),
        None => default.to_string(),
    }
}

/// Format an optional timestamp as local-free UTC, or a placeholder.
pub fn format_timestamp(value: Option<DateTime<Utc>>, default: &str) -> String {
    value.map_or_else(
        || default.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
