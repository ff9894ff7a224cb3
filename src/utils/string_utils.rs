//! UTF-8-safe string truncation utilities
//!
//! Slicing by byte offset panics on multi-byte characters, so every length
//! limit applied to extracted text goes through these helpers.

/// Safely truncate a string to a maximum number of CHARACTERS (not bytes).
///
/// Never panics, even with multi-byte characters like emoji.
///
/// # Examples
/// ```
/// # use webdown::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("héllo", 2), "hé");
/// ```
#[must_use]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Truncate to `max_chars` characters and append `...` when anything was cut.
#[must_use]
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    let truncated = safe_truncate_chars(s, max_chars);
    if truncated.len() == s.len() {
        s.to_string()
    } else {
        format!("{}...", truncated.trim_end())
    }
}
