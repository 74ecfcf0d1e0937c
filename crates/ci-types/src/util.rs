/// Check if string is 64-character hexadecimal (sha256 hex digest shape)
pub fn is_64_char_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Truncate a string to a maximum number of characters
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect::<String>() + "...(truncated)"
    }
}

/// Current time as an RFC3339 string, the wire format for every timestamp field
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
