use ci_types::util::{is_64_char_hex, truncate};

#[test]
fn truncate_leaves_short_strings_alone() {
    assert_eq!(truncate("hello", 10), "hello");
}

#[test]
fn truncate_adds_marker_past_limit() {
    let long = "a".repeat(100);
    let result = truncate(&long, 10);
    assert_eq!(result.chars().take(10).count(), 10);
    assert!(result.ends_with("...(truncated)"));
}

#[test]
fn hex_check_rejects_wrong_length() {
    assert!(!is_64_char_hex("abc123"));
}

#[test]
fn hex_check_accepts_sha256_digest() {
    let digest = "a".repeat(64);
    assert!(is_64_char_hex(&digest));
}
