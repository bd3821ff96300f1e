//! Shape checks on submitted usernames, applied before any directory call.

const ALLOWED_PUNCTUATION: &[char] = &['.', '_', '-', '@', '+'];

/// True when `username` is non-empty and only uses characters a directory
/// account name can contain. Callers pass the trimmed value.
pub fn is_well_formed(username: &str) -> bool {
    !username.is_empty()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c))
}

/// True for names made only of ASCII digits.
pub fn is_numeric(username: &str) -> bool {
    !username.is_empty() && username.chars().all(|c| c.is_ascii_digit())
}
