//! Input validation utilities
//!
//! Provides input validation for user-supplied strings.

/// Validate that input is not blank, fits in `max_length` bytes and carries no
/// control characters that could split a log line.
pub fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty() && input.len() <= max_length && !input.contains(['\r', '\n', '\0'])
}

/// A single path segment: no separators, not `.` or `..`.
pub fn is_valid_segment(name: &str) -> bool {
    is_valid_input(name, 255) && !name.contains(['/', '\\']) && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_validation() {
        assert!(is_valid_input("admin", 10));
        assert!(!is_valid_input("", 10));
        assert!(!is_valid_input("   ", 10));
        assert!(!is_valid_input("toolongvalue", 5));
        assert!(!is_valid_input("a\r\nb", 10));
    }

    #[test]
    fn segment_validation() {
        assert!(is_valid_segment("new-name.png"));
        assert!(!is_valid_segment("a/b.png"));
        assert!(!is_valid_segment("a\\b.png"));
        assert!(!is_valid_segment(".."));
        assert!(!is_valid_segment(""));
    }
}
