const MAX_ERROR_LENGTH: usize = 2_000;

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let dropped = text[byte_idx..].chars().count();
            format!("{}\n... [truncated {} chars]", &text[..byte_idx], dropped)
        }
    }
}

pub fn truncate_error(error: &str) -> String {
    match error.char_indices().nth(MAX_ERROR_LENGTH) {
        None => error.to_string(),
        Some((byte_idx, _)) => format!("{}...", &error[..byte_idx]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
    }

    #[test]
    fn test_truncation_marks_dropped_chars() {
        assert_eq!(truncate_chars("abcdef", 4), "abcd\n... [truncated 2 chars]");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let text = "ééééé";
        assert_eq!(truncate_chars(text, 2), "éé\n... [truncated 3 chars]");
    }

    #[test]
    fn test_truncate_error() {
        let long = "x".repeat(MAX_ERROR_LENGTH + 10);
        assert_eq!(truncate_error(&long).len(), MAX_ERROR_LENGTH + 3);
    }
}
