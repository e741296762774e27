use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Collapses whitespace runs to a single space and trims both ends.
pub fn clean_text(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_newlines_and_tabs() {
        assert_eq!(
            clean_text("  Rx No: 12345\n\nName:\tJane   Doe \n"),
            "Rx No: 12345 Name: Jane Doe"
        );
    }

    #[test]
    fn blank_input_becomes_empty() {
        assert_eq!(clean_text(" \n\t "), "");
    }
}
