//! Source-text normalisation.
//!
//! The rule order is the bit-exact schema for every persisted digest:
//! changing it invalidates all stored fingerprints and requires
//! re-fingerprinting every registered repository.

use regex::Regex;
use std::sync::LazyLock;

static LINE_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"//[^\n]*").expect("line comment pattern"));

static BLOCK_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment pattern"));

static HASH_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[^\n]*").expect("hash comment pattern"));

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Normalise source text: strip `//`, `/* */`, and `#` comments, collapse
/// whitespace runs to single spaces, lowercase, trim.
pub fn normalize(source: &str) -> String {
    let stripped = LINE_COMMENTS.replace_all(source, "");
    let stripped = BLOCK_COMMENTS.replace_all(&stripped, "");
    let stripped = HASH_COMMENTS.replace_all(&stripped, "");
    let collapsed = WHITESPACE_RUNS.replace_all(&stripped, " ");
    collapsed.to_lowercase().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        assert_eq!(normalize("let x = 1; // counter"), "let x = 1;");
    }

    #[test]
    fn strips_block_comments_non_greedy() {
        assert_eq!(
            normalize("a /* one */ b /* two */ c"),
            "a b c"
        );
        assert_eq!(normalize("a /* spans\nlines */ b"), "a b");
    }

    #[test]
    fn strips_hash_comments() {
        assert_eq!(normalize("value = 3  # python style"), "value = 3");
    }

    #[test]
    fn collapses_whitespace_and_lowercases() {
        assert_eq!(
            normalize("Function  Sum(A,\n\tB)"),
            "function sum(a, b)"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "function sum(a,b){ return a+b; }",
            "  MIXED   Case // trailing\n/* block */ text  ",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn spacing_variants_normalise_identically() {
        assert_eq!(
            normalize("function sum(a,b){ return a+b; }"),
            normalize("Function Sum(a,b){  return a+b;  }")
        );
    }
}
