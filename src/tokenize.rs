//! Lexical normalization shared by every scoring stage.
//!
//! BM25 corpus building, query tokenization and Jaccard similarity all go
//! through [`tokenize`], so scores computed by different stages stay
//! comparable.

/// Split text into lowercase word tokens.
///
/// Any character that is neither alphabetic nor numeric separates tokens.
/// Alphabetic is the Unicode property, so combining vowel signs stay inside
/// their word. Single-character tokens are dropped unless the character is
/// numeric.
///
/// # Examples
///
/// ```
/// use rowrank::tokenize::tokenize;
///
/// assert_eq!(tokenize("High-performance DB, v2 & 5 items"), vec![
///     "high",
///     "performance",
///     "db",
///     "v2",
///     "5",
///     "items",
/// ]);
/// assert!(tokenize("").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| keep_token(word))
        .map(str::to_string)
        .collect()
}

fn keep_token(word: &str) -> bool {
    let mut chars = word.chars();
    match (chars.next(), chars.next()) {
        (None, _) => false,
        (Some(only), None) => only.is_numeric(),
        (Some(_), Some(_)) => true,
    }
}
