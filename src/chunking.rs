//! Chunking utilities for splitting row text into overlapping word windows.
//!
//! Token counts are approximated from whitespace-separated words at 0.75
//! tokens per word. Long column values are split into windows of at most
//! `chunk_size_tokens` (converted to words) that overlap by
//! `overlap_tokens`, and each window becomes a [`Chunk`] that the later
//! stages score and select.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Approximate language-model tokens per whitespace-separated word.
const TOKENS_PER_WORD: f64 = 0.75;

/// Chunk size used when the requested size rounds down to zero words.
const FALLBACK_CHUNK_WORDS: usize = 100;

/// Default chunk size in tokens.
pub const DEFAULT_CHUNK_TOKENS: usize = 100;

/// Default overlap between adjacent chunks in tokens (25%).
pub const DEFAULT_OVERLAP_TOKENS: usize = 25;

/// Full data of one candidate row, shared by all chunks cut from it.
pub type RowData = Arc<Map<String, Value>>;

/// A span of text from one column of one candidate row.
///
/// Produced by [`chunk_row`], scored by [`crate::bm25::rank_chunks`] and
/// selected by [`crate::mmr::MmrSelector`].
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Table the row was read from.
    pub source_table: String,
    /// Opaque row identifier, only ever compared for equality.
    pub source_row_id: Value,
    /// Text column the chunk was cut from.
    pub source_column: String,
    /// Zero-based position within the row+column chunk sequence.
    pub chunk_index: usize,
    /// The chunk text content.
    pub text: String,
    /// Lexical relevance score, 0 until ranked.
    pub score: f64,
    /// Zero-based rank of the row in the vector search results.
    pub original_rank: usize,
    /// The row the chunk came from.
    pub row: RowData,
}

/// Approximate the token count of `text`.
///
/// Returns `round(words * 0.75)`, but never less than 1 for text that
/// contains at least one word.
///
/// # Examples
///
/// ```
/// use rowrank::chunking::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("hello"), 1);
/// assert_eq!(estimate_tokens("one two three four"), 3);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0;
    }
    let tokens = (words as f64 * TOKENS_PER_WORD).round() as usize;
    tokens.max(1)
}

fn tokens_to_words(tokens: usize) -> usize {
    (tokens as f64 / TOKENS_PER_WORD) as usize
}

/// Split text into overlapping chunks of at most `max_tokens` tokens.
///
/// Both budgets are converted to word counts. A chunk size of zero words
/// falls back to 100 words, and an overlap that is not smaller than the
/// chunk size is reset to a quarter of it so every window moves forward.
///
/// Text that already fits is returned unchanged as a single chunk. Longer
/// text is re-joined with single spaces per window.
///
/// # Examples
///
/// ```
/// use rowrank::chunking::chunk_text;
///
/// let text = "This is a short text that fits in one chunk.";
/// assert_eq!(chunk_text(text, 100, 25), vec![text.to_string()]);
///
/// let long = "word ".repeat(300);
/// let chunks = chunk_text(&long, 100, 25);
/// assert!(chunks.len() >= 2);
/// ```
pub fn chunk_text(
    text: &str,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<String> {
    let mut max_words = tokens_to_words(max_tokens);
    if max_words == 0 {
        max_words = FALLBACK_CHUNK_WORDS;
    }

    let mut overlap_words = tokens_to_words(overlap_tokens);
    if overlap_words >= max_words {
        overlap_words = max_words / 4;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    if words.len() <= max_words {
        return vec![text.to_string()];
    }

    let step = max_words.saturating_sub(overlap_words).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + max_words).min(words.len());
        chunks.push(words[start..end].join(" "));

        if end >= words.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Chunk every requested text column of one row.
///
/// Columns that are missing from the row, hold a non-string value or hold
/// an empty string are skipped. Chunk indices restart at 0 for each column.
pub fn chunk_row(
    row: &RowData,
    text_columns: &[String],
    row_id: &Value,
    table_name: &str,
    rank: usize,
    max_tokens: usize,
    overlap_tokens: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for column in text_columns {
        let Some(Value::String(text)) = row.get(column) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let pieces = chunk_text(text, max_tokens, overlap_tokens);
        chunks.extend(pieces.into_iter().enumerate().map(|(index, text)| {
            Chunk {
                source_table: table_name.to_string(),
                source_row_id: row_id.clone(),
                source_column: column.clone(),
                chunk_index: index,
                text,
                score: 0.0,
                original_rank: rank,
                row: Arc::clone(row),
            }
        }));
    }

    chunks
}

/// Keep the leading chunks whose estimated tokens fit within `max_tokens`.
///
/// Selection stops at the first chunk that would overflow the budget, even
/// if a later, smaller chunk would still fit.
pub fn select_within_budget(chunks: Vec<Chunk>, max_tokens: usize) -> Vec<Chunk> {
    let mut total = 0;
    let mut selected = Vec::new();

    for chunk in chunks {
        let tokens = estimate_tokens(&chunk.text);
        if total + tokens > max_tokens {
            break;
        }
        total += tokens;
        selected.push(chunk);
    }

    selected
}
