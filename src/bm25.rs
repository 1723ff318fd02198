//! Okapi BM25 re-ranking of chunks against a query.
//!
//! The candidate chunks of one query are the whole corpus: IDF is computed
//! over them alone, so a term's weight reflects how rare it is among the
//! rows the vector search returned rather than in the table at large.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use rayon::prelude::*;

use crate::{chunking::Chunk, tokenize::tokenize};

/// Term frequency saturation.
pub const DEFAULT_K1: f64 = 1.5;

/// Document length normalization.
pub const DEFAULT_B: f64 = 0.75;

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Scorer {
    k1: f64,
    b: f64,
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25Scorer {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_K1, DEFAULT_B)
    }

    pub fn with_params(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }

    pub fn k1(&self) -> f64 {
        self.k1
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    /// Score one tokenized document against a tokenized query.
    ///
    /// Each distinct query token present in the document adds
    /// `idf * tf * (k1 + 1) / (tf + k1 * (1 - b + b * |D| / avgdl))`.
    /// Tokens missing from `idf` contribute nothing.
    pub fn score(
        &self,
        query_tokens: &[String],
        doc_tokens: &[String],
        avg_doc_len: f64,
        idf: &HashMap<String, f64>,
    ) -> f64 {
        if query_tokens.is_empty() || doc_tokens.is_empty() {
            return 0.0;
        }

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for token in doc_tokens {
            *term_freq.entry(token.as_str()).or_default() += 1;
        }

        let doc_len = doc_tokens.len() as f64;
        let length_norm = 1.0 - self.b + self.b * doc_len / avg_doc_len;

        distinct(query_tokens)
            .filter_map(|term| {
                let tf = *term_freq.get(term)? as f64;
                let term_idf = idf.get(term).copied().unwrap_or(0.0);
                let numerator = tf * (self.k1 + 1.0);
                let denominator = tf + self.k1 * length_norm;
                Some(term_idf * numerator / denominator)
            })
            .sum()
    }
}

/// Yield each token once, in first-seen order.
fn distinct(tokens: &[String]) -> impl Iterator<Item = &str> {
    tokens.iter().enumerate().filter_map(|(i, token)| {
        (!tokens[..i].contains(token)).then_some(token.as_str())
    })
}

/// Inverse document frequency of every term in `documents`.
///
/// `idf(t) = ln((N - df + 0.5) / (df + 0.5) + 1)`, where `df` counts the
/// documents containing `t` at least once.
///
/// # Examples
///
/// ```
/// use rowrank::bm25::calculate_idf;
///
/// let docs = vec![
///     vec!["postgresql".to_string(), "database".to_string()],
///     vec!["mysql".to_string(), "database".to_string()],
/// ];
/// let idf = calculate_idf(&docs);
/// assert!(idf["postgresql"] > idf["database"]);
/// ```
pub fn calculate_idf(documents: &[Vec<String>]) -> HashMap<String, f64> {
    let total = documents.len() as f64;
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();

    for doc in documents {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for token in unique {
            *doc_freq.entry(token).or_default() += 1;
        }
    }

    doc_freq
        .into_iter()
        .map(|(term, df)| {
            let df = df as f64;
            let idf = ((total - df + 0.5) / (df + 0.5) + 1.0).ln();
            (term.to_string(), idf)
        })
        .collect()
}

/// Score chunks against `query` with BM25 and sort them best first.
///
/// When there are no chunks or the query has no tokens, the chunks are
/// returned untouched: scores stay 0 and the input order is kept.
///
/// Ties are broken by lower chunk index, then by lower vector search rank;
/// the sort is stable beyond that.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use rowrank::{bm25::rank_chunks, chunking::Chunk};
///
/// let chunk = |text: &str, rank: usize| Chunk {
///     source_table: "docs".to_string(),
///     source_row_id: rank.into(),
///     source_column: "body".to_string(),
///     chunk_index: 0,
///     text: text.to_string(),
///     score: 0.0,
///     original_rank: rank,
///     row: Arc::default(),
/// };
///
/// let ranked = rank_chunks(
///     vec![
///         chunk("weather forecast for today", 0),
///         chunk("postgresql database administration", 1),
///     ],
///     "postgresql database",
/// );
/// assert_eq!(ranked[0].original_rank, 1);
/// assert_eq!(ranked[1].score, 0.0);
/// ```
pub fn rank_chunks(chunks: Vec<Chunk>, query: &str) -> Vec<Chunk> {
    rank_chunks_with(&Bm25Scorer::new(), chunks, query)
}

/// [`rank_chunks`] with explicit BM25 parameters.
pub fn rank_chunks_with(
    scorer: &Bm25Scorer,
    mut chunks: Vec<Chunk>,
    query: &str,
) -> Vec<Chunk> {
    if chunks.is_empty() {
        return chunks;
    }

    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        tracing::debug!("query has no tokens, leaving chunks unranked");
        return chunks;
    }

    let documents: Vec<Vec<String>> =
        chunks.par_iter().map(|chunk| tokenize(&chunk.text)).collect();
    let total_len: usize = documents.iter().map(Vec::len).sum();
    let avg_doc_len = total_len as f64 / documents.len() as f64;
    let idf = calculate_idf(&documents);

    let scores: Vec<f64> = documents
        .par_iter()
        .map(|doc| scorer.score(&query_tokens, doc, avg_doc_len, &idf))
        .collect();
    for (chunk, score) in chunks.iter_mut().zip(scores) {
        chunk.score = score;
    }

    chunks.sort_by(compare_ranked);
    tracing::trace!(
        chunks = chunks.len(),
        top_score = chunks[0].score,
        "ranked chunks with bm25"
    );
    chunks
}

fn compare_ranked(a: &Chunk, b: &Chunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        .then_with(|| a.original_rank.cmp(&b.original_rank))
}
