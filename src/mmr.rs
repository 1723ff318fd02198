//! Maximal Marginal Relevance selection.
//!
//! Picks chunks one at a time, trading the chunk's normalized BM25 score
//! against how different it is from everything already picked. Chunks from
//! the same row are treated as related by construction; chunks from
//! different rows are compared by token overlap.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::{
    chunking::Chunk,
    error::{Error, Result},
    tokenize::tokenize,
};

/// Default balance between relevance and diversity.
pub const DEFAULT_LAMBDA: f64 = 0.6;

const ADJACENT_CHUNK_SIMILARITY: f64 = 0.9;
const SAME_COLUMN_SIMILARITY: f64 = 0.6;
const SAME_ROW_SIMILARITY: f64 = 0.5;

/// Diversity-aware chunk selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MmrSelector {
    lambda: f64,
}

impl Default for MmrSelector {
    fn default() -> Self {
        Self::new(DEFAULT_LAMBDA)
    }
}

impl MmrSelector {
    /// Build a selector; `lambda` is clamped to `[0, 1]`.
    ///
    /// 0 favors diversity only, 1 favors relevance only. A NaN lambda
    /// falls back to [`DEFAULT_LAMBDA`].
    pub fn new(lambda: f64) -> Self {
        let lambda = if lambda.is_nan() {
            DEFAULT_LAMBDA
        } else {
            lambda.clamp(0.0, 1.0)
        };
        Self { lambda }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Select up to `max_chunks` chunks from BM25-ranked input.
    ///
    /// Input that already fits is returned unchanged. Otherwise each round
    /// picks the remaining chunk with the highest
    /// `lambda * relevance + (1 - lambda) * diversity`, where relevance is
    /// the score divided by the best score. The first candidate wins an
    /// exact tie. Selected chunks keep their own original score.
    ///
    /// Fails if any chunk carries a NaN or infinite score.
    pub fn select_chunks(
        &self,
        chunks: Vec<Chunk>,
        max_chunks: usize,
    ) -> Result<Vec<Chunk>> {
        if let Some(index) = chunks.iter().position(|c| !c.score.is_finite()) {
            return Err(Error::NonFiniteScore { index });
        }

        if chunks.len() <= max_chunks {
            return Ok(chunks);
        }

        let max_score = chunks
            .iter()
            .map(|c| c.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let max_score = if max_score == 0.0 { 1.0 } else { max_score };

        let mut remaining: Vec<Option<Candidate>> = chunks
            .into_par_iter()
            .map(|chunk| Some(Candidate::new(chunk)))
            .collect();
        let mut selected: Vec<Candidate> = Vec::with_capacity(max_chunks);

        while selected.len() < max_chunks {
            let mut best: Option<(usize, f64)> = None;

            for (i, candidate) in remaining.iter().enumerate() {
                let Some(candidate) = candidate else {
                    continue;
                };
                let relevance = candidate.chunk.score / max_score;
                let novelty = candidate.novelty(&selected);
                let mmr =
                    self.lambda * relevance + (1.0 - self.lambda) * novelty;

                if best.is_none_or(|(_, best_mmr)| mmr > best_mmr) {
                    best = Some((i, mmr));
                }
            }

            let Some(candidate) = best.and_then(|(i, _)| remaining[i].take())
            else {
                break;
            };
            selected.push(candidate);
        }

        tracing::debug!(
            lambda = self.lambda,
            selected = selected.len(),
            "selected diverse chunks"
        );
        Ok(selected.into_iter().map(|c| c.chunk).collect())
    }
}

/// A chunk with its token set computed once for the selection loop.
struct Candidate {
    chunk: Chunk,
    tokens: HashSet<String>,
}

impl Candidate {
    fn new(chunk: Chunk) -> Self {
        let tokens = token_set(&chunk.text);
        Self { chunk, tokens }
    }

    fn similarity(&self, other: &Candidate) -> f64 {
        same_row_similarity(&self.chunk, &other.chunk)
            .unwrap_or_else(|| jaccard(&self.tokens, &other.tokens))
    }

    fn novelty(&self, selected: &[Candidate]) -> f64 {
        if selected.is_empty() {
            return 1.0;
        }
        let min_similarity = selected
            .iter()
            .map(|s| self.similarity(s))
            .fold(1.0, f64::min);
        1.0 - min_similarity
    }
}

/// How different `candidate` is from the chunks already selected.
///
/// 1.0 when nothing is selected yet, otherwise one minus the smallest
/// similarity to any selected chunk.
pub fn diversity(candidate: &Chunk, selected: &[Chunk]) -> f64 {
    if selected.is_empty() {
        return 1.0;
    }

    let min_similarity = selected
        .iter()
        .map(|s| similarity(candidate, s))
        .fold(1.0, f64::min);
    1.0 - min_similarity
}

/// Similarity of two chunks in `[0, 1]`.
///
/// Chunks of the same row score fixed values: 0.9 for neighbours in one
/// column, 0.6 for farther chunks of one column and 0.5 across columns.
/// Chunks of different rows use [`jaccard_similarity`] of their text.
pub fn similarity(a: &Chunk, b: &Chunk) -> f64 {
    same_row_similarity(a, b)
        .unwrap_or_else(|| jaccard_similarity(&a.text, &b.text))
}

fn same_row_similarity(a: &Chunk, b: &Chunk) -> Option<f64> {
    if a.source_row_id != b.source_row_id {
        return None;
    }

    let similarity = if a.source_column != b.source_column {
        SAME_ROW_SIMILARITY
    } else if a.chunk_index.abs_diff(b.chunk_index) <= 1 {
        ADJACENT_CHUNK_SIMILARITY
    } else {
        SAME_COLUMN_SIMILARITY
    };
    Some(similarity)
}

/// Jaccard coefficient of the token sets of two texts.
///
/// Two token-less texts are identical (1.0); one token-less text shares
/// nothing with a non-empty one (0.0).
///
/// # Examples
///
/// ```
/// use rowrank::mmr::jaccard_similarity;
///
/// assert_eq!(jaccard_similarity("", ""), 1.0);
/// assert_eq!(jaccard_similarity("hello world", ""), 0.0);
/// assert_eq!(
///     jaccard_similarity("postgresql database query", "postgresql database admin"),
///     0.5
/// );
/// ```
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    jaccard(&token_set(a), &token_set(b))
}

fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}
