//! Plain-text reports over selected chunks.
//!
//! Every report is deterministic for a given input so it can be returned
//! verbatim as a tool result.

use serde_json::Value;

use crate::{
    chunking::{Chunk, estimate_tokens},
    columns::ColumnWeight,
    config::SearchConfig,
    search::VectorSearchResult,
};

const RULE_WIDTH: usize = 80;
const SNIPPET_MAX_CHARS: usize = 100;

fn rule(c: char) -> String {
    std::iter::repeat_n(c, RULE_WIDTH).collect()
}

/// Render chunks as a numbered report with a token total.
///
/// # Examples
///
/// ```
/// use rowrank::format::format_chunks;
///
/// assert_eq!(format_chunks(&[], "anything"), "No relevant chunks found.");
/// ```
pub fn format_chunks(chunks: &[Chunk], query: &str) -> String {
    if chunks.is_empty() {
        return "No relevant chunks found.".to_string();
    }

    let mut out = format!("Search Results for: {query:?}\n");
    out.push_str(&rule('='));
    out.push_str("\n\n");

    let mut total_tokens = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!("--- Result {} ---\n", i + 1));
        out.push_str(&format!(
            "Source: {} (row rank: {})\n",
            chunk.source_column,
            chunk.original_rank + 1
        ));
        out.push_str(&format!("Relevance Score: {:.3}\n\n", chunk.score));
        out.push_str(&chunk.text);
        out.push_str("\n\n");

        total_tokens += estimate_tokens(&chunk.text);
    }

    out.push_str(&rule('='));
    out.push_str(&format!(
        "\nTotal Results: {} chunks (~{total_tokens} tokens)\n",
        chunks.len()
    ));
    out
}

/// Full report: the search configuration, column weights and every chunk.
pub fn format_full(
    chunks: &[Chunk],
    query: &str,
    weights: &[ColumnWeight],
    config: &SearchConfig,
) -> String {
    let mut out = format!("Similarity Search Results: {query:?}\n");
    out.push_str(&rule('='));
    out.push_str("\n\n");

    out.push_str("Configuration:\n");
    out.push_str(&format!("  - Vector Search: Top {} rows\n", config.top_n));
    out.push_str(&format!(
        "  - Chunking: {} tokens per chunk, {} token overlap\n",
        config.chunk_size_tokens, config.overlap_tokens
    ));
    out.push_str(&format!(
        "  - Diversity: λ={:.2} ({:.0}% relevance, {:.0}% diversity)\n",
        config.lambda,
        config.lambda * 100.0,
        (1.0 - config.lambda) * 100.0
    ));
    out.push_str(&format!(
        "  - Distance Metric: {}\n",
        config.distance_metric
    ));

    if !weights.is_empty() {
        out.push_str("  - Column Weights:\n");
        for w in weights {
            let kind = if w.is_title { "title" } else { "content" };
            out.push_str(&format!(
                "      {} ({:.1}%) [{kind}]\n",
                w.column_name,
                w.weight * 100.0
            ));
        }
    }
    out.push('\n');

    let mut total_tokens = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        let tokens = estimate_tokens(&chunk.text);
        total_tokens += tokens;

        out.push_str(&format!("Result {}/{}\n", i + 1, chunks.len()));
        out.push_str(&format!(
            "Source: {}.{} (vector search rank: #{}, chunk: {})\n",
            chunk.source_table,
            chunk.source_column,
            chunk.original_rank + 1,
            chunk.chunk_index + 1
        ));
        out.push_str(&format!("Relevance Score: {:.3}\n", chunk.score));
        out.push_str(&format!("Tokens: ~{tokens}\n\n"));
        out.push_str(&chunk.text);
        out.push_str("\n\n");
        out.push_str(&rule('-'));
        out.push_str("\n\n");
    }

    out.push_str(&rule('='));
    out.push_str(&format!(
        "\nTotal: {} chunks, ~{total_tokens} tokens\n",
        chunks.len()
    ));
    out
}

/// Compact report: score, source and a short snippet per chunk.
pub fn format_summary(chunks: &[Chunk], query: &str) -> String {
    let mut out = format!("Similarity Search Results (Summary): {query:?}\n");
    out.push_str(&rule('='));
    out.push_str("\n\n");
    out.push_str(&format!(
        "Found {} relevant chunks. Showing summaries:\n\n",
        chunks.len()
    ));

    for (i, chunk) in chunks.iter().enumerate() {
        out.push_str(&format!(
            "{}. Score: {:.3} | Source: {}.{} (rank #{})\n",
            i + 1,
            chunk.score,
            chunk.source_table,
            chunk.source_column,
            chunk.original_rank + 1
        ));
        out.push_str(&format!("   {}\n\n", snippet(&chunk.text)));
    }

    out.push_str(&rule('='));
    out.push_str(&format!(
        "\nTotal: {} results shown in summary mode\n",
        chunks.len()
    ));
    out.push_str("Use output_format='full' to see complete content\n");
    out
}

/// Identifier report over the candidate rows, before any chunking.
pub fn format_ids_only(results: &[VectorSearchResult], query: &str) -> String {
    let mut out = format!("Similarity Search Results (IDs Only): {query:?}\n");
    out.push_str(&rule('='));
    out.push_str("\n\n");
    out.push_str(&format!(
        "Found {} matching rows. Row IDs and distances:\n\n",
        results.len()
    ));

    for (rank, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. ID: {} | Distance: {:.4}\n",
            rank + 1,
            display_id(&result.row_id(rank)),
            result.distance
        ));
    }

    out.push('\n');
    out.push_str(&rule('='));
    out.push_str(&format!("\nTotal: {} results\n", results.len()));
    out.push_str(
        "Use output_format='summary' for snippets or 'full' for complete \
         content\n",
    );
    out
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_MAX_CHARS) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Strings print bare; everything else prints as JSON.
fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
