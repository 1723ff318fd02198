//! The re-ranking pipeline over vector search candidates.
//!
//! Candidate rows are chunked, ranked with BM25 against the query, thinned
//! out with MMR and finally cut to the output token budget:
//!
//! ```text
//! rows -> chunk_results -> rank_chunks -> MmrSelector -> select_within_budget -> report
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    bm25,
    chunking::{Chunk, RowData, chunk_row, select_within_budget},
    columns::{SearchPlan, weighted_distance},
    config::{OutputFormat, SearchConfig},
    error::{Error, Result},
    format,
    mmr::MmrSelector,
};

/// A candidate row as returned by the vector search.
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// Every column of the row.
    pub row: RowData,
    /// Combined distance over all searched vector columns.
    pub distance: f64,
    /// Distance per vector column.
    pub column_distances: HashMap<String, f64>,
}

impl VectorSearchResult {
    pub fn new(
        row: RowData,
        distance: f64,
        column_distances: HashMap<String, f64>,
    ) -> Self {
        Self {
            row,
            distance,
            column_distances,
        }
    }

    /// Build a result whose combined distance is the weighted sum of its
    /// per-column distances, see [`weighted_distance`].
    pub fn weighted(
        row: RowData,
        column_distances: HashMap<String, f64>,
        weights: &[(String, f64)],
    ) -> Self {
        let distance = weighted_distance(&column_distances, weights);
        Self::new(row, distance, column_distances)
    }

    /// Identifier of this row at the given 0-based rank.
    pub fn row_id(&self, rank: usize) -> Value {
        row_id(&self.row, rank)
    }

    /// Fail on NaN or infinite distances.
    ///
    /// When several columns are bad the alphabetically first is reported.
    pub fn validate(&self, rank: usize) -> Result<()> {
        if !self.distance.is_finite() {
            return Err(Error::NonFiniteDistance { rank, column: None });
        }

        let bad_column = self
            .column_distances
            .iter()
            .filter(|(_, d)| !d.is_finite())
            .map(|(column, _)| column)
            .min();
        if let Some(column) = bad_column {
            return Err(Error::NonFiniteDistance {
                rank,
                column: Some(column.clone()),
            });
        }

        Ok(())
    }
}

/// The row's `id` column, or its rank when it has none.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use rowrank::search::row_id;
/// use serde_json::json;
///
/// let row = Arc::new(json!({"id": 42, "body": "text"}).as_object().cloned().unwrap());
/// assert_eq!(row_id(&row, 3), json!(42));
///
/// let row = Arc::new(json!({"body": "text"}).as_object().cloned().unwrap());
/// assert_eq!(row_id(&row, 3), json!(3));
/// ```
pub fn row_id(row: &RowData, rank: usize) -> Value {
    match row.get("id") {
        Some(id) => id.clone(),
        None => Value::from(rank),
    }
}

/// Chunk the text columns of every candidate, keeping vector search order.
pub fn chunk_results(
    results: &[VectorSearchResult],
    text_columns: &[String],
    table: &str,
    config: &SearchConfig,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (rank, result) in results.iter().enumerate() {
        if !result.row.contains_key("id") {
            tracing::trace!(rank, "row has no id column, using its rank");
        }
        chunks.extend(chunk_row(
            &result.row,
            text_columns,
            &result.row_id(rank),
            table,
            rank,
            config.chunk_size_tokens,
            config.overlap_tokens,
        ));
    }

    chunks
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct SearchOutput {
    /// Chunks that made it into the report, in report order.
    pub chunks: Vec<Chunk>,
    /// The rendered report, or a message explaining an empty result.
    pub report: String,
    /// Number of candidate rows handed in.
    pub candidates: usize,
    /// Number of chunks kept by MMR before budgeting.
    pub diverse: usize,
}

/// Run the full re-ranking pipeline for one query.
///
/// Empty outcomes are not errors: with no candidates, or with no chunk
/// fitting the budget, the report explains what happened and `chunks` is
/// empty. Errors are reserved for non-finite distances or scores and for
/// an invalid configuration.
pub fn execute_search(
    table: &str,
    query: &str,
    plan: &SearchPlan,
    results: &[VectorSearchResult],
    config: &SearchConfig,
) -> Result<SearchOutput> {
    config.validate()?;
    for (rank, result) in results.iter().enumerate() {
        result.validate(rank)?;
    }

    if results.is_empty() {
        tracing::debug!(table, "vector search returned no candidates");
        return Ok(SearchOutput {
            chunks: Vec::new(),
            report: no_results_message(query),
            candidates: 0,
            diverse: 0,
        });
    }

    let chunks = chunk_results(results, &plan.text_columns, table, config);
    tracing::debug!(
        table,
        candidates = results.len(),
        chunks = chunks.len(),
        "chunked candidate rows"
    );

    let ranked = bm25::rank_chunks(chunks, query);

    let max_chunks = config.max_chunks_before_budget();
    let diverse =
        MmrSelector::new(config.lambda).select_chunks(ranked, max_chunks)?;
    let diverse_count = diverse.len();

    let selected = select_within_budget(diverse, config.max_output_tokens);
    tracing::debug!(
        table,
        max_chunks,
        diverse = diverse_count,
        selected = selected.len(),
        budget = config.max_output_tokens,
        "applied token budget"
    );

    if selected.is_empty() {
        return Ok(SearchOutput {
            chunks: selected,
            report: over_budget_message(config.max_output_tokens, diverse_count),
            candidates: results.len(),
            diverse: diverse_count,
        });
    }

    let report = match config.output_format {
        OutputFormat::Full => {
            format::format_full(&selected, query, &plan.weights, config)
        }
        OutputFormat::Summary => format::format_summary(&selected, query),
        OutputFormat::IdsOnly => format::format_ids_only(results, query),
    };

    Ok(SearchOutput {
        chunks: selected,
        report,
        candidates: results.len(),
        diverse: diverse_count,
    })
}

fn no_results_message(query: &str) -> String {
    format!(
        "No results found for query: {query:?}\n\n\
         The vector search completed but found no semantically similar \
         content.\n\
         Try a broader query or a larger top_n.\n"
    )
}

fn over_budget_message(max_output_tokens: usize, diverse: usize) -> String {
    format!(
        "Search completed successfully, but no chunks fit within the token \
         budget.\n\n\
         All matching chunks exceed the max_output_tokens limit of \
         {max_output_tokens} tokens.\n\
         Found {diverse} diverse chunks after MMR filtering, but all too \
         large.\n\
         Increase max_output_tokens, reduce chunk_size_tokens or use \
         output_format=\"summary\".\n"
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::columns::ColumnWeight;

    fn row(value: Value) -> RowData {
        Arc::new(value.as_object().cloned().unwrap_or_default())
    }

    fn result(value: Value, distance: f64) -> VectorSearchResult {
        VectorSearchResult::new(row(value), distance, HashMap::new())
    }

    fn plan() -> SearchPlan {
        SearchPlan {
            vector_columns: vec!["title_embedding".into(), "body_embedding".into()],
            text_columns: vec!["title".into(), "body".into()],
            weights: vec![
                ColumnWeight {
                    column_name: "title".into(),
                    vector_name: "title_embedding".into(),
                    is_title: true,
                    weight: 0.3,
                },
                ColumnWeight {
                    column_name: "body".into(),
                    vector_name: "body_embedding".into(),
                    is_title: false,
                    weight: 0.7,
                },
            ],
        }
    }

    fn candidates() -> Vec<VectorSearchResult> {
        vec![
            result(
                json!({
                    "id": 1,
                    "title": "Tuning autovacuum",
                    "body": "Autovacuum removes dead tuples and keeps \
                             table bloat under control.",
                }),
                0.1,
            ),
            result(
                json!({
                    "id": 2,
                    "title": "Replication basics",
                    "body": "Streaming replication ships WAL records \
                             to standby servers.",
                }),
                0.2,
            ),
            result(
                json!({
                    "title": "Index maintenance",
                    "body": "Reindexing fixes index bloat after heavy \
                             updates.",
                }),
                0.3,
            ),
        ]
    }

    #[test]
    fn row_id_prefers_id_column() {
        assert_eq!(row_id(&row(json!({"id": "abc"})), 4), json!("abc"));
        assert_eq!(row_id(&row(json!({"id": null})), 4), Value::Null);
        assert_eq!(row_id(&row(json!({"name": "x"})), 4), json!(4));
    }

    #[test]
    fn weighted_distance_combines_columns() {
        let distances = HashMap::from([
            ("title_embedding".to_string(), 0.2),
            ("body_embedding".to_string(), 0.4),
        ]);
        let weights = plan().effective_weights();

        let result =
            VectorSearchResult::weighted(row(json!({})), distances, &weights);

        assert!((result.distance - 0.34).abs() < 1e-12);
    }

    #[test]
    fn validate_reports_bad_distances() {
        let ok = result(json!({}), 0.5);
        assert!(ok.validate(0).is_ok());

        let nan = result(json!({}), f64::NAN);
        assert!(matches!(
            nan.validate(2),
            Err(Error::NonFiniteDistance { rank: 2, column: None })
        ));

        let bad_column = VectorSearchResult::new(
            row(json!({})),
            0.5,
            HashMap::from([
                ("b_embedding".to_string(), f64::INFINITY),
                ("a_embedding".to_string(), f64::NAN),
                ("c_embedding".to_string(), 0.1),
            ]),
        );
        match bad_column.validate(1) {
            Err(Error::NonFiniteDistance { rank, column }) => {
                assert_eq!(rank, 1);
                assert_eq!(column.as_deref(), Some("a_embedding"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn chunk_results_keeps_rank_and_ids() {
        let chunks = chunk_results(
            &candidates(),
            &plan().text_columns,
            "articles",
            &SearchConfig::default(),
        );

        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0].source_row_id, json!(1));
        assert_eq!(chunks[0].source_column, "title");
        assert_eq!(chunks[1].source_column, "body");
        assert_eq!(chunks[4].source_row_id, json!(2));
        assert_eq!(chunks[4].original_rank, 2);
        assert!(chunks.iter().all(|c| c.source_table == "articles"));
    }

    #[test]
    fn no_candidates_is_not_an_error() {
        let output = execute_search(
            "articles",
            "vacuum",
            &plan(),
            &[],
            &SearchConfig::default(),
        )
        .unwrap();

        assert!(output.chunks.is_empty());
        assert_eq!(output.candidates, 0);
        assert!(
            output
                .report
                .starts_with("No results found for query: \"vacuum\"")
        );
    }

    #[test]
    fn pipeline_ranks_matching_chunks_first() {
        let output = execute_search(
            "articles",
            "index bloat",
            &plan(),
            &candidates(),
            &SearchConfig::default(),
        )
        .unwrap();

        assert_eq!(output.candidates, 3);
        assert_eq!(output.diverse, 6);
        let first = &output.chunks[0];
        assert_eq!(first.source_column, "body");
        assert_eq!(first.original_rank, 2);
        assert!(output.report.contains("Similarity Search Results: \"index bloat\""));
        assert!(output.report.contains("      body (70.0%) [content]\n"));
    }

    #[test]
    fn tiny_budget_explains_empty_result() {
        let config = SearchConfig {
            max_output_tokens: 1,
            ..SearchConfig::default()
        };

        let output =
            execute_search("articles", "bloat", &plan(), &candidates(), &config)
                .unwrap();

        assert!(output.chunks.is_empty());
        assert_eq!(output.diverse, 6);
        assert!(output.report.contains("limit of 1 tokens"));
        assert!(output.report.contains("Found 6 diverse chunks"));
    }

    #[test]
    fn output_format_selects_report() {
        let summary = SearchConfig {
            output_format: OutputFormat::Summary,
            ..SearchConfig::default()
        };
        let output =
            execute_search("articles", "bloat", &plan(), &candidates(), &summary)
                .unwrap();
        assert!(output.report.contains("(Summary)"));

        let ids = SearchConfig {
            output_format: OutputFormat::IdsOnly,
            ..SearchConfig::default()
        };
        let output =
            execute_search("articles", "bloat", &plan(), &candidates(), &ids)
                .unwrap();
        assert!(output.report.contains("1. ID: 1 | Distance: 0.1000\n"));
        assert!(output.report.contains("3. ID: 2 | Distance: 0.3000\n"));
    }

    #[test]
    fn non_finite_distance_aborts() {
        let mut rows = candidates();
        rows[1].distance = f64::NAN;

        let err = execute_search(
            "articles",
            "bloat",
            &plan(),
            &rows,
            &SearchConfig::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            Error::NonFiniteDistance { rank: 1, column: None }
        ));
    }

    #[test]
    fn invalid_lambda_aborts() {
        let config = SearchConfig {
            lambda: f64::NAN,
            ..SearchConfig::default()
        };
        let err =
            execute_search("articles", "bloat", &plan(), &candidates(), &config)
                .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
