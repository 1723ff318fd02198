//! rowrank - lexical and diversity re-ranking of vector search rows.
//!
//! Given rows already retrieved by a vector similarity search, rowrank cuts
//! their text columns into overlapping chunks, ranks the chunks with BM25
//! against the query, keeps a relevant but diverse subset with Maximal
//! Marginal Relevance and trims it to a token budget for an LLM response.
//!
//! # Quick start
//!
//! ```
//! use std::{collections::HashMap, sync::Arc};
//!
//! use rowrank::{ColumnInfo, SearchConfig, SearchPlan, VectorSearchResult};
//! use serde_json::json;
//!
//! let columns = vec![
//!     ColumnInfo::text("title", "text"),
//!     ColumnInfo::text("body", "text"),
//!     ColumnInfo::vector("body_embedding"),
//! ];
//! let plan = SearchPlan::for_table("articles", &columns, &HashMap::new()).unwrap();
//!
//! let row = json!({
//!     "id": 7,
//!     "title": "Tuning autovacuum",
//!     "body": "Autovacuum removes dead tuples and limits table bloat.",
//! });
//! let results = vec![VectorSearchResult::new(
//!     Arc::new(row.as_object().cloned().unwrap()),
//!     0.12,
//!     HashMap::new(),
//! )];
//!
//! let config = SearchConfig::from_json(&json!({"lambda": 0.7})).unwrap();
//! let output =
//!     rowrank::execute_search("articles", "table bloat", &plan, &results, &config)
//!         .unwrap();
//!
//! assert_eq!(output.chunks[0].source_column, "body");
//! println!("{}", output.report);
//! ```

pub mod bm25;
pub mod chunking;
pub mod columns;
pub mod config;
pub mod error;
pub mod format;
pub mod mmr;
pub mod search;
pub mod tokenize;

pub use chunking::{Chunk, RowData};
pub use columns::{ColumnInfo, ColumnWeight, SearchPlan};
pub use config::{DistanceMetric, OutputFormat, SearchConfig, SearchParams};
pub use error::{Error, Result};
pub use mmr::MmrSelector;
pub use search::{SearchOutput, VectorSearchResult, execute_search};
