//! Request-scoped search configuration.
//!
//! A [`SearchConfig`] is resolved once per query, usually from the JSON
//! arguments of a tool call ([`SearchParams`]), and is never mutated
//! afterwards.

use std::{fmt, str::FromStr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    chunking::{DEFAULT_CHUNK_TOKENS, DEFAULT_OVERLAP_TOKENS},
    error::{Error, Result},
    mmr::DEFAULT_LAMBDA,
};

/// Default number of rows requested from the vector search.
pub const DEFAULT_TOP_N: usize = 10;

/// Default output budget in tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 1000;

/// Lower bound on the number of chunks MMR may keep before budgeting.
const MIN_CHUNKS_BEFORE_BUDGET: usize = 10;

/// Distance function used by the upstream vector query.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    #[serde(alias = "euclidean")]
    L2,
    #[serde(alias = "inner")]
    InnerProduct,
}

impl DistanceMetric {
    /// The pgvector operator computing this distance.
    pub fn operator(self) -> &'static str {
        match self {
            Self::Cosine => "<=>",
            Self::L2 => "<->",
            Self::InnerProduct => "<#>",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
            Self::InnerProduct => "inner_product",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            "inner_product" | "inner" => Ok(Self::InnerProduct),
            other => Err(Error::Config(format!(
                "unknown distance metric '{other}' \
                 (expected cosine, l2 or inner_product)"
            ))),
        }
    }
}

/// How much of the result the report shows.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Complete chunk text with configuration details.
    #[default]
    Full,
    /// Scores and short snippets only.
    Summary,
    /// Row identifiers and distances of the candidate rows.
    IdsOnly,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "summary" => Ok(Self::Summary),
            "ids_only" => Ok(Self::IdsOnly),
            other => Err(Error::Config(format!(
                "unknown output format '{other}' \
                 (expected full, summary or ids_only)"
            ))),
        }
    }
}

/// Optional search arguments as they arrive from a tool call.
///
/// Missing fields take the [`SearchConfig`] defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Number of rows to retrieve from vector search (default: 10).
    pub top_n: Option<usize>,
    /// Maximum tokens per chunk (default: 100).
    pub chunk_size_tokens: Option<usize>,
    /// Overlap between adjacent chunks in tokens (default: 25).
    pub overlap_tokens: Option<usize>,
    /// MMR diversity parameter: 0.0 = max diversity, 1.0 = max relevance
    /// (default: 0.6).
    pub lambda: Option<f64>,
    /// Maximum total tokens to return (default: 1000).
    pub max_output_tokens: Option<usize>,
    /// Distance metric: cosine, l2 or inner_product (default: cosine).
    pub distance_metric: Option<DistanceMetric>,
    /// Output format: full, summary or ids_only (default: full).
    pub output_format: Option<OutputFormat>,
}

/// Parameters of one search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchConfig {
    pub top_n: usize,
    pub chunk_size_tokens: usize,
    pub overlap_tokens: usize,
    pub lambda: f64,
    pub max_output_tokens: usize,
    pub distance_metric: DistanceMetric,
    pub output_format: OutputFormat,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            chunk_size_tokens: DEFAULT_CHUNK_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
            lambda: DEFAULT_LAMBDA,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            distance_metric: DistanceMetric::default(),
            output_format: OutputFormat::default(),
        }
    }
}

impl SearchConfig {
    /// Overlay tool arguments on the defaults and validate the result.
    pub fn from_params(params: &SearchParams) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            top_n: params.top_n.unwrap_or(defaults.top_n),
            chunk_size_tokens: params
                .chunk_size_tokens
                .unwrap_or(defaults.chunk_size_tokens),
            overlap_tokens: params
                .overlap_tokens
                .unwrap_or(defaults.overlap_tokens),
            lambda: params.lambda.unwrap_or(defaults.lambda),
            max_output_tokens: params
                .max_output_tokens
                .unwrap_or(defaults.max_output_tokens),
            distance_metric: params
                .distance_metric
                .unwrap_or(defaults.distance_metric),
            output_format: params
                .output_format
                .unwrap_or(defaults.output_format),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse tool-call arguments (a JSON object) into a config.
    ///
    /// Unknown keys such as `table_name` or `query_text` are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use rowrank::config::{DistanceMetric, SearchConfig};
    ///
    /// let args = serde_json::json!({
    ///     "query_text": "vacuum tuning",
    ///     "top_n": 25,
    ///     "distance_metric": "l2",
    /// });
    /// let config = SearchConfig::from_json(&args).unwrap();
    /// assert_eq!(config.top_n, 25);
    /// assert_eq!(config.distance_metric, DistanceMetric::L2);
    /// assert_eq!(config.chunk_size_tokens, 100);
    /// ```
    pub fn from_json(args: &serde_json::Value) -> Result<Self> {
        let params = SearchParams::deserialize(args)?;
        Self::from_params(&params)
    }

    /// Reject values that would poison downstream arithmetic.
    pub fn validate(&self) -> Result<()> {
        if !self.lambda.is_finite() {
            return Err(Error::Config(format!(
                "lambda must be a finite number, got {}",
                self.lambda
            )));
        }
        Ok(())
    }

    /// How many chunks MMR keeps before the token budget is applied.
    ///
    /// Twice the number of full-size chunks the budget can hold, but never
    /// fewer than 10.
    pub fn max_chunks_before_budget(&self) -> usize {
        self.max_output_tokens
            .checked_div(self.chunk_size_tokens)
            .map_or(0, |chunks| chunks.saturating_mul(2))
            .max(MIN_CHUNKS_BEFORE_BUDGET)
    }
}
