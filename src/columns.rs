//! Column role detection and distance weighting.
//!
//! Tables searched by embedding usually pair each text column with a vector
//! column holding its embedding (`title` / `title_embedding`). This module
//! pairs them up, guesses whether each text column holds short titles or
//! long body content, and turns that guess into a per-column weight used to
//! blend the per-column vector distances into one ranking distance.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Suffixes stripped from a vector column name to find its text column.
/// Checked in order; the first match wins.
const VECTOR_SUFFIXES: &[&str] = &[
    "_embedding",
    "_embeddings",
    "_vector",
    "_vectors",
    "_emb",
    "embedding",
    "vector",
];

const TEXT_TYPES: &[&str] =
    &["text", "character varying", "varchar", "character", "char", "string"];

const TITLE_KEYWORDS: &[&str] =
    &["title", "name", "heading", "header", "subject", "label"];

const CONTENT_KEYWORDS: &[&str] = &[
    "content",
    "text",
    "body",
    "description",
    "detail",
    "article",
    "document",
    "passage",
];

const TITLE_DESCRIPTION_KEYWORDS: &[&str] = &["title", "heading", "name"];

const TITLE_WEIGHT: f64 = 0.3;
const CONTENT_WEIGHT: f64 = 0.7;
const DEFAULT_WEIGHT: f64 = 0.5;

/// Samples shorter than this many characters look like titles.
const SHORT_SAMPLE_CHARS: usize = 100;

/// Samples longer than this many characters look like body content.
const LONG_SAMPLE_CHARS: usize = 500;

/// Column metadata supplied by schema introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    /// Column comment (`pg_description`), empty when absent.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_vector: bool,
}

impl ColumnInfo {
    pub fn text(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            ..Self::default()
        }
    }

    pub fn vector(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: "vector".to_string(),
            is_vector: true,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Search weight of one text column and the vector column that embeds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnWeight {
    pub column_name: String,
    pub vector_name: String,
    pub is_title: bool,
    pub weight: f64,
}

/// The role a heuristic assigns to a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRole {
    pub is_title: bool,
    pub weight: f64,
}

impl ColumnRole {
    pub const TITLE: Self = Self {
        is_title: true,
        weight: TITLE_WEIGHT,
    };

    pub const CONTENT: Self = Self {
        is_title: false,
        weight: CONTENT_WEIGHT,
    };

    pub const DEFAULT: Self = Self {
        is_title: false,
        weight: DEFAULT_WEIGHT,
    };
}

/// A column role heuristic. Returns `None` when it has no opinion.
pub type RoleRule = fn(&ColumnInfo, Option<&str>) -> Option<ColumnRole>;

/// Heuristics in increasing priority; the last rule that fires wins.
pub const ROLE_RULES: &[RoleRule] =
    &[role_from_name, role_from_description, role_from_sample];

/// Guess the role from keywords in the column name.
pub fn role_from_name(
    column: &ColumnInfo,
    _sample: Option<&str>,
) -> Option<ColumnRole> {
    let name = column.name.to_lowercase();
    if contains_any(&name, TITLE_KEYWORDS) {
        Some(ColumnRole::TITLE)
    } else if contains_any(&name, CONTENT_KEYWORDS) {
        Some(ColumnRole::CONTENT)
    } else {
        None
    }
}

/// Force the title role when the column comment mentions titles or names.
pub fn role_from_description(
    column: &ColumnInfo,
    _sample: Option<&str>,
) -> Option<ColumnRole> {
    let description = column.description.to_lowercase();
    contains_any(&description, TITLE_DESCRIPTION_KEYWORDS)
        .then_some(ColumnRole::TITLE)
}

/// Guess the role from the length of a sample value.
pub fn role_from_sample(
    _column: &ColumnInfo,
    sample: Option<&str>,
) -> Option<ColumnRole> {
    let len = sample?.chars().count();
    if len > 0 && len < SHORT_SAMPLE_CHARS {
        Some(ColumnRole::TITLE)
    } else if len > LONG_SAMPLE_CHARS {
        Some(ColumnRole::CONTENT)
    } else {
        None
    }
}

/// Apply every rule in [`ROLE_RULES`] and keep the last opinion.
pub fn classify_column(column: &ColumnInfo, sample: Option<&str>) -> ColumnRole {
    ROLE_RULES
        .iter()
        .rev()
        .find_map(|rule| rule(column, sample))
        .unwrap_or(ColumnRole::DEFAULT)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Derive the text column name measured by a vector column.
///
/// # Examples
///
/// ```
/// use rowrank::columns::infer_text_column_name;
///
/// assert_eq!(infer_text_column_name("title_embedding"), "title");
/// assert_eq!(infer_text_column_name("content_vectors"), "content");
/// assert_eq!(infer_text_column_name("BodyEmbedding"), "Body");
/// ```
pub fn infer_text_column_name(vector_column: &str) -> &str {
    let mut name = vector_column;
    for suffix in VECTOR_SUFFIXES {
        if let Some(stem) = strip_suffix_ignore_case(name, suffix) {
            name = stem;
            break;
        }
    }
    name.strip_suffix('_').unwrap_or(name)
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (stem, tail) = name.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(stem)
}

/// Whether a database type name denotes a text column.
pub fn is_text_data_type(data_type: &str) -> bool {
    contains_any(&data_type.to_lowercase(), TEXT_TYPES)
}

/// Detect title/content roles and weights for every text column that has a
/// matching vector column.
///
/// A single qualifying column always ends with weight 1.0. With more than
/// one, weights are divided by their sum so they total 1.0.
pub fn detect_column_weights(
    columns: &[ColumnInfo],
    samples: &HashMap<String, String>,
) -> Vec<ColumnWeight> {
    let vector_for_text: HashMap<&str, &str> = columns
        .iter()
        .filter(|c| c.is_vector)
        .map(|c| (infer_text_column_name(&c.name), c.name.as_str()))
        .collect();

    let mut weights: Vec<ColumnWeight> = columns
        .iter()
        .filter(|c| !c.is_vector && is_text_data_type(&c.data_type))
        .filter_map(|column| {
            let vector_name = vector_for_text.get(column.name.as_str())?;
            let sample = samples.get(&column.name).map(String::as_str);
            let role = classify_column(column, sample);
            Some(ColumnWeight {
                column_name: column.name.clone(),
                vector_name: vector_name.to_string(),
                is_title: role.is_title,
                weight: role.weight,
            })
        })
        .collect();

    normalize_weights(&mut weights);
    weights
}

fn normalize_weights(weights: &mut [ColumnWeight]) {
    if let [only] = weights {
        only.weight = 1.0;
        return;
    }

    let total: f64 = weights.iter().map(|w| w.weight).sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            w.weight /= total;
        }
    }
}

/// Find the text columns to chunk for a table.
///
/// Each vector column is matched to the text-typed column named by
/// [`infer_text_column_name`]. When no vector column matches, every
/// non-vector text column is returned instead.
pub fn discover_text_columns(columns: &[ColumnInfo]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();

    for vector in columns.iter().filter(|c| c.is_vector) {
        let text_name = infer_text_column_name(&vector.name);
        let found = columns.iter().find(|c| {
            !c.is_vector
                && c.name == text_name
                && is_text_data_type(&c.data_type)
        });
        if let Some(column) = found
            && seen.insert(column.name.as_str())
        {
            matched.push(column.name.clone());
        }
    }

    if !matched.is_empty() {
        return matched;
    }

    tracing::debug!("no vector column matched a text column, using all text");
    columns
        .iter()
        .filter(|c| !c.is_vector && is_text_data_type(&c.data_type))
        .map(|c| c.name.clone())
        .collect()
}

/// Blend per-vector-column distances into one distance.
///
/// `weights` pairs a vector column with its weight, as returned by
/// [`SearchPlan::effective_weights`]. Columns without a distance
/// contribute nothing. No weights gives 0.
pub fn weighted_distance(
    distances: &HashMap<String, f64>,
    weights: &[(String, f64)],
) -> f64 {
    weights
        .iter()
        .filter_map(|(column, weight)| distances.get(column).map(|d| d * weight))
        .sum()
}

/// Everything the vector query and the chunker need to know about a table.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub vector_columns: Vec<String>,
    pub text_columns: Vec<String>,
    pub weights: Vec<ColumnWeight>,
}

impl SearchPlan {
    /// Inspect a table's columns and sample values.
    ///
    /// Fails when the table has no vector column or no text column to
    /// chunk.
    pub fn for_table(
        table: &str,
        columns: &[ColumnInfo],
        samples: &HashMap<String, String>,
    ) -> Result<Self> {
        let vector_columns: Vec<String> = columns
            .iter()
            .filter(|c| c.is_vector)
            .map(|c| c.name.clone())
            .collect();
        if vector_columns.is_empty() {
            return Err(Error::NoVectorColumns {
                table: table.to_string(),
            });
        }

        let text_columns = discover_text_columns(columns);
        if text_columns.is_empty() {
            return Err(Error::NoTextColumns {
                table: table.to_string(),
            });
        }

        let weights = detect_column_weights(columns, samples);
        tracing::debug!(
            table,
            vector_columns = vector_columns.len(),
            text_columns = text_columns.len(),
            weighted_columns = weights.len(),
            "planned search columns"
        );

        Ok(Self {
            vector_columns,
            text_columns,
            weights,
        })
    }

    /// Weight per vector column for the distance query.
    ///
    /// Falls back to equal weights over all vector columns when no column
    /// weight could be detected.
    pub fn effective_weights(&self) -> Vec<(String, f64)> {
        if !self.weights.is_empty() {
            return self
                .weights
                .iter()
                .map(|w| (w.vector_name.clone(), w.weight))
                .collect();
        }

        let equal = 1.0 / self.vector_columns.len() as f64;
        self.vector_columns
            .iter()
            .map(|name| (name.clone(), equal))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_samples() -> HashMap<String, String> {
        HashMap::new()
    }

    fn weight_of<'a>(weights: &'a [ColumnWeight], column: &str) -> &'a ColumnWeight {
        weights
            .iter()
            .find(|w| w.column_name == column)
            .unwrap_or_else(|| panic!("no weight for {column}"))
    }

    #[test]
    fn infers_text_column_from_suffixes() {
        assert_eq!(infer_text_column_name("title_embedding"), "title");
        assert_eq!(infer_text_column_name("title_embeddings"), "title");
        assert_eq!(infer_text_column_name("content_vector"), "content");
        assert_eq!(infer_text_column_name("content_vectors"), "content");
        assert_eq!(infer_text_column_name("body_emb"), "body");
        assert_eq!(infer_text_column_name("bodyembedding"), "body");
        assert_eq!(infer_text_column_name("TITLE_EMBEDDING"), "TITLE");
        assert_eq!(infer_text_column_name("summary"), "summary");
        assert_eq!(infer_text_column_name("é"), "é");
    }

    #[test]
    fn recognizes_text_types() {
        assert!(is_text_data_type("text"));
        assert!(is_text_data_type("CHARACTER VARYING"));
        assert!(is_text_data_type("varchar(255)"));
        assert!(!is_text_data_type("integer"));
        assert!(!is_text_data_type("vector"));
    }

    #[test]
    fn rules_apply_last_opinion_wins() {
        let title = ColumnInfo::text("title", "text");
        assert_eq!(classify_column(&title, None), ColumnRole::TITLE);

        let body = ColumnInfo::text("body", "text");
        assert_eq!(classify_column(&body, None), ColumnRole::CONTENT);

        let other = ColumnInfo::text("misc", "text");
        assert_eq!(classify_column(&other, None), ColumnRole::DEFAULT);

        let described = ColumnInfo::text("body", "text")
            .with_description("The article heading");
        assert_eq!(classify_column(&described, None), ColumnRole::TITLE);

        let long_sample = "x".repeat(600);
        assert_eq!(
            classify_column(&described, Some(&long_sample)),
            ColumnRole::CONTENT
        );
        assert_eq!(classify_column(&body, Some("Short")), ColumnRole::TITLE);
        assert_eq!(
            classify_column(&title, Some(&"x".repeat(300))),
            ColumnRole::TITLE
        );
        assert_eq!(classify_column(&other, Some("")), ColumnRole::DEFAULT);
    }

    #[test]
    fn title_keywords_beat_content_keywords_in_name() {
        let column = ColumnInfo::text("title_text", "text");
        assert_eq!(role_from_name(&column, None), Some(ColumnRole::TITLE));
    }

    #[test]
    fn title_and_content_keep_heuristic_weights() {
        let columns = vec![
            ColumnInfo::text("id", "integer"),
            ColumnInfo::text("title", "text"),
            ColumnInfo::text("content", "text"),
            ColumnInfo::vector("title_embedding"),
            ColumnInfo::vector("content_embedding"),
        ];

        let weights = detect_column_weights(&columns, &no_samples());

        assert_eq!(weights.len(), 2);
        let title = weight_of(&weights, "title");
        assert!(title.is_title);
        assert_eq!(title.vector_name, "title_embedding");
        assert!((title.weight - 0.3).abs() < 1e-9);

        let content = weight_of(&weights, "content");
        assert!(!content.is_title);
        assert!((content.weight - 0.7).abs() < 1e-9);
    }

    #[test]
    fn single_column_gets_full_weight() {
        let columns = vec![
            ColumnInfo::text("title", "text"),
            ColumnInfo::vector("title_embedding"),
        ];
        let weights = detect_column_weights(&columns, &no_samples());
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].weight, 1.0);
        assert!(weights[0].is_title);
    }

    #[test]
    fn single_column_gets_full_weight_for_every_role() {
        let content = vec![
            ColumnInfo::text("body", "text"),
            ColumnInfo::vector("body_embedding"),
        ];
        let weights = detect_column_weights(&content, &no_samples());
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].weight, 1.0);
        assert!(!weights[0].is_title);

        let unclassified = vec![
            ColumnInfo::text("misc", "text"),
            ColumnInfo::vector("misc_embedding"),
        ];
        assert_eq!(classify_column(&unclassified[0], None), ColumnRole::DEFAULT);
        let weights = detect_column_weights(&unclassified, &no_samples());
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].weight, 1.0);
        assert!(!weights[0].is_title);

        let samples =
            HashMap::from([("misc".to_string(), "word ".repeat(120))]);
        let weights = detect_column_weights(&unclassified, &samples);
        assert_eq!(weights[0].weight, 1.0);
        assert!(!weights[0].is_title);
    }

    #[test]
    fn weights_normalize_to_one() {
        let columns = vec![
            ColumnInfo::text("headline", "text"),
            ColumnInfo::text("misc", "text"),
            ColumnInfo::text("notes", "text"),
            ColumnInfo::vector("headline_vector"),
            ColumnInfo::vector("misc_vector"),
            ColumnInfo::vector("notes_vector"),
        ];
        let weights = detect_column_weights(&columns, &no_samples());
        assert_eq!(weights.len(), 3);
        let total: f64 = weights.iter().map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unpaired_and_non_text_columns_are_ignored() {
        let columns = vec![
            ColumnInfo::text("title", "text"),
            ColumnInfo::text("body", "jsonb"),
            ColumnInfo::vector("body_embedding"),
        ];
        assert!(detect_column_weights(&columns, &no_samples()).is_empty());
    }

    #[test]
    fn samples_override_name_heuristics() {
        let columns = vec![
            ColumnInfo::text("title", "text"),
            ColumnInfo::text("body", "text"),
            ColumnInfo::vector("title_embedding"),
            ColumnInfo::vector("body_embedding"),
        ];
        let samples = HashMap::from([
            ("title".to_string(), "t".repeat(800)),
            ("body".to_string(), "short body".to_string()),
        ]);
        let weights = detect_column_weights(&columns, &samples);
        assert!(!weight_of(&weights, "title").is_title);
        assert!(weight_of(&weights, "body").is_title);
    }

    #[test]
    fn discovers_matched_text_columns() {
        let columns = vec![
            ColumnInfo::text("title", "text"),
            ColumnInfo::text("body", "character varying"),
            ColumnInfo::text("author", "text"),
            ColumnInfo::vector("title_embedding"),
            ColumnInfo::vector("body_vector"),
        ];
        assert_eq!(discover_text_columns(&columns), vec!["title", "body"]);
    }

    #[test]
    fn discovery_falls_back_to_all_text_columns() {
        let columns = vec![
            ColumnInfo::text("id", "bigint"),
            ColumnInfo::text("summary", "text"),
            ColumnInfo::text("notes", "varchar"),
            ColumnInfo::vector("embedding"),
        ];
        assert_eq!(discover_text_columns(&columns), vec!["summary", "notes"]);
    }

    #[test]
    fn weighted_distance_blends_columns() {
        let weights = vec![
            ("title_embedding".to_string(), 0.3),
            ("body_embedding".to_string(), 0.7),
        ];
        let distances = HashMap::from([
            ("title_embedding".to_string(), 0.2),
            ("body_embedding".to_string(), 0.4),
        ]);
        let combined = weighted_distance(&distances, &weights);
        assert!((combined - (0.3 * 0.2 + 0.7 * 0.4)).abs() < 1e-12);

        let partial = HashMap::from([("body_embedding".to_string(), 0.4)]);
        assert!((weighted_distance(&partial, &weights) - 0.28).abs() < 1e-12);
        assert_eq!(weighted_distance(&distances, &[]), 0.0);
    }

    #[test]
    fn plan_rejects_tables_without_vectors() {
        let columns = vec![ColumnInfo::text("body", "text")];
        let err = SearchPlan::for_table("docs", &columns, &no_samples())
            .unwrap_err();
        assert!(matches!(err, Error::NoVectorColumns { table } if table == "docs"));
    }

    #[test]
    fn plan_rejects_tables_without_text() {
        let columns = vec![
            ColumnInfo::text("id", "integer"),
            ColumnInfo::vector("embedding"),
        ];
        let err = SearchPlan::for_table("docs", &columns, &no_samples())
            .unwrap_err();
        assert!(matches!(err, Error::NoTextColumns { .. }));
    }

    #[test]
    fn plan_uses_equal_weights_without_detection() {
        let columns = vec![
            ColumnInfo::text("summary", "text"),
            ColumnInfo::vector("a_embedding"),
            ColumnInfo::vector("b_embedding"),
        ];
        let plan =
            SearchPlan::for_table("docs", &columns, &no_samples()).unwrap();
        assert_eq!(plan.text_columns, vec!["summary"]);
        assert!(plan.weights.is_empty());
        assert_eq!(
            plan.effective_weights(),
            vec![
                ("a_embedding".to_string(), 0.5),
                ("b_embedding".to_string(), 0.5),
            ]
        );
    }

    #[test]
    fn plan_weights_feed_weighted_distance() {
        let columns = vec![
            ColumnInfo::text("title", "text"),
            ColumnInfo::text("body", "text"),
            ColumnInfo::vector("title_embedding"),
            ColumnInfo::vector("body_embedding"),
        ];
        let plan =
            SearchPlan::for_table("docs", &columns, &no_samples()).unwrap();
        let distances = HashMap::from([
            ("title_embedding".to_string(), 0.2),
            ("body_embedding".to_string(), 0.4),
        ]);

        let combined = weighted_distance(&distances, &plan.effective_weights());

        assert!((combined - (0.3 * 0.2 + 0.7 * 0.4)).abs() < 1e-12);
    }
}
