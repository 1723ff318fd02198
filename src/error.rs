pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid search parameters: {0}")]
    Params(#[from] serde_json::Error),

    #[error("non-finite distance for candidate at rank {rank}{}", column_suffix(.column))]
    NonFiniteDistance { rank: usize, column: Option<String> },

    #[error("non-finite relevance score for chunk at position {index}")]
    NonFiniteScore { index: usize },

    #[error("no vector columns found in table '{table}'")]
    NoVectorColumns { table: String },

    #[error(
        "no text columns found corresponding to vector columns in table '{table}'"
    )]
    NoTextColumns { table: String },
}

fn column_suffix(column: &Option<String>) -> String {
    match column {
        Some(name) => format!(" (column '{name}')"),
        None => String::new(),
    }
}
