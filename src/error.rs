use thiserror::Error;

/// Everything that can go wrong between receiving a response body and
/// finishing an output file. Transport errors stay `reqwest::Error` and are
/// handled at the binary boundary.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("node {id} has no name, short_name, operator or amenity tag")]
    MissingTag { id: i64 },

    #[error("malformed JSON: {0}")]
    Syntax(String),

    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("query has no filter statements")]
    EmptyQuery,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
