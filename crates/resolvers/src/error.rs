use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported source")]
    UnsupportedSource,
    #[error("no streams found")]
    NoStreamFound,
}
