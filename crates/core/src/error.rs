use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("chunking failed: {0}")]
    Chunking(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("similarity failed: {0}")]
    Similarity(String),

    #[error("document limit reached: {held} documents held, ceiling is {limit}")]
    Admission { held: usize, limit: usize },

    #[error("path has no file name: {0}")]
    MissingFileName(PathBuf),

    #[error("invalid pipeline options: {0}")]
    InvalidOptions(String),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    Backend { backend: String, details: String },

    #[error("model returned no text for {backend}")]
    Empty { backend: String },

    #[error("missing api key for {backend}")]
    MissingApiKey { backend: String },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
