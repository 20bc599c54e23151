use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Could not normalize '{0}': no usable digits")]
    NormalizationFailure(String),

    #[error("Model fallback unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Only {known} line items could be recovered; remaining canonical items left Unknown")]
    ExtractionInsufficient { known: usize },

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),

    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "ollama")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
