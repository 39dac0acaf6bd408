use thiserror::Error;

/// Top-level error type for Docket.
///
/// Subsystem crates define their own error enums and implement
/// `From<DocketError>` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocketError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<toml::de::Error> for DocketError {
    fn from(err: toml::de::Error) -> Self {
        DocketError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DocketError {
    fn from(err: toml::ser::Error) -> Self {
        DocketError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DocketError {
    fn from(err: serde_json::Error) -> Self {
        DocketError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Docket operations.
pub type Result<T> = std::result::Result<T, DocketError>;
