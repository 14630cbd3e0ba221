use thiserror::Error;
use uuid::Uuid;

pub type KnexaResult<T> = Result<T, KnexaError>;

#[derive(Error, Debug)]
pub enum KnexaError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Non-finite input: {0}")]
    NonFinite(String),

    #[error("Invalid pair ({i}, {j}) for {n} participants")]
    InvalidPair { i: usize, j: usize, n: usize },

    #[error("Matchmaking session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl KnexaError {
    /// Fail-fast length check shared by every vector-consuming operation.
    pub fn check_dim(expected: usize, actual: usize) -> KnexaResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(KnexaError::DimensionMismatch { expected, actual })
        }
    }
}
