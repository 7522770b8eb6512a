use audiomatch_embed::EmbedError;
use audiomatch_vecstore::VecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine: embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    #[error("engine: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("engine: id {0} already exists")]
    DuplicateId(i64),

    #[error("engine: invalid id {0:?}: must be a 64-bit integer")]
    InvalidId(String),

    #[error("engine: collection {0} is not indexed")]
    NotIndexed(String),

    #[error("engine: collection unavailable: {0}")]
    CollectionUnavailable(String),

    #[error("engine: schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("engine: invalid record: {0}")]
    InvalidRecord(String),

    #[error("engine: blob store: {0}")]
    Blob(String),

    #[error("engine: background task failed: {0}")]
    Worker(String),
}

impl EngineError {
    /// Transient storage trouble worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::CollectionUnavailable(_))
    }

    /// Errors caused by the caller's input rather than the engine. A
    /// dimension mismatch means the embedder disagrees with the configured
    /// collections, so it is not one.
    pub fn is_input_error(&self) -> bool {
        match self {
            EngineError::Embedding(e) => e.is_input(),
            EngineError::InvalidId(_) | EngineError::InvalidRecord(_) => true,
            _ => false,
        }
    }
}

impl From<VecError> for EngineError {
    fn from(e: VecError) -> Self {
        match e {
            VecError::DimensionMismatch { got, want } => {
                EngineError::DimensionMismatch { got, want }
            }
            VecError::DuplicateId(id) => EngineError::DuplicateId(id),
            VecError::NotIndexed(name) => EngineError::NotIndexed(name),
            VecError::CollectionNotFound(name) => {
                EngineError::CollectionUnavailable(format!("{name} was dropped"))
            }
            VecError::SchemaMismatch(name) => EngineError::SchemaMismatch(format!(
                "collection {name} exists with a different schema"
            )),
            VecError::InvalidSchema(msg) => EngineError::SchemaMismatch(msg),
            e @ VecError::FilenameTooLong { .. } => EngineError::InvalidRecord(e.to_string()),
            e @ (VecError::Storage(_) | VecError::Serialization(_)) => {
                EngineError::CollectionUnavailable(e.to_string())
            }
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Blob(e.to_string())
    }
}
