use audiomatch_kv::KVError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VecError {
    #[error("vecstore: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("vecstore: duplicate id {0}")]
    DuplicateId(i64),

    #[error("vecstore: collection {0} is not indexed")]
    NotIndexed(String),

    #[error("vecstore: collection {0} not found")]
    CollectionNotFound(String),

    #[error("vecstore: collection {0} already exists with a different schema")]
    SchemaMismatch(String),

    #[error("vecstore: invalid schema: {0}")]
    InvalidSchema(String),

    #[error("vecstore: filename is {len} bytes, max {max}")]
    FilenameTooLong { len: usize, max: usize },

    #[error("vecstore: storage error: {0}")]
    Storage(String),

    #[error("vecstore: serialization error: {0}")]
    Serialization(String),
}

impl VecError {
    /// Reports whether the failure came from the storage backend and the
    /// operation may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VecError::Storage(_))
    }
}

impl From<KVError> for VecError {
    fn from(e: KVError) -> Self {
        VecError::Storage(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for VecError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        VecError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for VecError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        VecError::Serialization(e.to_string())
    }
}
