use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embed: empty input")]
    EmptyInput,

    #[error("embed: invalid audio: {0}")]
    InvalidAudio(String),

    #[error("embed: unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("embed: clip too short: need {min_samples} samples at 16 kHz, got {got}")]
    TooShort { min_samples: usize, got: usize },

    #[error("embed: resample: {0}")]
    Resample(String),

    #[error("embed: API error: {0}")]
    Api(String),

    #[error("embed: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("embed: worker: {0}")]
    Worker(String),
}

impl EmbedError {
    /// True when the clip itself is unusable, as opposed to a failure of
    /// the embedder.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            EmbedError::EmptyInput
                | EmbedError::InvalidAudio(_)
                | EmbedError::UnsupportedFormat(_)
                | EmbedError::TooShort { .. }
        )
    }
}

impl From<rubato::ResamplerConstructionError> for EmbedError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        EmbedError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for EmbedError {
    fn from(e: rubato::ResampleError) -> Self {
        EmbedError::Resample(e.to_string())
    }
}

impl From<reqwest::Error> for EmbedError {
    fn from(e: reqwest::Error) -> Self {
        EmbedError::Api(e.to_string())
    }
}
