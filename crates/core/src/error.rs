use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Consistency,
    State,
    Storage,
    External,
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("text is empty")]
    EmptyText,

    #[error("document batch is empty")]
    EmptyBatch,

    #[error("every passage in the batch is blank")]
    BlankBatch,

    #[error("document {source_name} has no readable text")]
    EmptyDocument { source_name: String },

    #[error("passage {chunk_id} of {source_name} is blank")]
    BlankPassage { source_name: String, chunk_id: usize },

    #[error("passage {chunk_id} of {source_name} is already stored")]
    DuplicatePassage { source_name: String, chunk_id: usize },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("embedding dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding model returned {actual} vectors for {expected} texts")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error("index holds {vectors} vectors but store holds {passages} passages")]
    LengthDivergence { vectors: usize, passages: usize },

    #[error("snapshot was built with model {found}, service uses {expected}")]
    ModelMismatch { expected: String, found: String },

    #[error("index is empty")]
    IndexEmpty,

    #[error("ordinal {ordinal} is out of range (store holds {len} passages)")]
    OutOfRange { ordinal: usize, len: usize },

    #[error("incompatible snapshot: {0}")]
    IncompatibleSnapshot(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("index encoding error: {0}")]
    IndexEncoding(#[from] bincode::Error),

    #[error("embedding model failed: {0}")]
    Embedding(String),
}

impl RetrievalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyText
            | Self::EmptyBatch
            | Self::BlankBatch
            | Self::EmptyDocument { .. }
            | Self::BlankPassage { .. }
            | Self::DuplicatePassage { .. }
            | Self::InvalidChunkConfig(_)
            | Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::DimensionMismatch { .. }
            | Self::EmbeddingCountMismatch { .. }
            | Self::LengthDivergence { .. }
            | Self::ModelMismatch { .. } => ErrorKind::Consistency,
            Self::IndexEmpty | Self::OutOfRange { .. } => ErrorKind::State,
            Self::IncompatibleSnapshot(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::IndexEncoding(_) => ErrorKind::Storage,
            Self::Embedding(_) => ErrorKind::External,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, RetrievalError};

    #[test]
    fn empty_index_is_a_state_error_not_a_validation_error() {
        assert_eq!(RetrievalError::IndexEmpty.kind(), ErrorKind::State);
        assert_eq!(RetrievalError::EmptyBatch.kind(), ErrorKind::Validation);
        assert_ne!(
            RetrievalError::IndexEmpty.kind(),
            RetrievalError::EmptyBatch.kind()
        );
    }

    #[test]
    fn model_failure_is_an_external_error() {
        let error = RetrievalError::Embedding("backend unavailable".to_string());
        assert_eq!(error.kind(), ErrorKind::External);
    }

    #[test]
    fn dimension_mismatch_is_a_consistency_error() {
        let error = RetrievalError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(error.kind(), ErrorKind::Consistency);
        assert_eq!(
            error.to_string(),
            "embedding dimension 3 does not match index dimension 4"
        );
    }
}
