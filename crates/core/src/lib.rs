pub mod answer;
pub mod chunking;
pub mod corpus;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod ingest;
pub mod models;
pub mod service;
pub mod snapshot;
pub mod store;
pub mod traits;

pub use answer::{
    answer_question, build_context, Answer, ChatCompletionsComposer, ChatCompletionsConfig,
};
pub use chunking::{chunk_document, chunk_text, ChunkingConfig, TextChunk};
pub use corpus::Corpus;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbeddingModel, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{AnswerError, ErrorKind, RetrievalError};
pub use index::{Neighbor, VectorIndex};
pub use ingest::{prepare_documents, PreparedBatch};
pub use models::{
    IngestPolicy, IngestionReport, Passage, PassageFragment, RetrievalOptions, RetrievedPassage,
    SkippedItem, SnapshotStatus, SourceDocument,
};
pub use service::RetrievalService;
pub use snapshot::SnapshotInfo;
pub use store::{DocumentStore, PassageRecord};
pub use traits::AnswerComposer;
