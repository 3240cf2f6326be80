use crate::chunking::ChunkingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub ordinal: usize,
    pub text: String,
    pub source: String,
    pub chunk_id: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageFragment {
    pub text: String,
    pub source: String,
    pub chunk_id: usize,
}

impl PassageFragment {
    pub fn new(source: impl Into<String>, chunk_id: usize, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            chunk_id,
        }
    }

    pub(crate) fn into_passage(self, ordinal: usize) -> Passage {
        Passage {
            ordinal,
            text: self.text,
            source: self.source,
            chunk_id: self.chunk_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub passage: Passage,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestPolicy {
    #[default]
    Strict,
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub chunking: ChunkingConfig,
    pub default_top_k: usize,
    pub embed_batch_size: usize,
    pub snapshot_dir: PathBuf,
    pub ingest_policy: IngestPolicy,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            default_top_k: 3,
            embed_batch_size: 32,
            snapshot_dir: PathBuf::from(".docqa"),
            ingest_policy: IngestPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub source: String,
    pub chunk_id: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub added_passages: usize,
    pub ingested_sources: Vec<String>,
    pub skipped: Vec<SkippedItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStatus {
    Loaded { passages: usize },
    Missing,
}
