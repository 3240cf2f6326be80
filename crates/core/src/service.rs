use crate::corpus::Corpus;
use crate::embeddings::{EmbeddingModel, Embedder};
use crate::error::RetrievalError;
use crate::ingest::{partition_blank, prepare_documents, PreparedBatch};
use crate::models::{
    IngestionReport, Passage, PassageFragment, RetrievalOptions, RetrievedPassage, SkippedItem,
    SnapshotStatus, SourceDocument,
};
use crate::snapshot::{self, SnapshotInfo};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug)]
pub struct RetrievalService {
    embedder: Embedder,
    options: RetrievalOptions,
    corpus: RwLock<Corpus>,
    // Held across snapshot file I/O. Taken before the corpus lock.
    snapshot_io: Mutex<()>,
}

impl RetrievalService {
    pub fn new(embedder: Embedder, options: RetrievalOptions) -> Self {
        let embedder = embedder.with_batch_size(options.embed_batch_size);
        Self {
            embedder,
            options,
            corpus: RwLock::new(Corpus::new()),
            snapshot_io: Mutex::new(()),
        }
    }

    pub fn with_model(model: Arc<dyn EmbeddingModel>, options: RetrievalOptions) -> Self {
        Self::new(Embedder::new(model), options)
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.read().dimension()
    }

    pub fn sources(&self) -> Vec<String> {
        self.read()
            .store()
            .sources()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.read().store().contains_source(source)
    }

    pub fn passage(&self, ordinal: usize) -> Result<Passage, RetrievalError> {
        self.read().store().get(ordinal).cloned()
    }

    pub fn add_documents(
        &self,
        fragments: Vec<PassageFragment>,
    ) -> Result<IngestionReport, RetrievalError> {
        if fragments.is_empty() {
            return Err(RetrievalError::EmptyBatch);
        }
        if fragments.iter().all(|fragment| fragment.text.trim().is_empty()) {
            return Err(RetrievalError::BlankBatch);
        }

        let batch = partition_blank(fragments, self.options.ingest_policy)?;
        let mut corpus = self.write();
        self.commit(&mut corpus, batch)
    }

    pub fn ingest_documents(
        &self,
        documents: &[SourceDocument],
    ) -> Result<IngestionReport, RetrievalError> {
        let mut corpus = self.write();
        let prepared = prepare_documents(
            documents,
            self.options.chunking,
            self.options.ingest_policy,
            |source| corpus.store().contains_source(source),
        )?;

        if prepared.fragments.is_empty() {
            info!(
                documents = documents.len(),
                skipped = prepared.skipped.len(),
                "no new passages to ingest"
            );
            return Ok(IngestionReport {
                added_passages: 0,
                ingested_sources: Vec::new(),
                skipped: prepared.skipped,
            });
        }

        self.commit(&mut corpus, prepared)
    }

    pub fn search(&self, question: &str, k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let corpus = self.read();
        if corpus.is_empty() {
            return Err(RetrievalError::IndexEmpty);
        }

        let query = self.embedder.embed_query(question)?;
        let hits = corpus.search(&query, k)?;
        debug!(k, hits = hits.len(), "search complete");
        Ok(hits)
    }

    pub fn search_default(&self, question: &str) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        self.search(question, self.options.default_top_k)
    }

    pub fn save(&self) -> Result<SnapshotInfo, RetrievalError> {
        let _io = self.snapshot_io();
        let corpus = self.read();
        snapshot::save(&self.options.snapshot_dir, &corpus, self.embedder.model_id())
    }

    /// Replaces the in-memory corpus with the snapshot on disk. With no
    /// complete snapshot the corpus becomes empty. On error it is left as it was.
    pub fn load(&self) -> Result<SnapshotStatus, RetrievalError> {
        let _io = self.snapshot_io();
        let loaded = snapshot::load(&self.options.snapshot_dir, self.embedder.model_id())?;
        let mut corpus = self.write();
        match loaded {
            Some(restored) => {
                let passages = restored.len();
                *corpus = restored;
                Ok(SnapshotStatus::Loaded { passages })
            }
            None => {
                *corpus = Corpus::new();
                Ok(SnapshotStatus::Missing)
            }
        }
    }

    pub fn clear(&self) {
        let mut corpus = self.write();
        let dropped = corpus.len();
        *corpus = Corpus::new();
        info!(dropped, "corpus cleared");
    }

    fn commit(
        &self,
        corpus: &mut Corpus,
        batch: PreparedBatch,
    ) -> Result<IngestionReport, RetrievalError> {
        let PreparedBatch { fragments, skipped } = batch;
        let sources = distinct_sources(&fragments);

        let texts: Vec<&str> = fragments.iter().map(|fragment| fragment.text.as_str()).collect();
        let vectors = self.embedder.embed(&texts)?;
        let ordinals = corpus.insert(fragments, vectors)?;

        info!(
            added = ordinals.len(),
            first_ordinal = ordinals.start,
            total = corpus.len(),
            skipped = skipped.len(),
            "passages committed"
        );
        Ok(report(ordinals.len(), sources, skipped))
    }

    fn read(&self) -> RwLockReadGuard<'_, Corpus> {
        self.corpus.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Corpus> {
        self.corpus.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_io(&self) -> MutexGuard<'_, ()> {
        self.snapshot_io.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn distinct_sources(fragments: &[PassageFragment]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for fragment in fragments {
        if !sources.contains(&fragment.source) {
            sources.push(fragment.source.clone());
        }
    }
    sources
}

fn report(added: usize, sources: Vec<String>, skipped: Vec<SkippedItem>) -> IngestionReport {
    IngestionReport {
        added_passages: added,
        ingested_sources: sources,
        skipped,
    }
}
