use crate::error::RetrievalError;
use crate::index::VectorIndex;
use crate::models::{PassageFragment, RetrievedPassage};
use crate::store::DocumentStore;
use std::ops::Range;

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    index: VectorIndex,
    store: DocumentStore,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(index: VectorIndex, store: DocumentStore) -> Result<Self, RetrievalError> {
        let corpus = Self { index, store };
        corpus.check()?;
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.index.dimension()
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Commits `fragments` and their `vectors` together and returns the
    /// ordinals they were assigned. Nothing is written if any check fails.
    pub fn insert(
        &mut self,
        fragments: Vec<PassageFragment>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Range<usize>, RetrievalError> {
        if fragments.len() != vectors.len() {
            return Err(RetrievalError::EmbeddingCountMismatch {
                expected: fragments.len(),
                actual: vectors.len(),
            });
        }
        self.check()?;
        self.store.validate(&fragments)?;
        self.index.validate(&vectors)?;

        self.index.add(&vectors)?;
        let ordinals = self.store.append(fragments);
        self.check()?;
        Ok(ordinals)
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        if self.store.is_empty() {
            return Err(RetrievalError::IndexEmpty);
        }
        self.index
            .search(query, k)?
            .into_iter()
            .map(|neighbor| {
                Ok(RetrievedPassage {
                    passage: self.store.get(neighbor.ordinal)?.clone(),
                    distance: neighbor.distance,
                })
            })
            .collect()
    }

    pub fn check(&self) -> Result<(), RetrievalError> {
        if self.index.len() != self.store.len() {
            return Err(RetrievalError::LengthDivergence {
                vectors: self.index.len(),
                passages: self.store.len(),
            });
        }
        Ok(())
    }
}
