use crate::error::RetrievalError;
use crate::models::{Passage, PassageFragment};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub text: String,
    pub source: String,
    pub chunk_id: usize,
}

impl From<&Passage> for PassageRecord {
    fn from(passage: &Passage) -> Self {
        Self {
            text: passage.text.clone(),
            source: passage.source.clone(),
            chunk_id: passage.chunk_id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    passages: Vec<Passage>,
    keys: HashSet<(String, usize)>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Result<&Passage, RetrievalError> {
        self.passages.get(ordinal).ok_or(RetrievalError::OutOfRange {
            ordinal,
            len: self.passages.len(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter()
    }

    pub fn contains(&self, source: &str, chunk_id: usize) -> bool {
        self.keys.contains(&(source.to_string(), chunk_id))
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.passages.iter().any(|passage| passage.source == source)
    }

    pub fn sources(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.passages
            .iter()
            .map(|passage| passage.source.as_str())
            .filter(|source| seen.insert(*source))
            .collect()
    }

    pub fn validate(&self, fragments: &[PassageFragment]) -> Result<(), RetrievalError> {
        let mut batch_keys = HashSet::new();
        for fragment in fragments {
            let key = (fragment.source.clone(), fragment.chunk_id);
            if self.keys.contains(&key) || !batch_keys.insert(key) {
                return Err(RetrievalError::DuplicatePassage {
                    source_name: fragment.source.clone(),
                    chunk_id: fragment.chunk_id,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn append(&mut self, fragments: Vec<PassageFragment>) -> std::ops::Range<usize> {
        let first = self.passages.len();
        for fragment in fragments {
            let ordinal = self.passages.len();
            self.keys.insert((fragment.source.clone(), fragment.chunk_id));
            self.passages.push(fragment.into_passage(ordinal));
        }
        first..self.passages.len()
    }

    pub fn to_records(&self) -> Vec<PassageRecord> {
        self.passages.iter().map(PassageRecord::from).collect()
    }

    pub fn from_records(records: Vec<PassageRecord>) -> Result<Self, RetrievalError> {
        let fragments: Vec<PassageFragment> = records
            .into_iter()
            .map(|record| PassageFragment::new(record.source, record.chunk_id, record.text))
            .collect();
        let mut store = Self::new();
        store.validate(&fragments).map_err(|error| {
            RetrievalError::IncompatibleSnapshot(format!("passage sequence: {error}"))
        })?;
        store.append(fragments);
        Ok(store)
    }
}
