use crate::error::RetrievalError;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// A frozen text embedding model.
///
/// Implementations must be pure: the vector for a text depends only on the
/// text and the model, never on which other texts share the batch.
pub trait EmbeddingModel: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError>;
}

#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
    model_id: String,
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("char-trigram-fnv1a-{dimensions}"),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

impl EmbeddingModel for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

#[derive(Clone)]
pub struct Embedder {
    model: Arc<dyn EmbeddingModel>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            model,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn dimensions(&self) -> usize {
        self.model.dimensions()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn embed<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.iter().any(|text| text.as_ref().trim().is_empty()) {
            return Err(RetrievalError::EmptyText);
        }

        let texts: Vec<&str> = texts.iter().map(|text| text.as_ref()).collect();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embedded = self.model.embed_batch(batch)?;
            if embedded.len() != batch.len() {
                return Err(RetrievalError::EmbeddingCountMismatch {
                    expected: batch.len(),
                    actual: embedded.len(),
                });
            }
            if let Some(position) = embedded
                .iter()
                .position(|vector| vector.iter().any(|value| !value.is_finite()))
            {
                return Err(RetrievalError::Embedding(format!(
                    "non-finite value in the vector for text {}",
                    vectors.len() + position
                )));
            }
            vectors.extend(embedded);
        }

        debug!(
            model = self.model_id(),
            texts = texts.len(),
            batch_size = self.batch_size,
            "embedded texts"
        );
        Ok(vectors)
    }

    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut vectors = self.embed(&[text])?;
        vectors.pop().ok_or(RetrievalError::EmbeddingCountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedder")
            .field("model_id", &self.model_id())
            .field("dimensions", &self.dimensions())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        inner: CharacterNgramEmbedder,
        calls: AtomicUsize,
    }

    impl EmbeddingModel for CountingModel {
        fn model_id(&self) -> &str {
            self.inner.model_id()
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts)
        }
    }

    struct DroppingModel;

    impl EmbeddingModel for DroppingModel {
        fn model_id(&self) -> &str {
            "dropping"
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Ok(texts.iter().skip(1).map(|_| vec![0.0, 1.0]).collect())
        }
    }

    struct NanModel;

    impl EmbeddingModel for NanModel {
        fn model_id(&self) -> &str {
            "nan"
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            Ok(texts.iter().map(|_| vec![f32::NAN, 1.0]).collect())
        }
    }

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("Hydraulic pressure and flow");
        let second = embedder.embed("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder::new(32);
        let vector = embedder.embed("abc");
        assert_eq!(vector.len(), 32);
        assert_eq!(embedder.model_id(), "char-trigram-fnv1a-32");
    }

    #[test]
    fn batching_does_not_change_vectors_or_order() {
        let texts = ["alpha beta", "gamma delta", "epsilon zeta", "eta theta", "iota"];
        let model = Arc::new(CountingModel {
            inner: CharacterNgramEmbedder::default(),
            calls: AtomicUsize::new(0),
        });

        let unbatched = Embedder::new(model.clone())
            .with_batch_size(64)
            .embed(&texts)
            .unwrap();
        let batched = Embedder::new(model.clone())
            .with_batch_size(2)
            .embed(&texts)
            .unwrap();

        assert_eq!(unbatched, batched);
        assert_eq!(batched[1], CharacterNgramEmbedder::default().embed("gamma delta"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 1 + 3);
    }

    #[test]
    fn blank_text_is_rejected_before_the_model_runs() {
        let model = Arc::new(CountingModel {
            inner: CharacterNgramEmbedder::default(),
            calls: AtomicUsize::new(0),
        });
        let embedder = Embedder::new(model.clone());

        let result = embedder.embed(&["fine", "   "]);
        assert!(matches!(result, Err(RetrievalError::EmptyText)));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn short_model_output_is_a_consistency_error() {
        let embedder = Embedder::new(Arc::new(DroppingModel));
        let result = embedder.embed(&["one", "two"]);
        assert!(matches!(
            result,
            Err(RetrievalError::EmbeddingCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn non_finite_model_output_is_an_external_error() {
        let embedder = Embedder::new(Arc::new(NanModel));
        let error = embedder.embed(&["one"]).unwrap_err();
        assert!(matches!(error, RetrievalError::Embedding(_)));
        assert_eq!(error.kind(), crate::error::ErrorKind::External);
    }
}
