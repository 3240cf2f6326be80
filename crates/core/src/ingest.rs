use crate::chunking::{chunk_document, ChunkingConfig};
use crate::error::RetrievalError;
use crate::models::{IngestPolicy, PassageFragment, SkippedItem, SourceDocument};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreparedBatch {
    pub fragments: Vec<PassageFragment>,
    pub skipped: Vec<SkippedItem>,
}

pub fn prepare_documents<F>(
    documents: &[SourceDocument],
    config: ChunkingConfig,
    policy: IngestPolicy,
    is_stored: F,
) -> Result<PreparedBatch, RetrievalError>
where
    F: Fn(&str) -> bool,
{
    if documents.is_empty() {
        return Err(RetrievalError::EmptyBatch);
    }

    let mut batch = PreparedBatch::default();
    let mut seen = HashSet::new();

    for document in documents {
        let source = document.source.trim();
        if source.is_empty() {
            let error = RetrievalError::InvalidArgument("document has no source name".to_string());
            skip_or_fail(&mut batch, policy, &document.source, None, error)?;
            continue;
        }

        if is_stored(source) || !seen.insert(source.to_string()) {
            warn!(source, "document already ingested, skipping");
            batch.skipped.push(SkippedItem {
                source: source.to_string(),
                chunk_id: None,
                reason: "already ingested".to_string(),
            });
            continue;
        }

        let fragments = chunk_document(source, &document.text, config);
        if fragments.is_empty() {
            let error = RetrievalError::EmptyDocument {
                source_name: source.to_string(),
            };
            skip_or_fail(&mut batch, policy, source, None, error)?;
            continue;
        }

        batch.fragments.extend(fragments);
    }

    Ok(batch)
}

pub fn partition_blank(
    fragments: Vec<PassageFragment>,
    policy: IngestPolicy,
) -> Result<PreparedBatch, RetrievalError> {
    let mut batch = PreparedBatch::default();
    for fragment in fragments {
        if !fragment.text.trim().is_empty() {
            batch.fragments.push(fragment);
            continue;
        }
        let error = RetrievalError::BlankPassage {
            source_name: fragment.source.clone(),
            chunk_id: fragment.chunk_id,
        };
        skip_or_fail(
            &mut batch,
            policy,
            &fragment.source,
            Some(fragment.chunk_id),
            error,
        )?;
    }
    Ok(batch)
}

fn skip_or_fail(
    batch: &mut PreparedBatch,
    policy: IngestPolicy,
    source: &str,
    chunk_id: Option<usize>,
    error: RetrievalError,
) -> Result<(), RetrievalError> {
    match policy {
        IngestPolicy::Strict => Err(error),
        IngestPolicy::BestEffort => {
            warn!(source, ?chunk_id, reason = %error, "skipping unusable input");
            batch.skipped.push(SkippedItem {
                source: source.to_string(),
                chunk_id,
                reason: error.to_string(),
            });
            Ok(())
        }
    }
}
