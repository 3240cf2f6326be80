use crate::corpus::Corpus;
use crate::error::RetrievalError;
use crate::index::VectorIndex;
use crate::store::{DocumentStore, PassageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;
pub const PASSAGES_FILE: &str = "passages.json";

const INDEX_PREFIX: &str = "index-";
const INDEX_SUFFIX: &str = ".bin";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PassageFile {
    format_version: u32,
    model_id: String,
    dimension: Option<usize>,
    saved_at: DateTime<Utc>,
    index_file: String,
    index_sha256: String,
    passages: Vec<PassageRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub dir: PathBuf,
    pub passages: usize,
    pub dimension: Option<usize>,
    pub saved_at: DateTime<Utc>,
}

pub fn save(dir: &Path, corpus: &Corpus, model_id: &str) -> Result<SnapshotInfo, RetrievalError> {
    corpus.check()?;
    fs::create_dir_all(dir)?;

    let index_bytes = corpus.index().to_bytes()?;
    let index_sha256 = digest(&index_bytes);
    let index_file = format!("{INDEX_PREFIX}{}{INDEX_SUFFIX}", &index_sha256[..16]);
    write_atomic(&dir.join(&index_file), &index_bytes)?;

    let saved_at = Utc::now();
    let passage_file = PassageFile {
        format_version: SNAPSHOT_FORMAT_VERSION,
        model_id: model_id.to_string(),
        dimension: corpus.dimension(),
        saved_at,
        index_file: index_file.clone(),
        index_sha256,
        passages: corpus.store().to_records(),
    };
    let passage_bytes = serde_json::to_vec_pretty(&passage_file)?;
    write_atomic(&dir.join(PASSAGES_FILE), &passage_bytes)?;

    for stale in index_files(dir)? {
        if stale.file_name().and_then(|name| name.to_str()) == Some(index_file.as_str()) {
            continue;
        }
        if let Err(error) = fs::remove_file(&stale) {
            warn!(path = %stale.display(), %error, "failed to remove stale index file");
        }
    }

    info!(
        dir = %dir.display(),
        passages = corpus.len(),
        index_file = %index_file,
        "snapshot saved"
    );

    Ok(SnapshotInfo {
        dir: dir.to_path_buf(),
        passages: corpus.len(),
        dimension: corpus.dimension(),
        saved_at,
    })
}

/// Reads the snapshot in `dir`.
///
/// Returns `Ok(None)` when there is no complete snapshot: neither artifact,
/// or only one of the two. A complete snapshot that cannot be used, for
/// example one written by another embedding model, is an error.
pub fn load(dir: &Path, model_id: &str) -> Result<Option<Corpus>, RetrievalError> {
    let passages_path = dir.join(PASSAGES_FILE);
    let passage_bytes = match fs::read(&passages_path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            if dir.is_dir() && !index_files(dir)?.is_empty() {
                warn!(dir = %dir.display(), "index file without passages, ignoring snapshot");
            }
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };

    let passage_file: PassageFile = serde_json::from_slice(&passage_bytes)?;
    if passage_file.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(RetrievalError::IncompatibleSnapshot(format!(
            "format version {} is not supported (expected {SNAPSHOT_FORMAT_VERSION})",
            passage_file.format_version
        )));
    }
    if passage_file.model_id != model_id {
        return Err(RetrievalError::ModelMismatch {
            expected: model_id.to_string(),
            found: passage_file.model_id,
        });
    }
    if !is_index_file_name(&passage_file.index_file) {
        return Err(RetrievalError::IncompatibleSnapshot(format!(
            "unexpected index file name {}",
            passage_file.index_file
        )));
    }

    let index_path = dir.join(&passage_file.index_file);
    let index_bytes = match fs::read(&index_path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            warn!(
                dir = %dir.display(),
                index_file = %passage_file.index_file,
                "passages without index file, ignoring snapshot"
            );
            return Ok(None);
        }
        Err(error) => return Err(error.into()),
    };

    if digest(&index_bytes) != passage_file.index_sha256 {
        return Err(RetrievalError::IncompatibleSnapshot(format!(
            "{} does not match the digest recorded in {PASSAGES_FILE}",
            passage_file.index_file
        )));
    }

    let index = VectorIndex::from_bytes(&index_bytes)?;
    if index.dimension() != passage_file.dimension {
        return Err(RetrievalError::IncompatibleSnapshot(format!(
            "index dimension {:?} differs from recorded dimension {:?}",
            index.dimension(),
            passage_file.dimension
        )));
    }
    let store = DocumentStore::from_records(passage_file.passages)?;
    let corpus = Corpus::from_parts(index, store)?;

    info!(
        dir = %dir.display(),
        passages = corpus.len(),
        saved_at = %passage_file.saved_at.to_rfc3339(),
        "snapshot loaded"
    );
    Ok(Some(corpus))
}

pub fn remove(dir: &Path) -> Result<(), RetrievalError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let mut targets = index_files(dir)?;
    targets.push(dir.join(PASSAGES_FILE));
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(TEMP_SUFFIX))
        {
            targets.push(path);
        }
    }

    for path in targets {
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed snapshot artifact"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }
    }
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RetrievalError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            RetrievalError::InvalidArgument(format!("path has no file name: {}", path.display()))
        })?;
    let temp_path = path.with_file_name(format!("{file_name}{TEMP_SUFFIX}"));

    let mut file = File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn index_files(dir: &Path) -> Result<Vec<PathBuf>, RetrievalError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_index = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_index_file_name);
        if is_index && path.is_file() {
            files.push(path);
        }
    }
    files.sort_unstable();
    Ok(files)
}

fn is_index_file_name(name: &str) -> bool {
    name.strip_prefix(INDEX_PREFIX)
        .and_then(|rest| rest.strip_suffix(INDEX_SUFFIX))
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
