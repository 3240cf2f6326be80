use docqa_core::{IngestPolicy, SourceDocument};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "text"];

pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

pub struct LoadedDocuments {
    pub documents: Vec<SourceDocument>,
    pub skipped_files: Vec<SkippedFile>,
}

pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                TEXT_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if is_text {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Reads every file in `paths`, descending into directories. Under
/// [`IngestPolicy::Strict`] the first unreadable file is an error.
pub fn load_documents(paths: &[PathBuf], policy: IngestPolicy) -> anyhow::Result<LoadedDocuments> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_text_files(path));
        } else {
            files.push(path.clone());
        }
    }

    if files.is_empty() {
        anyhow::bail!("no text documents found in the given paths");
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        match read_document(&path) {
            Ok(document) => documents.push(document),
            Err(error) if policy == IngestPolicy::BestEffort => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                skipped_files.push(SkippedFile {
                    path,
                    reason: error.to_string(),
                });
            }
            Err(error) => return Err(error.context(format!("failed to read {}", path.display()))),
        }
    }

    Ok(LoadedDocuments {
        documents,
        skipped_files,
    })
}

// The source is the path as given or discovered, so same-named files in
// different folders stay distinct.
fn read_document(path: &Path) -> anyhow::Result<SourceDocument> {
    let name = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("path is not valid UTF-8: {}", path.display()))?;
    let text = fs::read_to_string(path)?;
    Ok(SourceDocument::new(name, text.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use docqa_core::{CharacterNgramEmbedder, RetrievalOptions, RetrievalService};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn discover_text_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;

        File::create(dir.path().join("a.txt")).and_then(|mut file| file.write_all(b"alpha"))?;
        File::create(nested.join("b.MD")).and_then(|mut file| file.write_all(b"beta"))?;
        File::create(nested.join("c.pdf")).and_then(|mut file| file.write_all(b"%PDF"))?;

        let files = discover_text_files(dir.path());
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn documents_are_named_after_their_path() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("report.txt");
        fs::write(&path, "  Paris is the capital of France.\n")?;

        let loaded = load_documents(&[path.clone()], IngestPolicy::Strict)?;
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(Path::new(&loaded.documents[0].source), path.as_path());
        assert_eq!(loaded.documents[0].text, "Paris is the capital of France.");
        Ok(())
    }

    #[test]
    fn same_named_files_in_sibling_folders_stay_distinct() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("a"))?;
        fs::create_dir(dir.path().join("b"))?;
        fs::write(dir.path().join("a").join("notes.txt"), "pump notes")?;
        fs::write(dir.path().join("b").join("notes.txt"), "valve notes")?;

        let loaded = load_documents(&[dir.path().to_path_buf()], IngestPolicy::Strict)?;
        assert_eq!(loaded.documents.len(), 2);
        assert_ne!(loaded.documents[0].source, loaded.documents[1].source);

        let service = RetrievalService::with_model(
            Arc::new(CharacterNgramEmbedder::default()),
            RetrievalOptions::default(),
        );
        let report = service.ingest_documents(&loaded.documents)?;
        assert_eq!(report.ingested_sources.len(), 2);
        assert!(report.skipped.is_empty());
        Ok(())
    }

    #[test]
    fn best_effort_skips_invalid_utf8() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("good.txt"), "fine")?;
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00])?;

        let paths = vec![dir.path().to_path_buf()];
        let loaded = load_documents(&paths, IngestPolicy::BestEffort)?;
        assert_eq!(loaded.documents.len(), 1);
        assert_eq!(loaded.skipped_files.len(), 1);

        assert!(load_documents(&paths, IngestPolicy::Strict).is_err());
        Ok(())
    }

    #[test]
    fn empty_folder_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(load_documents(&[dir.path().to_path_buf()], IngestPolicy::BestEffort).is_err());
        Ok(())
    }
}
