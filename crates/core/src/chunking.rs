use crate::error::RetrievalError;
use crate::models::PassageFragment;

pub const DEFAULT_CHUNK_SIZE: usize = 600;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, RetrievalError> {
        if chunk_size == 0 {
            return Err(RetrievalError::InvalidChunkConfig(
                "chunk_size must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(RetrievalError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk_size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub chunk_id: usize,
    pub offset: usize,
    pub text: String,
}

/// Splits `text` into windows of at most `chunk_size` characters.
///
/// A window ends at the last paragraph break in its back half if there is
/// one, else at the last sentence end, else after the last whitespace, else
/// at a hard cut. The next window starts `overlap` characters before the
/// previous one ended, so consecutive windows share exactly `overlap`
/// characters. Whitespace-only windows are dropped and `chunk_id` counts the
/// windows that are kept.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<TextChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + config.chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            find_break(&chars, start, hard_end, config)
        };

        let window: String = chars[start..end].iter().collect();
        if !window.trim().is_empty() {
            chunks.push(TextChunk {
                chunk_id: chunks.len(),
                offset: start,
                text: window,
            });
        }

        if end == total {
            break;
        }
        start = end - config.overlap;
    }

    chunks
}

pub fn chunk_document(source: &str, text: &str, config: ChunkingConfig) -> Vec<PassageFragment> {
    chunk_text(text, config)
        .into_iter()
        .map(|chunk| PassageFragment::new(source, chunk.chunk_id, chunk.text))
        .collect()
}

fn find_break(chars: &[char], start: usize, hard_end: usize, config: ChunkingConfig) -> usize {
    // Breaking before `floor` would make no progress past the overlap, or
    // produce a sliver of a window.
    let floor = start + config.overlap.max(config.chunk_size / 2);
    let candidates = || (floor + 1..=hard_end).rev();

    let paragraph = candidates()
        .find(|&end| end >= start + 2 && chars[end - 1] == '\n' && chars[end - 2] == '\n');
    if let Some(end) = paragraph {
        return end;
    }

    let sentence = candidates().find(|&end| {
        let last = chars[end - 1];
        let after_terminator = end >= start + 2 && matches!(chars[end - 2], '.' | '!' | '?');
        last == '\n' || (last.is_whitespace() && after_terminator)
    });
    if let Some(end) = sentence {
        return end;
    }

    candidates()
        .find(|&end| chars[end - 1].is_whitespace())
        .unwrap_or(hard_end)
}
