use crate::error::{QaError, Result};
use std::collections::VecDeque;

const DEFAULT_SEPARATOR: &str = "\n\n";

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits text on a separator and greedily packs the pieces into chunks of at
/// most `chunk_size` characters, carrying up to `chunk_overlap` characters of
/// trailing pieces into the next chunk.
#[derive(Debug, Clone)]
pub struct CharacterTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
    strip_whitespace: bool,
}

impl CharacterTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(QaError::InvalidConfiguration(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(QaError::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: DEFAULT_SEPARATOR.to_string(),
            strip_whitespace: true,
        })
    }

    /// An empty separator splits into single characters.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_strip_whitespace(mut self, strip_whitespace: bool) -> Self {
        self.strip_whitespace = strip_whitespace;
        self
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let splits: Vec<String> = if self.separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(self.separator.as_str())
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut pieces = Vec::with_capacity(splits.len());
        for split in splits {
            let len = char_len(&split);
            if len > self.chunk_size {
                log::warn!(
                    "Piece of size {} is longer than chunk_size {}, cutting it",
                    len,
                    self.chunk_size
                );
                pieces.extend(self.hard_cut(&split));
            } else {
                pieces.push(split);
            }
        }

        let chunks = self.merge_splits(&pieces);
        log::debug!("Split {} chars into {} chunks", char_len(text), chunks.len());
        chunks
    }

    fn hard_cut(&self, piece: &str) -> Vec<String> {
        let chars: Vec<char> = piece.chars().collect();
        let stride = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            windows.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += stride;
        }
        windows
    }

    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let separator_len = char_len(&self.separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joiner = |current: &VecDeque<(&str, usize)>| {
                if current.is_empty() {
                    0
                } else {
                    separator_len
                }
            };

            if total + len + joiner(&current) > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = self.join(&current) {
                    chunks.push(chunk);
                }
                // Keep only a tail of at most chunk_overlap that still leaves room for this split.
                while total > self.chunk_overlap
                    || (total + len + joiner(&current) > self.chunk_size && total > 0)
                {
                    let Some((_, first_len)) = current.pop_front() else {
                        break;
                    };
                    total -= first_len + joiner(&current);
                }
            }

            current.push_back((split.as_str(), len));
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(chunk) = self.join(&current) {
            chunks.push(chunk);
        }
        chunks
    }

    fn join(&self, pieces: &VecDeque<(&str, usize)>) -> Option<String> {
        let joined = pieces
            .iter()
            .map(|(piece, _)| *piece)
            .collect::<Vec<_>>()
            .join(self.separator.as_str());
        let joined = if self.strip_whitespace {
            joined.trim().to_string()
        } else {
            joined
        };
        (!joined.is_empty()).then_some(joined)
    }
}
