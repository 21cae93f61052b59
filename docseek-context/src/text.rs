//! Fixed-size overlapping window chunking for extracted document text.
//!
//! Text is split into windows of at most `chunk_size` characters. Window `i`
//! starts at character offset `i * (chunk_size - overlap)`, so consecutive
//! windows share exactly `overlap` characters, except that the final window may
//! be shorter. Offsets and lengths are counted in Unicode scalar values, never
//! bytes, so multi-byte text is never cut inside a character.

use serde::Serialize;

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters shared by consecutive windows.
pub const DEFAULT_OVERLAP: usize = 200;

/// Errors raised when a window configuration cannot produce chunks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkerError {
    /// A window of zero characters never advances.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// The window would never advance past its own start.
    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// A single window of text cut from a document, along with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Label of the document the chunk was cut from (usually its file name).
    pub source: String,
    /// The sequence number of this chunk within the document (0-indexed).
    pub sequence: usize,
    /// Character offset of the first character of this chunk in the document text.
    pub start: usize,
    /// The text content of this specific chunk.
    pub chunk_text: String,
}

/// Splits text into fixed-size, overlapping windows.
///
/// The chunker is a pure value: it holds only the validated window geometry and
/// can be shared freely between tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowChunker {
    chunk_size: usize,
    overlap: usize,
}

impl WindowChunker {
    /// Creates a chunker with the given window size and overlap.
    ///
    /// # Arguments
    ///
    /// *   `chunk_size` - Maximum length of each chunk in characters.
    /// *   `overlap` - Number of characters shared by consecutive chunks.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkerError`] if `chunk_size` is zero or `overlap >= chunk_size`.
    ///
    /// # Examples
    ///
    /// ```
    /// use docseek_context::text::WindowChunker;
    ///
    /// let chunker = WindowChunker::new(10, 4).unwrap();
    /// assert_eq!(chunker.step(), 6);
    ///
    /// assert!(WindowChunker::new(10, 10).is_err());
    /// ```
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkerError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Creates a chunker with [`DEFAULT_CHUNK_SIZE`] and [`DEFAULT_OVERLAP`].
    pub fn with_defaults() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance in characters between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Splits `text` into window strings.
    ///
    /// Returns an empty vector only when `text` is empty. Chunking stops once the
    /// next start offset reaches the text length, so a trailing window may lie
    /// entirely inside its predecessor's overlap.
    ///
    /// # Examples
    ///
    /// ```
    /// use docseek_context::text::WindowChunker;
    ///
    /// let chunker = WindowChunker::new(4, 1).unwrap();
    /// assert_eq!(chunker.split("abcdefghij"), vec!["abcd", "defg", "ghij", "j"]);
    /// assert!(chunker.split("").is_empty());
    /// ```
    pub fn split(&self, text: &str) -> Vec<String> {
        self.windows(text)
            .into_iter()
            .map(|(_, slice)| slice.to_string())
            .collect()
    }

    /// Splits `text` into [`TextChunk`]s labelled with `source`.
    ///
    /// # Arguments
    ///
    /// *   `source` - Label recorded on every chunk, typically the document file name.
    /// *   `text` - The full extracted text of the document.
    ///
    /// # Examples
    ///
    /// ```
    /// use docseek_context::text::WindowChunker;
    ///
    /// let chunker = WindowChunker::new(5, 2).unwrap();
    /// let chunks = chunker.get_chunks("notes.pdf", "integrals and limits");
    ///
    /// assert_eq!(chunks[0].source, "notes.pdf");
    /// assert_eq!(chunks[0].chunk_text, "integ");
    /// assert_eq!(chunks[1].start, 3);
    /// assert_eq!(chunks[1].chunk_text, "egral");
    /// assert!(chunks.iter().all(|c| c.chunk_text.chars().count() <= 5));
    /// ```
    pub fn get_chunks(&self, source: &str, text: &str) -> Vec<TextChunk> {
        self.windows(text)
            .into_iter()
            .enumerate()
            .map(|(sequence, (start, slice))| TextChunk {
                source: source.to_string(),
                sequence,
                start,
                chunk_text: slice.to_string(),
            })
            .collect()
    }

    // Returns (char offset, slice) pairs. Byte boundaries are looked up once so
    // every window is a borrowed slice of the input.
    fn windows<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut windows = Vec::with_capacity(char_count.div_ceil(self.step()));
        let mut start = 0;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            windows.push((start, &text[boundaries[start]..boundaries[end]]));
            start += self.step();
        }
        windows
    }
}

impl Default for WindowChunker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Convenience wrapper that validates the window and splits `text` in one call.
///
/// # Examples
///
/// ```
/// use docseek_context::chunk_text;
///
/// let chunks = chunk_text("derivatives and integrals", 10, 3).unwrap();
/// assert_eq!(chunks[0], "derivative");
/// assert_eq!(chunks[1], "ives and i");
/// ```
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, ChunkerError> {
    Ok(WindowChunker::new(chunk_size, overlap)?.split(text))
}
