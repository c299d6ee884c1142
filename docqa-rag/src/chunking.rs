//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text on a priority list of separators (paragraphs, lines, words and
//! finally single characters) and merges the pieces back into overlapping
//! chunks of bounded size.

use std::collections::VecDeque;

use crate::config::{DEFAULT_SEPARATORS, RagConfig};
use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// A chunk of text and the byte offset where it starts in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Byte offset of `text` in the text that was split.
    pub start: usize,
    /// The chunk text.
    pub text: String,
}

/// Splits text recursively by a priority list of separators.
///
/// The first separator that occurs in the text is used to cut it into
/// pieces, each separator staying attached to the start of the piece that
/// follows it. Pieces shorter than `chunk_size` are merged greedily; when a
/// chunk is full, a tail of its pieces totalling at most `chunk_overlap`
/// characters is carried into the next one. Pieces of `chunk_size` or more
/// are split again with the remaining separators. An empty separator splits
/// between characters, so with `""` in the list no chunk exceeds
/// `chunk_size`.
///
/// Sizes are counted in `char`s. Chunk IDs are generated as
/// `{document_id}_{chunk_index}`; each chunk inherits the parent document's
/// metadata plus `chunk_index` and `start_index` fields.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(750, 80);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
    strip_whitespace: bool,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separators
    /// (`"\n\n"`, `"\n"`, `" "`, `""`).
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: maximum number of characters shared by consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            strip_whitespace: true,
        }
    }

    /// Create a chunker from the chunking fields of a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
            .with_separators(config.separators.iter().cloned())
    }

    /// Replace the separator priority list.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Whether merged chunks are trimmed of surrounding whitespace (default `true`).
    ///
    /// With trimming disabled the chunks tile the source text exactly.
    pub fn with_strip_whitespace(mut self, strip: bool) -> Self {
        self.strip_whitespace = strip;
        self
    }

    /// Split raw text into spans.
    pub fn split_text(&self, text: &str) -> Vec<TextSpan> {
        let mut spans = Vec::new();
        if !text.is_empty() {
            self.split_recursive(text, 0, &self.separators, &mut spans);
        }
        spans
    }

    fn split_recursive(
        &self,
        text: &str,
        base: usize,
        separators: &[String],
        out: &mut Vec<TextSpan>,
    ) {
        let (separator, remaining) = pick_separator(text, separators);
        let pieces = split_keeping_separator(text, base, separator);

        let mut mergeable: Vec<Piece<'_>> = Vec::new();
        for piece in pieces {
            if piece.chars < self.chunk_size {
                mergeable.push(piece);
                continue;
            }

            if !mergeable.is_empty() {
                self.merge_pieces(&mergeable, out);
                mergeable.clear();
            }

            if remaining.is_empty() {
                out.push(TextSpan { start: piece.start, text: piece.text.to_string() });
            } else {
                self.split_recursive(piece.text, piece.start, remaining, out);
            }
        }

        if !mergeable.is_empty() {
            self.merge_pieces(&mergeable, out);
        }
    }

    /// Greedily merge small pieces into chunks, keeping an overlapping tail.
    fn merge_pieces(&self, pieces: &[Piece<'_>], out: &mut Vec<TextSpan>) {
        let mut window: VecDeque<Piece<'_>> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            if total + piece.chars > self.chunk_size && !window.is_empty() {
                if let Some(span) = self.join(&window) {
                    out.push(span);
                }
                while total > self.chunk_overlap
                    || (total + piece.chars > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= front.chars,
                        None => break,
                    }
                }
            }
            window.push_back(*piece);
            total += piece.chars;
        }

        if let Some(span) = self.join(&window) {
            out.push(span);
        }
    }

    fn join(&self, window: &VecDeque<Piece<'_>>) -> Option<TextSpan> {
        let first = window.front()?;
        let joined: String = window.iter().map(|p| p.text).collect();
        let (start, text) = if self.strip_whitespace {
            let leading = joined.len() - joined.trim_start().len();
            (first.start + leading, joined.trim().to_string())
        } else {
            (first.start, joined)
        };
        if text.is_empty() { None } else { Some(TextSpan { start, text }) }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, span)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.to_string());
                metadata.insert("start_index".to_string(), span.start.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text: span.text,
                    start_index: span.start,
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}

/// A slice of the source text with its absolute byte offset and char count.
#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    start: usize,
    text: &'a str,
    chars: usize,
}

/// Pick the first separator present in `text`, returning it with the
/// separators that follow it. An empty separator always matches and ends
/// the recursion; if nothing matches, the last separator is used.
fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[i + 1..]);
        }
    }
    (separators.last().map(String::as_str).unwrap_or(""), &[])
}

/// Split at every occurrence of `separator`, keeping the separator at the
/// start of the following piece. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, base: usize, separator: &str) -> Vec<Piece<'a>> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| Piece { start: base + i, text: &text[i..i + c.len_utf8()], chars: 1 })
            .collect();
    }

    let mut bounds = vec![0];
    bounds.extend(text.match_indices(separator).map(|(i, _)| i).filter(|&i| i != 0));
    bounds.push(text.len());

    bounds
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| {
            let slice = &text[w[0]..w[1]];
            Piece { start: base + w[0], text: slice, chars: slice.chars().count() }
        })
        .collect()
}
