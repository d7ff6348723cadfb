//! Recursive separator-based text segmentation.
//!
//! Text is split on the largest separator present (paragraph, then line, then word). Pieces
//! that fit are merged greedily up to `chunk_size` characters; each new chunk re-uses the
//! trailing pieces of the previous one, up to `overlap` characters. Pieces with no smaller
//! separator left are emitted whole, even when they exceed `chunk_size`.
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId, DocumentText};

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

#[derive(Debug, Clone)]
pub struct Segmenter {
    chunk_size: usize,
    overlap: usize,
}

impl Segmenter {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_size ({}) must be greater than overlap ({})",
                chunk_size, overlap
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }
    pub fn overlap(&self) -> usize { self.overlap }

    /// Segment one text. Ids start at `first_id`; `source` is attached to every chunk.
    pub fn segment_from(&self, text: &str, first_id: ChunkId, source: Option<&str>) -> Vec<Chunk> {
        let mut spans = Vec::new();
        self.split(text, Span { start: 0, end: text.len() }, 0, &mut spans);
        let mut next_id = first_id;
        let mut chunks = Vec::with_capacity(spans.len());
        for span in spans {
            let raw = &text[span.start..span.end];
            let trimmed = raw.trim();
            if trimmed.is_empty() { continue; }
            let leading = raw.len() - raw.trim_start().len();
            chunks.push(Chunk {
                id: next_id,
                text: trimmed.to_string(),
                source_offset: Some(span.start + leading),
                source: source.map(str::to_string),
            });
            next_id += 1;
        }
        chunks
    }

    pub fn segment(&self, text: &str) -> Vec<Chunk> {
        self.segment_from(text, 0, None)
    }

    /// Segment every document independently, numbering chunks consecutively across them.
    pub fn segment_documents(&self, docs: &[DocumentText]) -> Vec<Chunk> {
        let mut all_chunks = Vec::new();
        for doc in docs {
            let first_id = all_chunks.len() as ChunkId;
            let chunks = self.segment_from(&doc.text, first_id, Some(&doc.name));
            tracing::debug!(document = %doc.name, chunks = chunks.len(), "segmented document");
            all_chunks.extend(chunks);
        }
        all_chunks
    }

    fn split(&self, text: &str, span: Span, level: usize, out: &mut Vec<Span>) {
        let slice = &text[span.start..span.end];
        let found = SEPARATORS[level..].iter().position(|sep| slice.contains(sep));
        let Some(offset) = found else {
            out.push(span);
            return;
        };
        let separator = SEPARATORS[level + offset];
        let next_level = level + offset + 1;

        let mut fitting = Vec::new();
        for piece in split_keeping_separator(slice, separator, span.start) {
            if char_len(text, piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            self.merge(text, &mut fitting, out);
            if next_level < SEPARATORS.len() {
                self.split(text, piece, next_level, out);
            } else {
                out.push(piece);
            }
        }
        self.merge(text, &mut fitting, out);
    }

    /// Greedily merge contiguous pieces into windows of at most `chunk_size` characters.
    fn merge(&self, text: &str, pieces: &mut Vec<Span>, out: &mut Vec<Span>) {
        let mut window: VecDeque<(Span, usize)> = VecDeque::new();
        let mut total = 0usize;
        for piece in pieces.drain(..) {
            let len = char_len(text, piece);
            if total + len > self.chunk_size {
                if let Some(span) = window_span(&window) { out.push(span); }
                while let Some(&(_, front_len)) = window.front() {
                    if total > self.overlap || total + len > self.chunk_size {
                        window.pop_front();
                        total -= front_len;
                    } else {
                        break;
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        if let Some(span) = window_span(&window) { out.push(span); }
    }
}

/// Convenience wrapper matching `segment(text, chunkSize, overlap)`.
pub fn segment(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Segmenter::new(chunk_size, overlap)?.segment(text))
}

fn char_len(text: &str, span: Span) -> usize {
    text[span.start..span.end].chars().count()
}

fn window_span(window: &VecDeque<(Span, usize)>) -> Option<Span> {
    let first = window.front()?.0;
    let last = window.back()?.0;
    Some(Span { start: first.start, end: last.end })
}

/// Split `slice` before every occurrence of `separator`; the separator stays at the start of
/// the following piece so the pieces tile the slice exactly.
fn split_keeping_separator(slice: &str, separator: &str, base: usize) -> Vec<Span> {
    let mut pieces = Vec::new();
    let mut last = 0usize;
    for (idx, _) in slice.match_indices(separator) {
        if idx > last {
            pieces.push(Span { start: base + last, end: base + idx });
            last = idx;
        }
    }
    if last < slice.len() {
        pieces.push(Span { start: base + last, end: base + slice.len() });
    }
    pieces
}
