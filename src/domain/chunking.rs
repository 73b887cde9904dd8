//! Splits extracted text blocks into overlapping chunks bounded by
//! `max_size`, preferring natural boundaries over hard cuts.

use uuid::Uuid;

use crate::domain::{ChunkMetadata, DocumentChunk, DomainError, Result, TextBlock};

/// Boundary patterns in priority order: paragraph, newline, sentence, word.
/// A hard character cut is the fallback when none of these land late enough
/// in the window.
const BOUNDARIES: [&[char]; 4] = [&['\n', '\n'], &['\n'], &['.', ' '], &[' ']];

/// Split `blocks` into chunks of at most `max_size` characters, each chunk
/// after the first overlapping its predecessor by at most `overlap`
/// characters. Overlap never crosses a block boundary. Deterministic; blocks
/// containing only whitespace contribute nothing.
pub fn split_blocks(
    document_id: Uuid,
    blocks: &[TextBlock],
    max_size: usize,
    overlap: usize,
) -> Result<Vec<DocumentChunk>> {
    if max_size == 0 {
        return Err(DomainError::configuration("chunk size must be positive"));
    }
    if overlap >= max_size {
        return Err(DomainError::configuration(format!(
            "chunk overlap ({overlap}) must be smaller than chunk size ({max_size})"
        )));
    }

    let mut chunks = Vec::new();
    for block in blocks {
        if block.text.trim().is_empty() {
            continue;
        }
        let metadata = ChunkMetadata::from_block(block);
        for piece in split_text(&block.text, max_size, overlap) {
            let index = chunks.len();
            chunks.push(
                DocumentChunk::new(document_id, piece, index).with_metadata(metadata.clone()),
            );
        }
    }

    Ok(chunks)
}

/// Window over the text in character units, breaking each window at the
/// latest acceptable boundary and restarting `overlap` characters before the
/// previous break.
fn split_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let limit = (start + max_size).min(chars.len());
        let end = if limit < chars.len() {
            break_point(&chars, start, limit)
        } else {
            limit
        };

        pieces.push(chars[start..end].iter().collect());

        if end >= chars.len() {
            break;
        }
        // Overlap with the emitted chunk, clamped so every iteration advances.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    pieces
}

/// Latest boundary in `(start, limit]`, trying each pattern class in priority
/// order. A match is only taken past the window midpoint so an early sentence
/// end cannot shrink the chunk to a sliver; otherwise the cut is hard.
fn break_point(chars: &[char], start: usize, limit: usize) -> usize {
    let min_break = start + (limit - start) / 2;

    for boundary in BOUNDARIES {
        let mut end = limit;
        while end >= start + boundary.len() && end > min_break {
            if chars[end - boundary.len()..end] == *boundary {
                return end;
            }
            end -= 1;
        }
    }

    limit
}
