//! Deterministic overlapping-window chunker.
//!
//! Windows are `chunk_size` characters wide and advance by
//! `chunk_size - overlap` characters. A window that would cut through a word
//! is pulled back to the last whitespace in its second half, so the same
//! `(content, config)` pair always produces the same boundaries.

use crate::config::ChunkingConfig;
use crate::types::{chunk_id, Chunk};

pub fn chunk_document(doc_id: &str, content: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = split_windows(content, config.chunk_size, config.overlap_chars())
        .into_iter()
        .enumerate()
        .map(|(position, text)| Chunk {
            chunk_id: chunk_id(doc_id, position),
            doc_id: doc_id.to_string(),
            text: text.to_string(),
            position,
            total_chunks: 0,
            embedding: None,
        })
        .collect();
    let total_chunks = chunks.len();
    for chunk in &mut chunks { chunk.total_chunks = total_chunks; }
    chunks
}

/// Splits `content` into overlapping windows; every window is a substring of `content`.
pub fn split_windows(content: &str, chunk_size: usize, overlap: usize) -> Vec<&str> {
    let chunk_size = chunk_size.max(1);
    // byte offset of every char, plus the end of the string
    let offsets: Vec<usize> = content.char_indices().map(|(i, _)| i).chain(std::iter::once(content.len())).collect();
    let n_chars = offsets.len() - 1;
    if n_chars <= chunk_size {
        return if content.trim().is_empty() { Vec::new() } else { vec![content] };
    }

    let chars: Vec<char> = content.chars().collect();
    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + chunk_size).min(n_chars);
        let end = if hard_end < n_chars { snap_to_whitespace(&chars, start, hard_end) } else { hard_end };
        let window = content[offsets[start]..offsets[end]].trim();
        if !window.is_empty() { windows.push(window); }
        if end >= n_chars { break; }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }
    windows
}

fn snap_to_whitespace(chars: &[char], start: usize, hard_end: usize) -> usize {
    let floor = start + (hard_end - start) / 2;
    (floor..hard_end).rev().find(|&i| chars[i].is_whitespace()).map_or(hard_end, |i| i + 1)
}
