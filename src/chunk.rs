//! Blank-line document chunker.
//!
//! Splits a document body into [`Chunk`]s on blank-line boundaries
//! (`\n\n`), dropping anything that trims to empty. Paragraphs are the
//! retrieval unit: small enough to embed well, large enough to carry a
//! complete statement.
//!
//! Each chunk receives a deterministic identifier of the form
//! `{source}_chunk{index}` plus a SHA-256 hash of its text for staleness
//! detection.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

/// Split a document body into chunks on blank-line boundaries.
///
/// Returns chunks with contiguous indices starting at 0. A body that is
/// empty or all whitespace yields an empty vector; callers decide how to
/// handle documents with nothing to index.
pub fn chunk_document(source: &str, body: &str) -> Vec<Chunk> {
    body.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, text)| make_chunk(source, i as i64, text))
        .collect()
}

fn make_chunk(source: &str, index: i64, text: &str) -> Chunk {
    Chunk {
        id: format!("{}_chunk{}", source, index),
        source: source.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash: hash_text(text),
    }
}

/// SHA-256 hex digest of a text, used for content-change detection.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
