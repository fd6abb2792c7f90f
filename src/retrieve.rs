//! Top-K context retrieval.
//!
//! Embeds a query, ranks every stored chunk vector by cosine similarity in
//! Rust, and formats the closest chunks with their source attribution for
//! prompt injection. There is no similarity threshold: the top K matches
//! are returned however weak, a deliberate recall-over-precision tradeoff.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::models::RetrievedChunk;

/// Returned as the context string when the index is empty or yields nothing.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found.";

/// The result of a retrieval pass: ranked chunks plus the formatted block
/// that gets injected into the prompt (and echoed back as `context_used`).
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub formatted: String,
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievedContext {
    fn empty() -> Self {
        Self {
            formatted: NO_CONTEXT_SENTINEL.to_string(),
            chunks: Vec::new(),
        }
    }
}

/// A stored vector row loaded for ranking.
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Retrieve the `top_k` chunks closest to `query`.
///
/// An index with no stored vectors short-circuits to the sentinel without
/// calling the embedding provider, so an empty deployment never needs a
/// reachable embedding service.
pub async fn retrieve_context(
    config: &Config,
    pool: &SqlitePool,
    query: &str,
    top_k: usize,
) -> Result<RetrievedContext> {
    let vector_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(pool)
        .await?;

    if vector_count == 0 {
        return Ok(RetrievedContext::empty());
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let query_vec = embedding::embed_query(provider.as_ref(), query).await?;

    let rows = sqlx::query(
        r#"
        SELECT cv.chunk_id, cv.source, cv.embedding, c.text
        FROM chunk_vectors cv
        JOIN chunks c ON c.id = cv.chunk_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let candidates: Vec<VectorRow> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            VectorRow {
                chunk_id: row.get("chunk_id"),
                source: row.get("source"),
                text: row.get("text"),
                vector: embedding::blob_to_vec(&blob),
            }
        })
        .collect();

    let ranked = rank_candidates(&query_vec, candidates, top_k);

    if ranked.is_empty() {
        return Ok(RetrievedContext::empty());
    }

    Ok(RetrievedContext {
        formatted: format_context(&ranked),
        chunks: ranked,
    })
}

/// Rank candidates by cosine similarity to the query vector, descending,
/// and keep the top `top_k`. Ties break on chunk id for determinism.
pub fn rank_candidates(
    query_vec: &[f32],
    candidates: Vec<VectorRow>,
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let mut scored: Vec<RetrievedChunk> = candidates
        .into_iter()
        .map(|row| {
            let score = embedding::cosine_similarity(query_vec, &row.vector) as f64;
            RetrievedChunk {
                chunk_id: row.chunk_id,
                source: row.source,
                text: row.text,
                score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk_id.cmp(&b.chunk_id))
    });
    scored.truncate(top_k);

    scored
}

/// Format retrieved chunks as a context block with source attribution.
///
/// Each chunk renders as `[Source: {source}]` followed by its text; blocks
/// are joined by blank lines. An empty slice yields the sentinel.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_SENTINEL.to_string();
    }

    chunks
        .iter()
        .map(|c| format!("[Source: {}]\n{}", c.source, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// CLI entry point — retrieve for a query and print the ranked chunks.
pub async fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let retrieved = retrieve_context(config, &pool, query, top_k).await?;

    if retrieved.chunks.is_empty() {
        println!("{}", NO_CONTEXT_SENTINEL);
        pool.close().await;
        return Ok(());
    }

    for (i, chunk) in retrieved.chunks.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, chunk.score, chunk.chunk_id);
        println!("    source: {}", chunk.source);
        println!(
            "    excerpt: \"{}\"",
            chunk.text.replace('\n', " ").chars().take(160).collect::<String>().trim()
        );
        println!();
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(chunk_id: &str, source: &str, vector: Vec<f32>) -> VectorRow {
        VectorRow {
            chunk_id: chunk_id.to_string(),
            source: source.to_string(),
            text: format!("text of {}", chunk_id),
            vector,
        }
    }

    #[test]
    fn test_rank_orders_by_similarity_desc() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            row("a_chunk0", "a.txt", vec![0.0, 1.0]),  // orthogonal
            row("b_chunk0", "b.txt", vec![1.0, 0.0]),  // identical
            row("c_chunk0", "c.txt", vec![1.0, 1.0]),  // in between
        ];
        let ranked = rank_candidates(&query, candidates, 10);
        let ids: Vec<&str> = ranked.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b_chunk0", "c_chunk0", "a_chunk0"]);
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_rank_truncates_to_top_k() {
        let query = vec![1.0, 0.0];
        let candidates = (0..10)
            .map(|i| row(&format!("d_chunk{}", i), "d.txt", vec![1.0, i as f32 * 0.1]))
            .collect();
        let ranked = rank_candidates(&query, candidates, 3);
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn test_rank_empty_candidates() {
        let ranked = rank_candidates(&[1.0, 0.0], Vec::new(), 3);
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_rank_tie_breaks_on_chunk_id() {
        let query = vec![1.0, 0.0];
        let candidates = vec![
            row("z_chunk0", "z.txt", vec![1.0, 0.0]),
            row("a_chunk0", "a.txt", vec![1.0, 0.0]),
        ];
        let ranked = rank_candidates(&query, candidates, 2);
        assert_eq!(ranked[0].chunk_id, "a_chunk0");
    }

    #[test]
    fn test_format_context_attribution() {
        let chunks = vec![
            RetrievedChunk {
                chunk_id: "policy.txt_chunk0".to_string(),
                source: "policy.txt".to_string(),
                text: "Vacation is unlimited.".to_string(),
                score: 0.9,
            },
            RetrievedChunk {
                chunk_id: "handbook.txt_chunk2".to_string(),
                source: "handbook.txt".to_string(),
                text: "Expenses need receipts.".to_string(),
                score: 0.5,
            },
        ];
        let formatted = format_context(&chunks);
        assert_eq!(
            formatted,
            "[Source: policy.txt]\nVacation is unlimited.\n\n[Source: handbook.txt]\nExpenses need receipts."
        );
    }

    #[test]
    fn test_format_context_empty_is_sentinel() {
        assert_eq!(format_context(&[]), NO_CONTEXT_SENTINEL);
    }
}
