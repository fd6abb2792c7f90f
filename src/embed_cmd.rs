//! Embedding backfill commands.
//!
//! `docbot embed pending` fills in vectors for chunks the configured
//! model has not embedded yet (failed inline embeds, or chunks indexed
//! while embedding was disabled). `docbot embed rebuild` drops every
//! vector first, for model or dimension changes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::Chunk;

#[derive(Debug, sqlx::FromRow)]
struct PendingChunk {
    chunk_id: String,
    source: String,
    text: String,
}

/// Chunks with no stored vector for `model`, in deterministic order.
async fn find_pending_chunks(pool: &SqlitePool, model: &str) -> Result<Vec<PendingChunk>> {
    let pending = sqlx::query_as::<_, PendingChunk>(
        r#"
        SELECT c.id AS chunk_id, c.source, c.text
        FROM chunks c
        LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id AND cv.model = ?
        WHERE cv.chunk_id IS NULL
        ORDER BY c.source, c.chunk_index
        "#,
    )
    .bind(model)
    .fetch_all(pool)
    .await?;

    Ok(pending)
}

async fn store_vector(
    pool: &SqlitePool,
    chunk_id: &str,
    source: &str,
    vector: &[f32],
    provider: &dyn EmbeddingProvider,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chunk_vectors (chunk_id, source, embedding, model, dims)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(chunk_id) DO UPDATE SET
            source = excluded.source,
            embedding = excluded.embedding,
            model = excluded.model,
            dims = excluded.dims
        "#,
    )
    .bind(chunk_id)
    .bind(source)
    .bind(embedding::vec_to_blob(vector))
    .bind(provider.model_name())
    .bind(provider.dims() as i64)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn run_embed_pending(config: &Config, dry_run: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let pending = find_pending_chunks(&pool, provider.model_name()).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  chunks needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all chunks up to date");
        pool.close().await;
        return Ok(());
    }

    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in pending.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        let vectors = match provider.embed(&texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!("embedding batch failed: {}", e);
                failed += batch.len() as u64;
                continue;
            }
        };

        for (item, vector) in batch.iter().zip(&vectors) {
            store_vector(&pool, &item.chunk_id, &item.source, vector, provider.as_ref()).await?;
            embedded += 1;
        }
    }

    println!("embed pending");
    println!("  total pending: {}", pending.len());
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

pub async fn run_embed_rebuild(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let pool = db::connect(config).await?;
    sqlx::query("DELETE FROM chunk_vectors")
        .execute(&pool)
        .await?;
    pool.close().await;

    println!("embed rebuild — cleared existing embeddings");

    run_embed_pending(config, false).await
}

/// Embed freshly written chunks during ingestion.
///
/// Never fails the ingest: any embedding error downgrades the affected
/// chunks to pending, reported back as `(written, pending)`.
pub async fn embed_chunks_inline(
    config: &Config,
    pool: &SqlitePool,
    chunks: &[Chunk],
) -> (u64, u64) {
    if !config.embedding.is_enabled() {
        return (0, 0);
    }

    let provider = match embedding::create_provider(&config.embedding) {
        Ok(p) => p,
        Err(e) => {
            warn!("could not create embedding provider: {}", e);
            return (0, chunks.len() as u64);
        }
    };

    let mut written = 0u64;
    let mut pending = 0u64;

    for batch in chunks.chunks(config.embedding.batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        let vectors = match provider.embed(&texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!("embedding batch failed: {}", e);
                pending += batch.len() as u64;
                continue;
            }
        };

        for (chunk, vector) in batch.iter().zip(&vectors) {
            match store_vector(pool, &chunk.id, &chunk.source, vector, provider.as_ref()).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!("failed to store embedding for {}: {}", chunk.id, e);
                    pending += 1;
                }
            }
        }
    }

    (written, pending)
}
