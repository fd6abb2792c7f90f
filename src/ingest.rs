//! Document ingestion pipeline.
//!
//! Coordinates the flow from the docs directory into the index:
//! scan → chunk → store → inline embedding. Ingestion is idempotent,
//! keyed off a SHA-256 hash of each document's content: unchanged files
//! are skipped, changed files have their chunks and vectors replaced.
//! Inline embedding is non-fatal; failed vectors stay pending for
//! `docbot embed pending`.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sqlx::SqlitePool;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk::{chunk_document, hash_text};
use crate::config::Config;
use crate::db;
use crate::embed_cmd;
use crate::models::{Chunk, SourceDocument};

/// Counters describing what one ingestion pass did.
#[derive(Debug, Default, Clone)]
pub struct IngestSummary {
    pub files_seen: u64,
    pub indexed: u64,
    pub skipped_unchanged: u64,
    pub skipped_empty: u64,
    pub chunks_written: u64,
    pub embeddings_written: u64,
    pub embeddings_pending: u64,
}

/// Ingest the configured docs directory into the index.
///
/// A missing docs directory is not an error: ingestion is skipped with a
/// warning and an empty summary is returned. With `full`, documents are
/// re-indexed regardless of their stored content hash.
pub async fn ingest_documents(config: &Config, pool: &SqlitePool, full: bool) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    if !config.docs.root.exists() {
        warn!(
            root = %config.docs.root.display(),
            "docs directory not found, skipping ingestion"
        );
        return Ok(summary);
    }

    let docs = scan_docs_dir(config)?;
    summary.files_seen = docs.len() as u64;

    for doc in &docs {
        let content_hash = hash_text(&doc.body);

        let existing: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM documents WHERE source = ?")
                .bind(&doc.source)
                .fetch_optional(pool)
                .await?;

        if !full && existing.as_deref() == Some(content_hash.as_str()) {
            info!(source = %doc.source, "unchanged, skipping");
            summary.skipped_unchanged += 1;
            continue;
        }

        let chunks = chunk_document(&doc.source, &doc.body);
        if chunks.is_empty() {
            warn!(source = %doc.source, "empty or only whitespace, skipping");
            summary.skipped_empty += 1;
            continue;
        }

        replace_document(pool, doc, &content_hash, &chunks).await?;
        summary.indexed += 1;
        summary.chunks_written += chunks.len() as u64;
        info!(source = %doc.source, chunks = chunks.len(), "indexed");

        // Inline embedding (non-fatal)
        let (emb_ok, emb_pending) = embed_cmd::embed_chunks_inline(config, pool, &chunks).await;
        summary.embeddings_written += emb_ok;
        summary.embeddings_pending += emb_pending;
    }

    Ok(summary)
}

/// CLI entry point — connects, ingests, and prints a summary.
pub async fn run_ingest(config: &Config, full: bool, dry_run: bool) -> Result<()> {
    if dry_run {
        if !config.docs.root.exists() {
            println!("ingest (dry-run)");
            println!("  docs directory not found: {}", config.docs.root.display());
            return Ok(());
        }
        let docs = scan_docs_dir(config)?;
        let total_chunks: usize = docs
            .iter()
            .map(|doc| chunk_document(&doc.source, &doc.body).len())
            .sum();
        println!("ingest (dry-run)");
        println!("  files found: {}", docs.len());
        println!("  estimated chunks: {}", total_chunks);
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let summary = ingest_documents(config, &pool, full).await?;

    println!("ingest");
    println!("  files found: {}", summary.files_seen);
    println!("  indexed: {}", summary.indexed);
    println!("  skipped (unchanged): {}", summary.skipped_unchanged);
    println!("  skipped (empty): {}", summary.skipped_empty);
    println!("  chunks written: {}", summary.chunks_written);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", summary.embeddings_written);
        println!("  embeddings pending: {}", summary.embeddings_pending);
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Scan the docs directory for documents matching the configured globs.
///
/// Returns documents sorted by source name for deterministic ordering.
pub fn scan_docs_dir(config: &Config) -> Result<Vec<SourceDocument>> {
    let root = &config.docs.root;
    if !root.exists() {
        bail!("docs directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.docs.include_globs)?;
    let exclude_set = build_globset(&config.docs.exclude_globs)?;

    let mut docs = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let body = std::fs::read_to_string(path).unwrap_or_default();
        docs.push(SourceDocument {
            source: rel_str,
            body,
        });
    }

    docs.sort_by(|a, b| a.source.cmp(&b.source));

    Ok(docs)
}

/// Replace a document's index entries in one transaction.
///
/// Upserts the document row and swaps its chunks and vectors; a failure
/// anywhere rolls the whole file back.
async fn replace_document(
    pool: &SqlitePool,
    doc: &SourceDocument,
    content_hash: &str,
    chunks: &[Chunk],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents (source, content_hash, chunk_count, ingested_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(source) DO UPDATE SET
            content_hash = excluded.content_hash,
            chunk_count = excluded.chunk_count,
            ingested_at = excluded.ingested_at
        "#,
    )
    .bind(&doc.source)
    .bind(content_hash)
    .bind(chunks.len() as i64)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM chunk_vectors WHERE source = ?")
        .bind(&doc.source)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM chunks WHERE source = ?")
        .bind(&doc.source)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            "INSERT INTO chunks (id, source, chunk_index, text, hash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(&chunk.source)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
