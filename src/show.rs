//! `docbot show` — print how a document was indexed.

use anyhow::{bail, Result};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

struct ShownChunk {
    id: String,
    text: String,
    embedded: bool,
}

pub async fn run_show(config: &Config, source: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let result = print_document(&pool, source).await;
    pool.close().await;
    result
}

async fn print_document(pool: &SqlitePool, source: &str) -> Result<()> {
    let Some(doc) = sqlx::query(
        "SELECT content_hash, ingested_at FROM documents WHERE source = ?",
    )
    .bind(source)
    .fetch_optional(pool)
    .await?
    else {
        bail!("document not found: {}", source);
    };

    println!("--- Document ---");
    println!("source:       {}", source);
    println!("content_hash: {}", doc.get::<String, _>("content_hash"));
    println!("ingested_at:  {}", format_ts(doc.get("ingested_at")));
    println!();

    let chunks: Vec<ShownChunk> = sqlx::query(
        r#"
        SELECT c.id, c.text, cv.chunk_id IS NOT NULL AS embedded
        FROM chunks c
        LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id
        WHERE c.source = ?
        ORDER BY c.chunk_index ASC
        "#,
    )
    .bind(source)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| ShownChunk {
        id: row.get("id"),
        text: row.get("text"),
        embedded: row.get("embedded"),
    })
    .collect();

    println!("--- Chunks ({}) ---", chunks.len());
    for chunk in &chunks {
        let state = if chunk.embedded { "embedded" } else { "pending" };
        println!("[{}] {}", chunk.id, state);
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
