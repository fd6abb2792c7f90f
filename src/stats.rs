//! `docbot stats` — index counts and embedding coverage.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_docs = count(&pool, "documents").await?;
    let total_chunks = count(&pool, "chunks").await?;
    let total_embedded = count(&pool, "chunk_vectors").await?;

    let coverage = if total_chunks > 0 {
        (total_embedded * 100) / total_chunks
    } else {
        0
    };

    println!("Docbot — Index Stats");
    println!("====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded, total_chunks, coverage
    );

    let per_doc = sqlx::query(
        r#"
        SELECT
            d.source,
            d.ingested_at,
            COUNT(DISTINCT c.id) AS chunk_count,
            COUNT(DISTINCT cv.chunk_id) AS embedded_count
        FROM documents d
        LEFT JOIN chunks c ON c.source = d.source
        LEFT JOIN chunk_vectors cv ON cv.chunk_id = c.id
        GROUP BY d.source
        ORDER BY d.source
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !per_doc.is_empty() {
        println!();
        println!("  By document:");
        println!(
            "  {:<32} {:>8} {:>10}   {}",
            "SOURCE", "CHUNKS", "EMBEDDED", "INGESTED"
        );
        println!("  {}", "-".repeat(72));

        for row in &per_doc {
            println!(
                "  {:<32} {:>8} {:>10}   {}",
                row.get::<String, _>("source"),
                row.get::<i64, _>("chunk_count"),
                row.get::<i64, _>("embedded_count"),
                format_ts(row.get("ingested_at"))
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

async fn count(pool: &SqlitePool, table: &str) -> Result<i64> {
    let n = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?;
    Ok(n)
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
