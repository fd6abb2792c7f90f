//! Schema creation.
//!
//! `docbot init` runs every statement below; all DDL is `IF NOT EXISTS`
//! so re-running is safe.

use anyhow::Result;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        source TEXT PRIMARY KEY,
        content_hash TEXT NOT NULL,
        chunk_count INTEGER NOT NULL,
        ingested_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        hash TEXT NOT NULL,
        UNIQUE(source, chunk_index),
        FOREIGN KEY (source) REFERENCES documents(source)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chunk_vectors (
        chunk_id TEXT PRIMARY KEY,
        source TEXT NOT NULL,
        embedding BLOB NOT NULL,
        model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        FOREIGN KEY (chunk_id) REFERENCES chunks(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
    "CREATE INDEX IF NOT EXISTS idx_chunk_vectors_source ON chunk_vectors(source)",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }

    pool.close().await;
    Ok(())
}
