//! # Docbot
//!
//! A retrieval-augmented chat backend for document collections.
//!
//! Docbot ingests a directory of plain-text documents, chunks and embeds
//! them into a persistent SQLite vector index, and answers chat messages by
//! retrieving the closest chunks and forwarding an augmented prompt to a
//! hosted language-model API, keeping per-session conversation history.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │ docs dir  │──▶│   Ingest     │──▶│  SQLite  │
//! │ (*.txt)   │   │ Chunk+Embed  │   │ vectors  │
//! └───────────┘   └──────────────┘   └────┬─────┘
//!                                         │
//!                       ┌─────────────────┤
//!                       ▼                 ▼
//!                 ┌──────────┐      ┌──────────┐     ┌───────────┐
//!                 │   CLI    │      │   HTTP   │────▶│  LLM API  │
//!                 │ (docbot) │      │  /chat   │     │ (hosted)  │
//!                 └──────────┘      └──────────┘     └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docbot init                     # create database
//! docbot ingest                   # index the docs directory
//! docbot search "vacation policy" # inspect retrieval
//! docbot serve                    # start the chat API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Blank-line document chunking |
//! | [`ingest`] | Idempotent document indexing |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`retrieve`] | Top-K vector retrieval with source attribution |
//! | [`completion`] | Chat-completion provider clients |
//! | [`chat`] | Prompt construction and orchestration |
//! | [`session`] | Session registry (conversation history) |
//! | [`server`] | HTTP chat API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`show`] | Indexed-document inspection |
//! | [`stats`] | Index statistics |

pub mod chat;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod show;
pub mod stats;
