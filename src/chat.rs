//! Conversation orchestration.
//!
//! Builds the augmented prompt from retrieved context and the user's
//! question, and drives one completion round against the configured
//! provider with the session's prior turns as history.

use anyhow::Result;

use crate::completion;
use crate::config::Config;
use crate::db;
use crate::models::Turn;
use crate::retrieve;

/// Wrap the user's question with the retrieved context block.
///
/// The model is told to use the context only if relevant, so a sentinel
/// or weak context block degrades to a plain question.
pub fn build_augmented_message(context: &str, user_message: &str) -> String {
    format!(
        "Use the following context to answer the question if relevant.\n\
         \n\
         --- Context ---\n\
         {}\n\
         ---------------\n\
         \n\
         Question: {}",
        context, user_message
    )
}

/// Produce a reply to `user_message` given retrieved `context` and the
/// session's prior `history`. The reply text is returned verbatim; any
/// provider failure propagates as a single upstream error.
pub async fn respond(
    config: &Config,
    user_message: &str,
    context: &str,
    history: &[Turn],
) -> Result<String> {
    let system_prompt = completion::load_system_prompt(&config.llm);
    let augmented = build_augmented_message(context, user_message);
    completion::complete(&config.llm, &system_prompt, history, &augmented).await
}

/// CLI entry point — one-shot question with no session history.
pub async fn run_ask(config: &Config, question: &str, top_k: Option<usize>) -> Result<()> {
    let pool = db::connect(config).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let retrieved = retrieve::retrieve_context(config, &pool, question, top_k).await?;
    let reply = respond(config, question, &retrieved.formatted, &[]).await?;

    println!("--- Context ---");
    println!("{}", retrieved.formatted);
    println!();
    println!("--- Reply ---");
    println!("{}", reply);

    pool.close().await;
    Ok(())
}
