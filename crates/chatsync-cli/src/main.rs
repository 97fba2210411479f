//! # chatsync
//!
//! Terminal client for one conversation.
//!
//! - restores messages that were sent but never confirmed before the last exit
//! - sends the message given on the command line, if any
//! - prints the cached history
//! - polls the conversation and prints new messages until Ctrl+C; every
//!   line typed on stdin is sent as a message

mod config;
mod output;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chatsync_store::{Database, SqliteMessageStore};
use chatsync_sync::{
    ActionClock, ChatPoller, HttpChatClient, MessengerRepository, SendMeta,
};

use crate::config::CliConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatsync_sync=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting chatsync v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = CliConfig::from_env();
    info!(?config, "Loaded configuration");
    let chat_id = config
        .chat_id
        .clone()
        .context("CHATSYNC_CHAT_ID is not set")?;

    // -----------------------------------------------------------------------
    // 3. Open the database and build the engine
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    }
    .into_shared();
    let (received, sent) = SqliteMessageStore::pair(db);

    let client = Arc::new(HttpChatClient::with_timeout(
        config.server_url.clone(),
        config.access_token.clone(),
        config.http_timeout,
    )?);

    let repo = Arc::new(MessengerRepository::new(
        client.clone(),
        client,
        Arc::new(received),
        Arc::new(sent),
        Arc::new(ActionClock::new()),
        config.sync.clone(),
    ));

    let restored = repo.restore_sent_messages().await?;
    info!(restored, chat_id = %chat_id, "Engine ready");

    let meta = SendMeta {
        source_feed: config.source_feed.clone(),
        target_image_id: None,
    };

    // -----------------------------------------------------------------------
    // 4. One-shot send and cached history
    // -----------------------------------------------------------------------
    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        repo.send_message(&chat_id, &args.join(" "), meta.clone())
            .await?;
    }

    let pending: HashSet<String> = repo
        .sent_cache()
        .unconfirmed(&chat_id)
        .into_iter()
        .map(|m| m.client_id)
        .collect();
    for message in repo.get_cached_messages(&chat_id).await?.iter().rev() {
        if pending.contains(&message.client_id) {
            println!("{}", output::render_pending(message));
        } else {
            println!("{}", output::render(message));
        }
    }

    // -----------------------------------------------------------------------
    // 5. Poll until Ctrl+C
    // -----------------------------------------------------------------------
    let poller = ChatPoller::new(Arc::clone(&repo));
    let mut subscription = poller.subscribe(&chat_id, config.resolution);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            item = subscription.next() => match item {
                Some(Ok(chat)) => {
                    for line in output::render_chat(&chat) {
                        println!("{line}");
                    }
                }
                Some(Err(e)) => {
                    error!(error = %e, "Polling stopped");
                    return Err(e.into());
                }
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(text) if !text.trim().is_empty() => {
                    let message = repo.send_message(&chat_id, &text, meta.clone()).await?;
                    println!("{}", output::render_pending(&message));
                }
                Some(_) => {}
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    subscription.cancel();
    Ok(())
}
