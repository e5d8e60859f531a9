//! chat-sync - terminal chat client.
//!
//! This is the entry point for the `chat-sync` binary. Replies stream to
//! stdout as they arrive; logs go to stderr.

mod app;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chat_sync_control::{ChatEvents, ChatList, ChatSession, SessionConfig};
use chat_sync_core::ChatId;
use chat_sync_remote::HttpChatStore;
use chat_sync_store::{DurableCache, RocksCache};
use chat_sync_stream::HttpCompletionClient;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use app::{App, Command, HELP};

/// chat-sync - terminal chat client with live streaming and offline resume.
#[derive(Parser, Debug)]
#[command(name = "chat-sync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base URL serving the chat store and completion endpoints.
    #[arg(long, env = "CHAT_SYNC_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// Bearer token forwarded with every request.
    #[arg(long, env = "CHAT_SYNC_TOKEN")]
    token: Option<String>,

    /// Directory of the local cache. Without it the cache lives in memory.
    #[arg(long, env = "CHAT_SYNC_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Session configuration file (JSON).
    #[arg(long, env = "CHAT_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Model for new chats.
    #[arg(long)]
    model: Option<String>,

    /// Open an existing chat on start.
    #[arg(long)]
    chat: Option<String>,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,
}

fn load_config(args: &Args) -> anyhow::Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => SessionConfig::default(),
    };

    if let Some(model) = &args.model {
        anyhow::ensure!(
            config.model(model).is_some(),
            "unknown model {model}; known models: {}",
            config
                .models
                .iter()
                .map(|m| m.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        config.default_model.clone_from(model);
    }
    Ok(config)
}

fn open_cache(args: &Args, config: &SessionConfig) -> anyhow::Result<DurableCache> {
    match &args.cache_dir {
        Some(dir) => {
            let backend = RocksCache::open(dir)
                .with_context(|| format!("failed to open cache at {}", dir.display()))?;
            Ok(DurableCache::new(Arc::new(backend), config.cache_config()))
        }
        None => {
            tracing::info!("No cache directory set, unfinished replies will not survive a restart");
            Ok(DurableCache::in_memory(config.cache_config()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "chat_sync=debug,warn"
    } else {
        "chat_sync=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    let cache = Arc::new(open_cache(&args, &config)?);

    let store = Arc::new(
        HttpChatStore::new(
            &args.base_url,
            config.request_timeout(),
            config.connect_timeout(),
        )?
        .with_token(args.token.clone()),
    );
    let completions = Arc::new(
        HttpCompletionClient::new(&args.base_url, config.connect_timeout())?
            .with_token(args.token.clone()),
    );

    let events = ChatEvents::default();
    let list = Arc::new(ChatList::new(store.clone()));
    let follower = {
        let list = Arc::clone(&list);
        let rx = events.subscribe();
        tokio::spawn(async move { list.follow(rx).await })
    };
    if let Err(e) = list.refresh().await {
        tracing::warn!(error = %e, "Chat list unavailable");
    }

    let session = ChatSession::new(store, completions, cache, events, config);
    let app = App::new(session, list);

    print!("{HELP}");
    if let Some(id) = &args.chat {
        let chat_id = ChatId::new(id.as_str()).context("invalid --chat id")?;
        app.open(chat_id).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match Command::parse(&line) {
            Ok(Some(command)) => {
                if !app.handle(command).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }

    follower.abort();
    Ok(())
}
