//! Command handlers.
//!
//! Handlers that act on behalf of a user take the resolved [`User`] as an
//! argument; [`execute`] looks the current user up once, before dispatch.
use anyhow::{Context as _, Result};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cli::Command;
use crate::config::Config;
use crate::feed::FeedClient;
use crate::ingest::Scheduler;
use crate::storage::{Database, User};
use crate::util::validate_feed_url;

/// Everything a handler may need, passed explicitly.
pub struct Context {
    pub db: Database,
    pub config: Config,
    /// Where `config` is written back when the current user changes
    pub config_path: PathBuf,
}

/// Run one command, writing user-facing output to `out`.
pub async fn execute<W: Write>(command: Command, ctx: &mut Context, out: &mut W) -> Result<()> {
    match command {
        Command::Register { name } => register(ctx, &name, out).await,
        Command::Login { name } => login(ctx, &name, out).await,
        Command::Users => list_users(ctx, out).await,
        Command::Reset => reset(ctx, out).await,
        Command::AddFeed { name, url } => {
            let user = current_user(ctx).await?;
            add_feed(ctx, &user, &name, &url, out).await
        }
        Command::Feeds => list_feeds(ctx, out).await,
        Command::Agg { interval } => aggregate(ctx, interval, out).await,
    }
}

async fn current_user(ctx: &Context) -> Result<User> {
    let name = ctx
        .config
        .current_user_name
        .as_deref()
        .context("No user logged in; run `gator register <name>` or `gator login <name>` first")?;
    ctx.db
        .user_by_name(name)
        .await
        .with_context(|| format!("Failed to fetch current user {}", name))
}

async fn register<W: Write>(ctx: &mut Context, name: &str, out: &mut W) -> Result<()> {
    let user = ctx
        .db
        .create_user(name)
        .await
        .context("Failed to create user")?;
    ctx.config
        .set_user(&user.name, &ctx.config_path)
        .with_context(|| format!("Failed to log in as {} after registration", user.name))?;

    tracing::info!(user_id = user.id, name = %user.name, "User registered");
    writeln!(out, "User {} created and logged in", user.name)?;
    Ok(())
}

async fn login<W: Write>(ctx: &mut Context, name: &str, out: &mut W) -> Result<()> {
    let user = ctx
        .db
        .user_by_name(name)
        .await
        .with_context(|| format!("Failed to fetch user {}", name))?;
    ctx.config
        .set_user(&user.name, &ctx.config_path)
        .context("Failed to save login")?;

    writeln!(out, "User {} logged in", user.name)?;
    Ok(())
}

async fn list_users<W: Write>(ctx: &Context, out: &mut W) -> Result<()> {
    let users = ctx.db.users().await.context("Failed to list users")?;
    let current = ctx.config.current_user_name.as_deref();
    for user in users {
        if Some(user.name.as_str()) == current {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}

async fn reset<W: Write>(ctx: &Context, out: &mut W) -> Result<()> {
    let removed = ctx.db.reset().await.context("Failed to reset users")?;
    tracing::info!(users = removed, "Database reset");
    writeln!(out, "Removed {} users and their feeds", removed)?;
    Ok(())
}

async fn add_feed<W: Write>(
    ctx: &Context,
    user: &User,
    name: &str,
    url: &str,
    out: &mut W,
) -> Result<()> {
    let url = validate_feed_url(url).with_context(|| format!("Rejected feed URL {}", url))?;
    let feed = ctx
        .db
        .create_feed(name, url.as_str(), user.id)
        .await
        .context("Failed to create feed")?;

    tracing::info!(feed_id = feed.id, url = %feed.url, user = %user.name, "Feed registered");
    writeln!(out, "Created feed {} ({})", feed.name, feed.url)?;
    Ok(())
}

async fn list_feeds<W: Write>(ctx: &Context, out: &mut W) -> Result<()> {
    let feeds = ctx.db.feeds_with_owners().await.context("Failed to list feeds")?;
    for feed in feeds {
        writeln!(out, "* {} ({}), added by {}", feed.name, feed.url, feed.user_name)?;
    }
    Ok(())
}

/// Poll until Ctrl-C. Only a bad interval or client setup ends this early.
async fn aggregate<W: Write>(ctx: &Context, interval: Option<Duration>, out: &mut W) -> Result<()> {
    let interval = interval.unwrap_or_else(|| ctx.config.fetch_interval());
    let client = FeedClient::new(&ctx.config.user_agent, ctx.config.request_timeout())
        .context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(ctx.db.clone(), client, interval)?;

    writeln!(out, "Collecting feeds every {:?}", scheduler.interval())?;
    out.flush()?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping");
                trigger.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    scheduler.run(shutdown).await;
    Ok(())
}
