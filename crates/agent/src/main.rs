//! offshore-agent entry point.
//!
//! Boots the caching agent and dispatches environment events delivered as
//! JSON lines on stdin, one reply per line on stdout. Logging goes to stderr
//! to keep the reply stream clean.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use offshore_client::{FetchClient, FetchConfig};
use offshore_core::{AppConfig, SqliteStore};

mod classify;
mod lifecycle;
mod protocol;
mod strategy;
#[cfg(test)]
mod testutil;

use lifecycle::{CacheAgent, FetchOutcome};
use offshore_client::Fetcher;
use offshore_core::store::CacheStore;
use protocol::Event;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load()?;
    tracing::info!(generation = %config.generation(), "starting offshore agent");

    let store = Arc::new(SqliteStore::open(&config.db_path).await?);
    let fetcher = Arc::new(FetchClient::new(FetchConfig::from_app(&config))?);
    let agent = CacheAgent::new(config, store, fetcher)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Event>(&line) {
            Ok(event) => dispatch(&agent, event).await,
            Err(err) => {
                tracing::warn!(error = %err, "unparseable event");
                json!({ "ok": false, "error": format!("INVALID_PAYLOAD: {err}") })
            }
        };

        stdout.write_all(serde_json::to_string(&reply)?.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}

/// Route one event to its handler and shape the reply line.
async fn dispatch<S, F>(agent: &CacheAgent<S, F>, event: Event) -> serde_json::Value
where
    S: CacheStore + 'static,
    F: Fetcher + 'static,
{
    match event {
        Event::Install => match agent.on_install().await {
            Ok(report) => json!({
                "ok": true,
                "event": "install",
                "generation": report.generation,
                "cached": report.cached,
                "skip_waiting": report.skip_waiting,
            }),
            Err(err) => failure("install", &err),
        },
        Event::Activate => match agent.on_activate().await {
            Ok(report) => json!({
                "ok": true,
                "event": "activate",
                "active": report.active,
                "deleted": report.deleted,
                "claimed": report.claimed,
            }),
            Err(err) => failure("activate", &err),
        },
        Event::Fetch { method, url } => match agent.on_fetch(&method, &url).await {
            Ok(FetchOutcome::Handled(response)) => json!({
                "ok": true,
                "event": "fetch",
                "url": url,
                "handled": true,
                "status": response.status,
                "content_type": response.content_type,
                "bytes": response.body.len(),
            }),
            Ok(FetchOutcome::Passthrough) => json!({
                "ok": true,
                "event": "fetch",
                "url": url,
                "handled": false,
            }),
            Err(err) => failure("fetch", &err),
        },
        Event::Message { data } => match agent.on_message(data).await {
            Ok(reply) => json!({ "ok": true, "event": "message", "reply": reply }),
            Err(err) => failure("message", &err),
        },
        Event::Sync { tag } => match agent.on_sync(&tag).await {
            Ok(()) => json!({ "ok": true, "event": "sync", "tag": tag }),
            Err(err) => failure("sync", &err),
        },
        Event::Push { data } => match agent.on_push(data.as_ref()) {
            Ok(Some(notification)) => json!({ "ok": true, "event": "push", "notification": notification }),
            Ok(None) => json!({ "ok": true, "event": "push", "notification": null }),
            Err(err) => failure("push", &err),
        },
        Event::NotificationClick => {
            json!({ "ok": true, "event": "notificationclick", "client": agent.on_notification_click() })
        }
    }
}

fn failure(event: &str, err: &offshore_core::Error) -> serde_json::Value {
    tracing::error!(event, error = %err, "event handling failed");
    json!({ "ok": false, "event": event, "error": err.to_string() })
}
