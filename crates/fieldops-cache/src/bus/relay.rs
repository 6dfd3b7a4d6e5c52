//! # Redis Relay
//!
//! Carries invalidation events between processes over Redis pub/sub, the
//! server-side counterpart of a cross-tab broadcast channel. Events raised
//! by the local bus are published as JSON; events received from other bus
//! instances are injected back into the local bus.

use std::sync::Arc;

use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use fieldops_domain::InvalidationEvent;

use super::InvalidationBus;
use crate::error::{CacheError, Result};

/// Default pub/sub channel name
pub const DEFAULT_CHANNEL: &str = "fieldops:invalidations";

/// Running relay between a local bus and a Redis channel
#[derive(Debug)]
pub struct RedisRelay {
    channel: String,
    outbound: JoinHandle<()>,
    inbound: JoinHandle<()>,
}

impl RedisRelay {
    /// Connect to Redis and start relaying in both directions
    pub async fn connect(
        url: &str,
        channel: impl Into<String>,
        bus: Arc<InvalidationBus>,
    ) -> Result<Self> {
        let channel = channel.into();
        if channel.trim().is_empty() {
            return Err(CacheError::Relay("channel name must not be empty".into()));
        }

        let client = Client::open(url)?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        tracing::info!(channel = %channel, bus = %bus.id(), "Invalidation relay connected");

        let outbound = tokio::spawn(publish_local(
            publisher,
            channel.clone(),
            bus.id(),
            bus.firehose(),
        ));

        let inbound_bus = bus;
        let inbound = tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            while let Some(msg) = messages.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "Unreadable relay payload");
                        continue;
                    }
                };

                match serde_json::from_str::<InvalidationEvent>(&payload) {
                    Ok(event) => {
                        inbound_bus.inject_remote(event);
                    }
                    Err(e) => tracing::warn!(error = %e, "Malformed relay event"),
                }
            }
            tracing::warn!("Relay subscription stream ended");
        });

        Ok(Self {
            channel,
            outbound,
            inbound,
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Stop relaying in both directions
    pub fn shutdown(self) {
        tracing::info!(channel = %self.channel, "Invalidation relay stopped");
    }
}

impl Drop for RedisRelay {
    fn drop(&mut self) {
        self.outbound.abort();
        self.inbound.abort();
    }
}

async fn publish_local(
    mut conn: ConnectionManager,
    channel: String,
    local: Uuid,
    mut events: broadcast::Receiver<InvalidationEvent>,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.origin == local => {
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode invalidation");
                        continue;
                    }
                };
                if let Err(e) = conn.publish::<_, _, ()>(&channel, payload).await {
                    tracing::warn!(error = %e, channel = %channel, "Failed to publish invalidation");
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Relay lagged behind local bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
