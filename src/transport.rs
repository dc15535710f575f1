//! Transport client
//!
//! Thin asynchronous facade over the message bus that carries check-request
//! and check-result messages to the rest of the monitoring pipeline.
//! Exposes `publish` against the `direct`/`fanout` exchanges, per-queue
//! `stats`, and a `connected` predicate. Broker connection management,
//! retries, and wire framing are the driver's concern.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde_json::Value;

/// The two exchanges the API ever publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Direct,
    Fanout,
}

impl Exchange {
    fn name(&self) -> &'static str {
        match self {
            Exchange::Direct => "direct",
            Exchange::Fanout => "fanout",
        }
    }
}

/// Point-in-time queue depth/consumer count, as reported by the broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub messages: u32,
    pub consumers: u32,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, exchange: Exchange, routing_key: &str, payload: &Value) -> anyhow::Result<()>;
    async fn stats(&self, queue: &str) -> anyhow::Result<QueueStats>;
    async fn connected(&self) -> bool;
    async fn close(&self);
}

/// AMQP-backed transport client. Check requests and results are plain JSON
/// bodies; the broker's routing (direct exchange keyed by subscription,
/// fanout exchange for broadcast subscriptions) does the fan-out.
#[derive(Clone)]
pub struct AmqpTransport {
    channel: Channel,
}

impl AmqpTransport {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let conn = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = conn.create_channel().await?;
        Ok(Self { channel })
    }
}

#[async_trait]
impl Transport for AmqpTransport {
    async fn publish(&self, exchange: Exchange, routing_key: &str, payload: &Value) -> anyhow::Result<()> {
        let body = serde_json::to_vec(payload)?;
        self.channel
            .basic_publish(
                exchange.name(),
                routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default(),
            )
            .await?
            .await?;
        Ok(())
    }

    async fn stats(&self, queue: &str) -> anyhow::Result<QueueStats> {
        let declared = self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(QueueStats {
            messages: declared.message_count(),
            consumers: declared.consumer_count(),
        })
    }

    async fn connected(&self) -> bool {
        self.channel.status().connected()
    }

    async fn close(&self) {
        if let Err(err) = self.channel.close(200, "shutting down").await {
            tracing::warn!(error = %err, "failed to close amqp channel cleanly");
        }
    }
}
