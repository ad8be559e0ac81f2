use anyhow::{Context, Result};
use async_nats::Client;
use serde::Serialize;
use tracing::{debug, info};

/// NATS connection plus the subject prefix shared with the gateway sidecar
pub struct NatsClient {
    client: Client,
    prefix: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            prefix: prefix.into(),
        })
    }

    /// Full subject name under the configured prefix
    pub fn subject(&self, name: &str) -> String {
        format!("{}.{}", self.prefix, name)
    }

    /// Publish a JSON message
    pub async fn publish_json<T: Serialize>(&self, name: &str, message: &T) -> Result<()> {
        let subject = self.subject(name);
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish to {}", subject))?;

        debug!("Published to {}", subject);

        Ok(())
    }

    /// Subscribe to a subject under the prefix
    pub async fn subscribe(&self, name: &str) -> Result<async_nats::Subscriber> {
        let subject = self.subject(name);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }
}
