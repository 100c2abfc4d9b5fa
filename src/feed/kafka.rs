use super::{SampleSource, SourceKind};
use crate::error::{FeedError, Result};
use crate::models::{FeedBatch, FeedEnvelope};
use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSettings {
    pub bootstrap_servers: String,
    pub topic: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub security_protocol: String,
    pub sasl_mechanism: String,
    pub username: String,
    pub password: String,
}

impl KafkaSettings {
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("client.id", format!("siscom-alerts-{}", Uuid::new_v4()))
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("security.protocol", &self.security_protocol);

        // SASL only when credentials are configured
        if !self.username.is_empty() {
            client_config
                .set("sasl.mechanism", &self.sasl_mechanism)
                .set("sasl.username", &self.username)
                .set("sasl.password", &self.password);
        }
        client_config
    }
}

/// Push source: consumes position envelopes (`{"positions": [...], "devices": [...]}`)
/// from a Kafka topic.
pub struct KafkaSource {
    settings: KafkaSettings,
    consumer: Option<StreamConsumer>,
}

impl KafkaSource {
    pub fn new(settings: KafkaSettings) -> Self {
        Self {
            settings,
            consumer: None,
        }
    }
}

#[async_trait]
impl SampleSource for KafkaSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Push
    }

    async fn connect(&mut self) -> Result<()> {
        info!("Initializing Kafka consumer for topic: {}", self.settings.topic);
        self.consumer = None;

        let consumer: StreamConsumer = self.settings.client_config().create()?;
        consumer.subscribe(&[self.settings.topic.as_str()])?;
        info!("Subscribed to topic: {}", self.settings.topic);

        self.consumer = Some(consumer);
        Ok(())
    }

    async fn next_batch(&mut self) -> Result<FeedBatch> {
        let consumer = self.consumer.as_ref().ok_or(FeedError::Disconnected)?;
        let mut stream = consumer.stream();

        loop {
            let message = match stream.next().await {
                Some(Ok(m)) => m,
                Some(Err(e)) => {
                    error!("Kafka error: {}", e);
                    return Err(e.into());
                }
                None => return Err(FeedError::Disconnected),
            };

            let payload = match message.payload() {
                None => {
                    warn!("Received empty payload from Kafka");
                    continue;
                }
                Some(p) => p,
            };

            match FeedEnvelope::decode(payload) {
                Ok(envelope) => return Ok(envelope.into_batch()),
                Err(e) => {
                    warn!("Failed to parse message: {}", e);
                    continue;
                }
            }
        }
    }

    async fn dispose(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            info!("Kafka consumer closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(username: &str) -> KafkaSettings {
        KafkaSettings {
            bootstrap_servers: "localhost:9092".into(),
            topic: "positions".into(),
            group_id: "siscom-alerts".into(),
            auto_offset_reset: "latest".into(),
            security_protocol: "SASL_PLAINTEXT".into(),
            sasl_mechanism: "SCRAM-SHA-256".into(),
            username: username.into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn sasl_is_only_set_with_credentials() {
        let anonymous = settings("").client_config();
        assert_eq!(anonymous.get("sasl.username"), None);
        assert_eq!(anonymous.get("group.id"), Some("siscom-alerts"));

        let authed = settings("fleet").client_config();
        assert_eq!(authed.get("sasl.username"), Some("fleet"));
        assert_eq!(authed.get("sasl.mechanism"), Some("SCRAM-SHA-256"));
    }

    #[tokio::test]
    async fn next_batch_before_connect_is_disconnected() {
        let mut source = KafkaSource::new(settings(""));
        assert!(matches!(source.next_batch().await, Err(FeedError::Disconnected)));
        source.dispose().await;
    }
}
