//! Kafka producer and consumer built on rdkafka.

use crate::metrics::MESSAGES_CONSUMED;
use crate::sink::{ConsumedMessage, MessageSource, PublishSink, SinkError};
use crate::tls::{TlsConfig, TlsError, TlsMaterial};
use futures::StreamExt;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::Message;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct BrokerConfig {
    pub brokers: String,
    pub client_id: String,
    pub group_id: String,
    pub topic: String,
    pub message_timeout: Duration,
    pub tls: TlsConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            client_id: "iot-stream".to_string(),
            group_id: "test-group".to_string(),
            topic: "iot-stream".to_string(),
            message_timeout: Duration::from_secs(5),
            tls: TlsConfig::default(),
        }
    }
}

impl BrokerConfig {
    /// Base client settings shared by producer and consumer.
    pub fn client_config(&self) -> Result<ClientConfig, SinkError> {
        let mut cfg = ClientConfig::new();
        cfg.set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id)
            .set_log_level(RDKafkaLogLevel::Error);

        if self.tls.enabled {
            if !cfg!(feature = "broker-tls") {
                return Err(TlsError::BrokerTlsDisabled.into());
            }
            let material = TlsMaterial::load(&self.tls)?;
            cfg.set("security.protocol", "ssl")
                .set("ssl.ca.pem", material.ca_pem);
            if let (Some(cert), Some(key)) = (material.cert_pem, material.key_pem) {
                cfg.set("ssl.certificate.pem", cert).set("ssl.key.pem", key);
            }
        }

        Ok(cfg)
    }
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(config: &BrokerConfig) -> Result<Self, SinkError> {
        let producer: FutureProducer = config
            .client_config()?
            .set(
                "message.timeout.ms",
                config.message_timeout.as_millis().to_string(),
            )
            .create()?;
        info!(brokers = %config.brokers, tls = config.tls.enabled, "Kafka producer created");
        Ok(Self {
            producer,
            queue_timeout: config.message_timeout,
        })
    }

    /// Waits for queued messages to be delivered.
    pub fn flush(&self, timeout: Duration) -> Result<(), SinkError> {
        self.producer.flush(Timeout::After(timeout))?;
        Ok(())
    }
}

impl PublishSink for KafkaPublisher {
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), SinkError> {
        let record = FutureRecord::to(topic).key(key).payload(value);
        match self
            .producer
            .send(record, Timeout::After(self.queue_timeout))
            .await
        {
            Ok(_) => {
                debug!(topic, key, "Message delivered");
                Ok(())
            }
            Err((err, _message)) => Err(SinkError::Kafka(err)),
        }
    }
}

pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaConsumer {
    pub fn new(config: &BrokerConfig) -> Result<Self, SinkError> {
        let consumer: StreamConsumer = config
            .client_config()?
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest")
            .create()?;
        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            topic = %config.topic,
            "Kafka consumer created"
        );
        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

impl MessageSource for KafkaConsumer {
    async fn consume<S, F>(&self, stop: S, mut handler: F) -> Result<u64, SinkError>
    where
        S: Future<Output = ()>,
        F: FnMut(ConsumedMessage),
    {
        self.consumer.subscribe(&[self.topic.as_str()])?;
        let mut messages = self.consumer.stream();
        tokio::pin!(stop);

        let mut received = 0u64;
        loop {
            tokio::select! {
                _ = &mut stop => break,
                next = messages.next() => match next {
                    Some(Ok(msg)) => {
                        handler(ConsumedMessage::from_parts(
                            msg.topic(),
                            msg.partition(),
                            msg.offset(),
                            msg.key(),
                            msg.payload(),
                        ));
                        received += 1;
                        MESSAGES_CONSUMED.inc();
                    }
                    Some(Err(e)) => warn!(error = %e, "Kafka consume error"),
                    None => break,
                },
            }
        }

        info!(received, topic = %self.topic, "Consumer stopped");
        Ok(received)
    }
}
