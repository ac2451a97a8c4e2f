//! Collaborator interfaces a reading can be delivered to or read back from.

use crate::tls::TlsError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use stream_core::SensorReading;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Server returned error: {status} - {body}")]
    Server { status: u16, body: String },

    #[error("Failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
}

/// Broker-style sink: a keyed message on a topic.
pub trait PublishSink: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        key: &str,
        value: &[u8],
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Result of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub result: String,
}

/// Index-style sink: one document into a named index.
pub trait DocumentSink: Send + Sync {
    fn index_document(
        &self,
        index: &str,
        document: &SensorReading,
    ) -> impl Future<Output = Result<IndexOutcome, SinkError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_source", default)]
    pub source: serde_json::Value,
}

impl SearchHit {
    /// The hit decoded as a reading, if it is one.
    pub fn reading(&self) -> Option<SensorReading> {
        serde_json::from_value(self.source.clone()).ok()
    }
}

pub trait DocumentSource {
    fn search(
        &self,
        index: &str,
        query: serde_json::Value,
    ) -> impl Future<Output = Result<Vec<SearchHit>, SinkError>>;
}

/// One message taken off a broker topic, decoded as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub value: Option<String>,
}

impl ConsumedMessage {
    pub fn from_parts(
        topic: &str,
        partition: i32,
        offset: i64,
        key: Option<&[u8]>,
        payload: Option<&[u8]>,
    ) -> Self {
        Self {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.map(|k| String::from_utf8_lossy(k).into_owned()),
            value: payload.map(|v| String::from_utf8_lossy(v).into_owned()),
        }
    }

    pub fn reading(&self) -> Option<SensorReading> {
        self.value
            .as_deref()
            .and_then(|v| serde_json::from_str(v).ok())
    }
}

/// Broker-style source. Runs `handler` for each message until `stop` resolves.
pub trait MessageSource {
    fn consume<S, F>(
        &self,
        stop: S,
        handler: F,
    ) -> impl Future<Output = Result<u64, SinkError>>
    where
        S: Future<Output = ()>,
        F: FnMut(ConsumedMessage);
}

/// Writes every delivery to the tracing log. For runs without infrastructure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl PublishSink for LogSink {
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), SinkError> {
        info!(
            topic,
            key,
            value = %String::from_utf8_lossy(value),
            "Reading published"
        );
        Ok(())
    }
}

impl DocumentSink for LogSink {
    async fn index_document(
        &self,
        index: &str,
        document: &SensorReading,
    ) -> Result<IndexOutcome, SinkError> {
        let body = serde_json::to_string(document)?;
        info!(index, document = %body, "Reading indexed");
        Ok(IndexOutcome {
            index: index.to_string(),
            id: document.timestamp().to_string(),
            result: "logged".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_core::{Node, VoltageReading};

    fn reading() -> SensorReading {
        SensorReading::Voltage(VoltageReading {
            timestamp: 42,
            voltage: 5.0,
            temperature: 88.5,
            node: Node::A,
        })
    }

    #[test]
    fn consumed_message_decodes_text_and_reading() {
        let payload = serde_json::to_vec(&reading()).unwrap();
        let msg = ConsumedMessage::from_parts(
            "iot-stream",
            0,
            7,
            Some(b"node-a".as_slice()),
            Some(payload.as_slice()),
        );
        assert_eq!(msg.key.as_deref(), Some("node-a"));
        assert_eq!(msg.reading(), Some(reading()));
    }

    #[test]
    fn consumed_message_tolerates_foreign_payloads() {
        let msg =
            ConsumedMessage::from_parts("iot-stream", 1, 0, None, Some(b"hello".as_slice()));
        assert_eq!(msg.value.as_deref(), Some("hello"));
        assert!(msg.reading().is_none());
        assert!(msg.key.is_none());
    }

    #[test]
    fn search_hit_decodes_reading() {
        let hit = SearchHit {
            index: "machine-sensor-2024-05-01-09".into(),
            id: "abc".into(),
            source: serde_json::to_value(reading()).unwrap(),
        };
        assert_eq!(hit.reading(), Some(reading()));
    }

    #[tokio::test]
    async fn log_sink_accepts_everything() {
        let sink = LogSink;
        sink.publish("iot-stream", "node-a", b"{}").await.unwrap();
        let outcome = sink.index_document("idx", &reading()).await.unwrap();
        assert_eq!(outcome.index, "idx");
        assert_eq!(outcome.result, "logged");
    }
}
