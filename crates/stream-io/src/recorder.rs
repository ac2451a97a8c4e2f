//! JSONL recording sink.
//!
//! Appends every indexed reading to a local file, one JSON object per line.
//! Useful for dry runs and for tests that need to see what would have been
//! sent to the search index.

use crate::sink::{DocumentSink, IndexOutcome, SinkError};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use stream_core::SensorReading;

/// A single recorded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedDocument {
    /// Index the document would have been written to
    pub index: String,
    pub document: SensorReading,
}

type SharedWriter = Arc<Mutex<BufWriter<File>>>;

/// Thread-safe recorder that writes to a JSONL file
pub struct RecordingSink {
    writer: SharedWriter,
}

impl RecordingSink {
    /// Create a recorder writing to the specified path.
    /// The file is opened in append mode to preserve earlier runs.
    pub fn new(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }

    pub fn record(&self, entry: &RecordedDocument) -> std::io::Result<()> {
        append(&self.writer, entry)
    }
}

fn append(writer: &Mutex<BufWriter<File>>, entry: &RecordedDocument) -> std::io::Result<()> {
    let mut writer = writer
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    serde_json::to_writer(&mut *writer, entry)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

impl DocumentSink for RecordingSink {
    async fn index_document(
        &self,
        index: &str,
        document: &SensorReading,
    ) -> Result<IndexOutcome, SinkError> {
        let entry = RecordedDocument {
            index: index.to_string(),
            document: document.clone(),
        };
        let writer = Arc::clone(&self.writer);
        // File I/O stays off the async workers.
        tokio::task::spawn_blocking(move || append(&writer, &entry))
            .await
            .map_err(std::io::Error::other)??;
        Ok(IndexOutcome {
            index: index.to_string(),
            id: document.timestamp().to_string(),
            result: "recorded".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use stream_core::{Node, RpmReading, VoltageReading};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_recorder_writes_jsonl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("readings.jsonl");

        let sink = RecordingSink::new(&path).unwrap();

        let first = SensorReading::Voltage(VoltageReading {
            timestamp: 1000,
            voltage: 3.0,
            temperature: 80.25,
            node: Node::A,
        });
        let second = SensorReading::Rpm(RpmReading {
            timestamp: 2000,
            rpm: 1500.0,
            temperature: 61.5,
        });

        sink.index_document("machine-sensor-2024-01-01-00", &first)
            .await
            .unwrap();
        let outcome = sink
            .index_document("machine-sensor-2024-01-01-00", &second)
            .await
            .unwrap();
        assert_eq!(outcome.result, "recorded");

        // Read back and verify
        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();

        let lines: Vec<&str> = content.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);

        let entry1: RecordedDocument = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry1.document, first);
        assert_eq!(entry1.index, "machine-sensor-2024-01-01-00");

        let entry2: RecordedDocument = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(entry2.document.timestamp(), 2000);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_documents_land_on_separate_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("concurrent.jsonl");
        let sink = RecordingSink::new(&path).unwrap();

        let documents: Vec<SensorReading> = (0..20)
            .map(|ts| {
                SensorReading::Rpm(RpmReading {
                    timestamp: ts,
                    rpm: 1200.0,
                    temperature: 70.0,
                })
            })
            .collect();
        let writes = documents
            .iter()
            .map(|document| sink.index_document("idx", document));
        for outcome in futures::future::join_all(writes).await {
            outcome.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let mut stamps: Vec<u64> = content
            .lines()
            .map(|line| {
                serde_json::from_str::<RecordedDocument>(line)
                    .unwrap()
                    .document
                    .timestamp()
            })
            .collect();
        stamps.sort_unstable();
        assert_eq!(stamps, (0..20).collect::<Vec<u64>>());
    }

    #[test]
    fn test_recorder_appends_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readings.jsonl");
        let entry = RecordedDocument {
            index: "idx".into(),
            document: SensorReading::Rpm(RpmReading {
                timestamp: 1,
                rpm: 1000.0,
                temperature: 60.0,
            }),
        };

        RecordingSink::new(&path).unwrap().record(&entry).unwrap();
        RecordingSink::new(&path).unwrap().record(&entry).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
