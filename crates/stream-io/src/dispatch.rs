//! Channel between the generator thread and async sinks.
//!
//! The generator callback only pushes into an unbounded channel. A dispatcher
//! task drains it and spawns one delivery per reading, so a slow sink never
//! delays the next tick and deliveries may complete out of order. Failed
//! deliveries are logged, counted and dropped.

use crate::metrics::{
    DELIVERIES_FAILED, DELIVERIES_IN_FLIGHT, DELIVERIES_SUCCEEDED, DELIVERY_LATENCY_SECONDS,
    READINGS_GENERATED,
};
use crate::sink::{DocumentSink, PublishSink, SinkError};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use stream_core::{bucketed_name_at_millis, SensorReading};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Hands one reading to a sink.
pub trait Deliver: Send + Sync + 'static {
    fn deliver(&self, reading: SensorReading)
        -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Destination description for logs.
    fn target(&self) -> String;
}

/// Publishes readings to a broker topic, keyed by [`SensorReading::partition_key`].
pub struct PublishDelivery<P> {
    sink: P,
    topic: String,
}

impl<P: PublishSink> PublishDelivery<P> {
    pub fn new(sink: P, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }
}

impl<P: PublishSink + 'static> Deliver for PublishDelivery<P> {
    async fn deliver(&self, reading: SensorReading) -> Result<(), SinkError> {
        let value = reading.to_json_bytes()?;
        self.sink
            .publish(&self.topic, &reading.partition_key(), &value)
            .await
    }

    fn target(&self) -> String {
        format!("topic {}", self.topic)
    }
}

/// Indexes each reading into the hourly bucket of `base_index` that contains
/// its emission timestamp.
pub struct IndexDelivery<D> {
    sink: D,
    base_index: String,
}

impl<D: DocumentSink> IndexDelivery<D> {
    pub fn new(sink: D, base_index: impl Into<String>) -> Self {
        Self {
            sink,
            base_index: base_index.into(),
        }
    }
}

impl<D: DocumentSink + 'static> Deliver for IndexDelivery<D> {
    async fn deliver(&self, reading: SensorReading) -> Result<(), SinkError> {
        let index = bucketed_name_at_millis(&self.base_index, reading.timestamp());
        let outcome = self.sink.index_document(&index, &reading).await?;
        debug!(
            index = %outcome.index,
            id = %outcome.id,
            result = %outcome.result,
            "Reading indexed"
        );
        Ok(())
    }

    fn target(&self) -> String {
        format!("index {}-<hour>", self.base_index)
    }
}

#[derive(Debug, Default)]
pub struct DispatchStats {
    pub received: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

impl DispatchStats {
    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub received: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Producer half of the reading channel.
#[derive(Clone)]
pub struct ReadingSender {
    tx: mpsc::UnboundedSender<SensorReading>,
}

impl ReadingSender {
    /// Generator callback that enqueues each reading without blocking.
    pub fn into_callback(self) -> impl FnMut(SensorReading) + Send + 'static {
        move |reading| {
            READINGS_GENERATED.inc();
            if self.tx.send(reading).is_err() {
                debug!("Dispatcher gone, reading dropped");
            }
        }
    }
}

pub fn channel() -> (ReadingSender, mpsc::UnboundedReceiver<SensorReading>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReadingSender { tx }, rx)
}

pub struct Dispatcher<D> {
    delivery: Arc<D>,
    readings: mpsc::UnboundedReceiver<SensorReading>,
    stats: Arc<DispatchStats>,
}

impl<D: Deliver> Dispatcher<D> {
    pub fn new(delivery: D, readings: mpsc::UnboundedReceiver<SensorReading>) -> Self {
        Self {
            delivery: Arc::new(delivery),
            readings,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Shared handle to the delivery, e.g. to flush its sink after `run`.
    pub fn delivery(&self) -> Arc<D> {
        Arc::clone(&self.delivery)
    }

    /// Runs until every sender is gone, then waits for in-flight deliveries.
    pub async fn run(mut self) -> DispatchSummary {
        info!(sink = %self.delivery.target(), "Dispatcher started");
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                next = self.readings.recv() => match next {
                    Some(reading) => {
                        self.stats.received.fetch_add(1, Ordering::Relaxed);
                        let delivery = Arc::clone(&self.delivery);
                        let stats = Arc::clone(&self.stats);
                        in_flight.spawn(deliver_one(delivery, stats, reading));
                    }
                    None => break,
                },
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        while in_flight.join_next().await.is_some() {}

        let summary = self.stats.summary();
        info!(
            received = summary.received,
            delivered = summary.delivered,
            failed = summary.failed,
            "Dispatcher drained"
        );
        summary
    }
}

async fn deliver_one<D: Deliver>(
    delivery: Arc<D>,
    stats: Arc<DispatchStats>,
    reading: SensorReading,
) {
    let timestamp = reading.timestamp();
    let kind = reading.kind();
    DELIVERIES_IN_FLIGHT.inc();
    let started = Instant::now();

    let result = delivery.deliver(reading).await;

    DELIVERIES_IN_FLIGHT.dec();
    DELIVERY_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
    match result {
        Ok(()) => {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
            DELIVERIES_SUCCEEDED.inc();
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            DELIVERIES_FAILED.inc();
            warn!(
                error = %e,
                timestamp,
                kind = %kind,
                sink = %delivery.target(),
                "Delivery failed, reading dropped"
            );
        }
    }
}
