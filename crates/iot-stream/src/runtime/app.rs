use crate::runtime::config::{Command, ConfigError, RuntimeConfig, SinkKind};
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use std::sync::Arc;
use std::time::Duration;
use stream_core::{interval_from_millis, Generator, GeneratorError, SimulatedSensor};
use stream_io::{
    channel, Deliver, DispatchSummary, Dispatcher, DocumentSource, IndexDelivery, KafkaConsumer,
    KafkaPublisher, LogSink, MessageSource, PublishDelivery, RecordingSink, SearchClient,
    SinkError,
};
use thiserror::Error;
use tracing::{debug, info, warn};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Generator(GeneratorError::InvalidConfiguration(_)) => 2,
            _ => 1,
        }
    }
}

pub fn run_from_args() -> Result<(), AppError> {
    // A missing .env is normal; variables may come from the environment.
    let _ = dotenvy::dotenv();
    let config = RuntimeConfig::from_env()?;
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    let _log_guard = init_tracing(config.json_logs, config.log_dir.as_deref());

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match config.command {
            Command::Produce => produce(&config).await,
            Command::Consume => consume(&config).await,
            Command::Search => search(&config).await,
        }
    })
}

async fn produce(config: &RuntimeConfig) -> Result<(), AppError> {
    let interval = interval_from_millis(config.interval_ms)?;

    match config.sink {
        SinkKind::Kafka => {
            let publisher = KafkaPublisher::new(&config.broker)?;
            let delivery = PublishDelivery::new(publisher, config.broker.topic.clone());
            let (delivery, _) = stream_to(config, interval, delivery).await?;
            tokio::task::spawn_blocking(move || delivery.sink().flush(FLUSH_TIMEOUT)).await??;
        }
        SinkKind::Elastic => {
            let client = SearchClient::new(&config.search)?;
            info!(url = %client.base_url(), "Search client ready");
            let delivery = IndexDelivery::new(client, config.index_base.clone());
            stream_to(config, interval, delivery).await?;
        }
        SinkKind::Log => {
            let delivery = PublishDelivery::new(LogSink, config.broker.topic.clone());
            stream_to(config, interval, delivery).await?;
        }
        SinkKind::File => {
            let path = config
                .record_path
                .as_deref()
                .ok_or(ConfigError::MissingRecordPath)?;
            let recorder = RecordingSink::new(path)?;
            info!(path = %path.display(), "Recording readings");
            let delivery = IndexDelivery::new(recorder, config.index_base.clone());
            stream_to(config, interval, delivery).await?;
        }
    }

    Ok(())
}

/// Runs the generator into `delivery` until shutdown, then drains in-flight deliveries.
async fn stream_to<D: Deliver>(
    config: &RuntimeConfig,
    interval: Duration,
    delivery: D,
) -> Result<(Arc<D>, DispatchSummary), AppError> {
    let (sender, readings) = channel();
    let dispatcher = Dispatcher::new(delivery, readings);
    let delivery = dispatcher.delivery();
    let dispatch_task = tokio::spawn(dispatcher.run());

    let handle = Generator::new(SimulatedSensor::for_kind(config.reading))
        .start(interval, sender.into_callback())?;

    info!(
        reading = %config.reading,
        interval_ms = handle.interval().as_millis() as u64,
        sink = %config.sink,
        destination = %delivery.target(),
        "Generator started"
    );

    shutdown_signal(config.run_seconds).await;

    handle.stop();
    // The channel closes once the generator thread exits.
    let handle = tokio::task::spawn_blocking(move || {
        handle.join();
        handle
    })
    .await?;
    let stats = handle.stats();

    let summary = dispatch_task.await?;
    info!(
        ticks_emitted = stats.ticks_emitted,
        ticks_late = stats.ticks_late,
        max_lag_us = stats.max_lag_us,
        delivered = summary.delivered,
        failed = summary.failed,
        "Run complete"
    );

    Ok((delivery, summary))
}

async fn consume(config: &RuntimeConfig) -> Result<(), AppError> {
    let consumer = KafkaConsumer::new(&config.broker)?;

    let received = consumer
        .consume(shutdown_signal(config.run_seconds), |message| {
            debug!(
                partition = message.partition,
                offset = message.offset,
                "Message received"
            );
            println!(
                "{}: {}",
                message.key.as_deref().unwrap_or("-"),
                message.value.as_deref().unwrap_or("")
            );
        })
        .await?;

    info!(received, "Consume finished");
    Ok(())
}

async fn search(config: &RuntimeConfig) -> Result<(), AppError> {
    let client = SearchClient::new(&config.search)?;
    let hits = client
        .search(
            &config.search_index,
            serde_json::json!({ "match_all": {} }),
        )
        .await?;

    for hit in &hits {
        println!("{}", serde_json::to_string(hit)?);
    }
    info!(index = %config.search_index, hits = hits.len(), "Search finished");
    Ok(())
}

async fn shutdown_signal(run_seconds: Option<u64>) {
    match run_seconds {
        Some(seconds) => {
            info!(seconds, "Running for limited duration");
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }
        None => match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        },
    }
}
