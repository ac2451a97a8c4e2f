pub mod dispatch;
pub mod kafka;
pub mod metrics;
pub mod recorder;
pub mod search;
pub mod sink;
pub mod tls;

pub use dispatch::{
    channel, Deliver, DispatchSummary, Dispatcher, IndexDelivery, PublishDelivery, ReadingSender,
};
pub use kafka::{BrokerConfig, KafkaConsumer, KafkaPublisher};
pub use metrics::{init_metrics, serve_metrics};
pub use recorder::{RecordedDocument, RecordingSink};
pub use search::{SearchAuth, SearchClient, SearchConfig};
pub use sink::{
    ConsumedMessage, DocumentSink, DocumentSource, IndexOutcome, LogSink, MessageSource,
    PublishSink, SearchHit, SinkError,
};
pub use tls::{build_client_config, TlsConfig, TlsError};
