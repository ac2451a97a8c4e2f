pub mod bucket;
pub mod error;
pub mod generator;
pub mod range;
mod range_proptest;
pub mod reading;
pub mod source;
pub mod timebase;

pub use bucket::{bucket_key, bucketed_name, bucketed_name_at_millis, hourly_index_name};
pub use error::GeneratorError;
pub use generator::{interval_from_millis, start_stream, Generator, GeneratorStats, StreamHandle};
pub use range::{FieldRange, RpmProfile, VoltageProfile};
pub use reading::{Node, ReadingKind, RpmReading, SensorReading, VoltageReading};
pub use source::{ReadingSource, SimulatedRpmSensor, SimulatedSensor, SimulatedVoltageSensor};
pub use timebase::TimeBase;
