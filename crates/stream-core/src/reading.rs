//! Sensor reading model.
//!
//! Every reading kind carries a wall-clock timestamp in Unix milliseconds plus
//! its own measurement fields. Readings serialize with a `kind` tag so a
//! consumer can tell the variants apart on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Node label attached to voltage readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Node {
    A,
    B,
    C,
}

impl Node {
    pub const ALL: [Node; 3] = [Node::A, Node::B, Node::C];

    /// Maps a uniform draw in `[0, 1)` onto the three labels.
    ///
    /// The partition is `[0, 1/3) -> a`, `[1/3, 2/3) -> b`, `[2/3, 1) -> c`.
    /// Values below zero map to `a`; values at or above one (and NaN) map to `c`.
    pub fn from_unit(u: f64) -> Self {
        if u < 1.0 / 3.0 {
            Node::A
        } else if u < 2.0 / 3.0 {
            Node::B
        } else {
            Node::C
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::A => "a",
            Node::B => "b",
            Node::C => "c",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageReading {
    pub timestamp: u64,
    pub voltage: f64,
    pub temperature: f64,
    pub node: Node,
}

/// Motor reading. Numeric fields travel as strings (`"rpm": "1432"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpmReading {
    pub timestamp: u64,
    #[serde(with = "string_encoded")]
    pub rpm: f64,
    #[serde(with = "string_encoded")]
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorReading {
    Voltage(VoltageReading),
    Rpm(RpmReading),
}

impl SensorReading {
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Voltage(r) => r.timestamp,
            Self::Rpm(r) => r.timestamp,
        }
    }

    pub fn kind(&self) -> ReadingKind {
        match self {
            Self::Voltage(_) => ReadingKind::Voltage,
            Self::Rpm(_) => ReadingKind::Rpm,
        }
    }

    /// Message key used when publishing to a broker.
    pub fn partition_key(&self) -> String {
        match self {
            Self::Voltage(r) => format!("node-{}", r.node),
            Self::Rpm(_) => ReadingKind::Rpm.to_string(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl From<VoltageReading> for SensorReading {
    fn from(r: VoltageReading) -> Self {
        Self::Voltage(r)
    }
}

impl From<RpmReading> for SensorReading {
    fn from(r: RpmReading) -> Self {
        Self::Rpm(r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingKind {
    Voltage,
    Rpm,
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voltage => f.write_str("voltage"),
            Self::Rpm => f.write_str("rpm"),
        }
    }
}

impl FromStr for ReadingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "voltage" => Ok(Self::Voltage),
            "rpm" => Ok(Self::Rpm),
            other => Err(format!("unknown reading kind '{other}' (expected voltage|rpm)")),
        }
    }
}

mod string_encoded {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse::<f64>().map_err(D::Error::custom)
    }
}
