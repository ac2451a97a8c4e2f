use crate::range::{RpmProfile, VoltageProfile};
use crate::reading::{Node, ReadingKind, RpmReading, SensorReading, VoltageReading};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces one reading per generator tick.
pub trait ReadingSource: Send {
    fn kind(&self) -> ReadingKind;
    fn sample(&mut self, timestamp_ms: u64) -> SensorReading;
}

/// Simulated node-tagged voltage/temperature sensor.
#[derive(Debug, Clone)]
pub struct SimulatedVoltageSensor {
    profile: VoltageProfile,
    rng: StdRng,
}

impl SimulatedVoltageSensor {
    pub fn new(profile: VoltageProfile) -> Self {
        Self {
            profile,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(profile: VoltageProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SimulatedVoltageSensor {
    fn default() -> Self {
        Self::new(VoltageProfile::default())
    }
}

impl ReadingSource for SimulatedVoltageSensor {
    fn kind(&self) -> ReadingKind {
        ReadingKind::Voltage
    }

    fn sample(&mut self, timestamp_ms: u64) -> SensorReading {
        let voltage = self.profile.voltage.sample_whole(&mut self.rng);
        let temperature = self.profile.temperature.sample_with_jitter(&mut self.rng);
        let node = Node::from_unit(self.rng.gen::<f64>());
        SensorReading::Voltage(VoltageReading {
            timestamp: timestamp_ms,
            voltage,
            temperature,
            node,
        })
    }
}

/// Simulated motor sensor reporting rpm and temperature.
#[derive(Debug, Clone)]
pub struct SimulatedRpmSensor {
    profile: RpmProfile,
    rng: StdRng,
}

impl SimulatedRpmSensor {
    pub fn new(profile: RpmProfile) -> Self {
        Self {
            profile,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(profile: RpmProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SimulatedRpmSensor {
    fn default() -> Self {
        Self::new(RpmProfile::default())
    }
}

impl ReadingSource for SimulatedRpmSensor {
    fn kind(&self) -> ReadingKind {
        ReadingKind::Rpm
    }

    fn sample(&mut self, timestamp_ms: u64) -> SensorReading {
        let rpm = self.profile.rpm.sample_whole(&mut self.rng);
        let temperature = self.profile.temperature.sample_with_jitter(&mut self.rng);
        SensorReading::Rpm(RpmReading {
            timestamp: timestamp_ms,
            rpm,
            temperature,
        })
    }
}

/// Runtime-selected simulated sensor.
#[derive(Debug, Clone)]
pub enum SimulatedSensor {
    Voltage(SimulatedVoltageSensor),
    Rpm(SimulatedRpmSensor),
}

impl SimulatedSensor {
    pub fn for_kind(kind: ReadingKind) -> Self {
        match kind {
            ReadingKind::Voltage => Self::Voltage(SimulatedVoltageSensor::default()),
            ReadingKind::Rpm => Self::Rpm(SimulatedRpmSensor::default()),
        }
    }
}

impl ReadingSource for SimulatedSensor {
    fn kind(&self) -> ReadingKind {
        match self {
            Self::Voltage(s) => s.kind(),
            Self::Rpm(s) => s.kind(),
        }
    }

    fn sample(&mut self, timestamp_ms: u64) -> SensorReading {
        match self {
            Self::Voltage(s) => s.sample(timestamp_ms),
            Self::Rpm(s) => s.sample(timestamp_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn voltage_fields_stay_in_default_ranges() {
        let profile = VoltageProfile::default();
        let mut sensor = SimulatedVoltageSensor::with_seed(profile, 42);
        for ts in 0..10_000 {
            match sensor.sample(ts) {
                SensorReading::Voltage(r) => {
                    assert!(profile.voltage.contains(r.voltage));
                    assert_eq!(r.voltage.fract(), 0.0);
                    assert!(profile.temperature.contains(r.temperature));
                    assert_eq!(r.timestamp, ts);
                }
                other => panic!("unexpected reading {other:?}"),
            }
        }
    }

    #[test]
    fn node_distribution_is_roughly_uniform() {
        let mut sensor = SimulatedVoltageSensor::with_seed(VoltageProfile::default(), 1234);
        let mut counts: HashMap<Node, usize> = HashMap::new();
        let draws = 10_000;
        for ts in 0..draws {
            if let SensorReading::Voltage(r) = sensor.sample(ts) {
                *counts.entry(r.node).or_default() += 1;
            }
        }
        for node in Node::ALL {
            let share = counts.get(&node).copied().unwrap_or(0) as f64 / draws as f64;
            assert!(
                (share - 1.0 / 3.0).abs() < 0.03,
                "node {node} share {share:.4} outside tolerance"
            );
        }
    }

    #[test]
    fn rpm_fields_stay_in_default_ranges() {
        let profile = RpmProfile::default();
        let mut sensor = SimulatedRpmSensor::with_seed(profile, 9);
        for ts in 0..10_000 {
            match sensor.sample(ts) {
                SensorReading::Rpm(r) => {
                    assert!(profile.rpm.contains(r.rpm));
                    assert!(profile.temperature.contains(r.temperature));
                }
                other => panic!("unexpected reading {other:?}"),
            }
        }
    }

    #[test]
    fn simulated_sensor_dispatches_by_kind() {
        let mut sensor = SimulatedSensor::for_kind(ReadingKind::Rpm);
        assert_eq!(sensor.kind(), ReadingKind::Rpm);
        assert_eq!(sensor.sample(5).kind(), ReadingKind::Rpm);
    }
}
