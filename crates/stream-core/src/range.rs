use crate::error::GeneratorError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Half-open value range `[min, max)` for a continuous field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldRange {
    min: f64,
    max: f64,
}

impl FieldRange {
    pub fn new(min: f64, max: f64) -> Result<Self, GeneratorError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(GeneratorError::invalid(format!(
                "range bounds must be finite, got [{min}, {max})"
            )));
        }
        if min >= max {
            return Err(GeneratorError::invalid(format!(
                "range min must be below max, got [{min}, {max})"
            )));
        }
        Ok(Self { min, max })
    }

    // Only for the built-in defaults, which are known to be valid.
    const fn fixed(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    /// Whole-step draw: `min + floor(u * (max - min))`.
    pub fn sample_whole<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let span = self.max - self.min;
        let value = (rng.gen::<f64>() * span).floor() + self.min;
        if value < self.max {
            value
        } else {
            self.min
        }
    }

    /// Whole-step draw plus a fractional jitter below one unit, kept inside the range.
    pub fn sample_with_jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let whole = self.sample_whole(rng);
        let headroom = (self.max - whole).min(1.0);
        let value = whole + rng.gen::<f64>() * headroom;
        if value < self.max {
            value
        } else {
            whole
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageProfile {
    pub voltage: FieldRange,
    pub temperature: FieldRange,
}

impl Default for VoltageProfile {
    fn default() -> Self {
        Self {
            voltage: FieldRange::fixed(3.0, 10.0),
            temperature: FieldRange::fixed(80.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RpmProfile {
    pub rpm: FieldRange,
    pub temperature: FieldRange,
}

impl Default for RpmProfile {
    fn default() -> Self {
        Self {
            rpm: FieldRange::fixed(1000.0, 3000.0),
            temperature: FieldRange::fixed(60.0, 90.0),
        }
    }
}
