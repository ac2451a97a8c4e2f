use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since start.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Wall-clock milliseconds since Unix epoch, used as the reading timestamp.
    pub fn unix_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_ms_is_after_2020() {
        let tb = TimeBase::new();
        assert!(tb.unix_ms() > 1_577_836_800_000);
    }

    #[test]
    fn now_us_advances() {
        let tb = TimeBase::new();
        let a = tb.now_us();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(tb.now_us() > a);
    }
}
