//! Periodic reading generator.
//!
//! A stream runs on its own thread. Each tick samples the clock, builds one
//! reading from the configured [`ReadingSource`] and hands it to the caller's
//! callback. Deadlines advance by a fixed interval from the start instant, so a
//! late tick fires immediately instead of being dropped.

use crate::error::GeneratorError;
use crate::reading::SensorReading;
use crate::source::{ReadingSource, SimulatedVoltageSensor};
use crate::timebase::TimeBase;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct GeneratorStats {
    pub ticks_emitted: u64,
    /// Ticks that fired a full interval or more behind their deadline.
    pub ticks_late: u64,
    pub max_lag_us: u64,
}

/// Validates a signed millisecond interval as read from flags or env.
pub fn interval_from_millis(ms: i64) -> Result<Duration, GeneratorError> {
    if ms <= 0 {
        return Err(GeneratorError::invalid(format!(
            "interval must be positive, got {ms}ms"
        )));
    }
    Ok(Duration::from_millis(ms as u64))
}

fn validate_interval(interval: Duration) -> Result<(), GeneratorError> {
    if interval.is_zero() {
        return Err(GeneratorError::invalid("interval must be positive, got 0"));
    }
    Ok(())
}

/// Starts a voltage-reading stream with the default profile.
pub fn start_stream<F>(interval: Duration, on_reading: F) -> Result<StreamHandle, GeneratorError>
where
    F: FnMut(SensorReading) + Send + 'static,
{
    Generator::new(SimulatedVoltageSensor::default()).start(interval, on_reading)
}

struct Shared {
    stopped: AtomicBool,
    // Serializes `stop` against the worker's pre-tick check.
    gate: Mutex<()>,
    wake: Condvar,
    ticks_emitted: AtomicU64,
    ticks_late: AtomicU64,
    max_lag_us: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            gate: Mutex::new(()),
            wake: Condvar::new(),
            ticks_emitted: AtomicU64::new(0),
            ticks_late: AtomicU64::new(0),
            max_lag_us: AtomicU64::new(0),
        }
    }

    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks until `deadline`, returning `None` once the stream is stopped.
    fn wait_until<'a>(
        &'a self,
        mut gate: MutexGuard<'a, ()>,
        deadline: Instant,
    ) -> Option<MutexGuard<'a, ()>> {
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return Some(gate);
            }
            gate = match self.wake.wait_timeout(gate, deadline - now) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

pub struct Generator<S: ReadingSource> {
    source: S,
    timebase: TimeBase,
}

impl<S: ReadingSource + 'static> Generator<S> {
    pub fn new(source: S) -> Self {
        Self::with_timebase(source, TimeBase::new())
    }

    pub fn with_timebase(source: S, timebase: TimeBase) -> Self {
        Self { source, timebase }
    }

    /// Arms the schedule. Fails before spawning anything if `interval` is zero.
    pub fn start<F>(
        self,
        interval: Duration,
        on_reading: F,
    ) -> Result<StreamHandle, GeneratorError>
    where
        F: FnMut(SensorReading) + Send + 'static,
    {
        validate_interval(interval)?;

        let shared = Arc::new(Shared::new());
        let worker_shared = Arc::clone(&shared);
        let kind = self.source.kind();
        let worker = thread::Builder::new()
            .name(format!("generator-{kind}"))
            .spawn(move || self.run(interval, on_reading, &worker_shared))?;
        let worker_id = worker.thread().id();

        debug!(
            "reading stream started (kind={}, interval_ms={})",
            kind,
            interval.as_millis()
        );

        Ok(StreamHandle {
            shared,
            worker: Mutex::new(Some(worker)),
            worker_id,
            interval,
        })
    }

    fn run<F>(mut self, interval: Duration, mut on_reading: F, shared: &Shared)
    where
        F: FnMut(SensorReading),
    {
        let mut next_tick = Instant::now() + interval;
        let mut last_timestamp_ms = 0u64;

        loop {
            // The gate covers only the stop check, never the callback.
            if shared.wait_until(shared.lock_gate(), next_tick).is_none() {
                break;
            }

            let lag = Instant::now().saturating_duration_since(next_tick);
            if lag >= interval {
                shared.ticks_late.fetch_add(1, Ordering::Relaxed);
            }
            shared
                .max_lag_us
                .fetch_max(lag.as_micros() as u64, Ordering::Relaxed);

            // Wall clock may step backwards; readings must not.
            let timestamp_ms = self.timebase.unix_ms().max(last_timestamp_ms);
            last_timestamp_ms = timestamp_ms;

            on_reading(self.source.sample(timestamp_ms));
            shared.ticks_emitted.fetch_add(1, Ordering::Relaxed);

            next_tick += interval;
        }

        debug!(
            "reading stream stopped after {} ticks in {} ms",
            shared.ticks_emitted.load(Ordering::Relaxed),
            self.timebase.now_us() / 1000
        );
    }
}

/// Controls a running stream. Dropping the handle stops the stream and waits
/// for the generator thread to exit.
pub struct StreamHandle {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    interval: Duration,
}

impl StreamHandle {
    /// Stops the schedule. No tick fires after this returns.
    ///
    /// Does not wait for a callback that is already running, nor for work it
    /// handed off. Safe to call repeatedly, from any thread, including from
    /// inside the callback itself.
    pub fn stop(&self) {
        let _gate = self.shared.lock_gate();
        self.shared.stopped.store(true, Ordering::Release);
        self.shared.wake.notify_all();
    }

    /// Blocks until the generator thread has exited. Call after [`stop`].
    ///
    /// A no-op when called from the generator thread or after a previous join.
    ///
    /// [`stop`]: StreamHandle::stop
    pub fn join(&self) {
        if thread::current().id() == self.worker_id {
            return;
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("generator thread panicked inside the reading callback");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            ticks_emitted: self.shared.ticks_emitted.load(Ordering::Relaxed),
            ticks_late: self.shared.ticks_late.load(Ordering::Relaxed),
            max_lag_us: self.shared.max_lag_us.load(Ordering::Relaxed),
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
