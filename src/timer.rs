use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::TimerError;

/// Source of monotonic instants.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Production clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset_us: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_us: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_us
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

/// Measures the latency of one response per stimulus onset.
#[derive(Debug)]
pub struct ResponseTimer<C: Clock = MonotonicClock> {
    clock: C,
    onset: Option<Instant>,
}

impl<C: Clock> ResponseTimer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, onset: None }
    }

    pub fn on_stimulus_shown(&mut self) {
        self.onset = Some(self.clock.now());
    }

    /// Consumes the current onset and returns the rounded latency in ms.
    ///
    /// A second read for the same onset fails with `NoOnset`.
    pub fn on_response(&mut self) -> Result<u64, TimerError> {
        let onset = self.onset.take().ok_or(TimerError::NoOnset)?;
        let elapsed = self.clock.now().saturating_duration_since(onset);
        Ok(round_ms(elapsed))
    }

    /// Drops a pending onset without reading it.
    pub fn clear(&mut self) {
        self.onset = None;
    }
}

fn round_ms(d: Duration) -> u64 {
    let micros = d.as_micros();
    ((micros + 500) / 1000) as u64
}
