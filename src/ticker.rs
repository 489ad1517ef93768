//! Pulses that drive the polling cadence of each worker.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Shortest period an [`IntervalTicker`] fires at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A stream of pulses.
pub trait Ticker: Send + 'static {
    /// Waits for the next pulse.
    ///
    /// Returns `None` once the ticker has been stopped or has no pulses left.
    fn tick(&mut self) -> impl Future<Output = Option<Instant>> + Send;

    /// Stops the ticker. No pulse is produced afterwards.
    fn stop(&mut self);
}

/// Creates one [`Ticker`] per worker.
pub trait TickerFactory: Send + Sync + 'static {
    /// The ticker type handed to workers.
    type Ticker: Ticker;

    /// Creates a fresh ticker.
    fn new_ticker(&self) -> Self::Ticker;
}

/// Ticker firing every `period`, first one `period` after creation.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Option<Interval>,
}

impl IntervalTicker {
    /// Creates a ticker with the given period.
    ///
    /// Periods shorter than [`MIN_PERIOD`] are raised to it.
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_PERIOD);
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
        }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> Option<Instant> {
        match &mut self.interval {
            Some(interval) => Some(interval.tick().await),
            None => None,
        }
    }

    fn stop(&mut self) {
        self.interval = None;
    }
}

/// Builds [`IntervalTicker`]s with a shared period.
#[derive(Debug, Clone, Copy)]
pub struct IntervalTickerFactory {
    period: Duration,
}

impl IntervalTickerFactory {
    /// Tickers built by this factory fire every `period`.
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    /// The configured period.
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl TickerFactory for IntervalTickerFactory {
    type Ticker = IntervalTicker;

    fn new_ticker(&self) -> IntervalTicker {
        IntervalTicker::new(self.period)
    }
}

/// Ticker producing a fixed number of immediate pulses, then stopping.
///
/// Workers driven by it run a known number of cycles and then exit, which
/// makes worker loops deterministic under test.
#[derive(Debug, Clone)]
pub struct FixedTicker {
    remaining: usize,
}

impl FixedTicker {
    /// A ticker that pulses `ticks` times.
    pub const fn new(ticks: usize) -> Self {
        Self { remaining: ticks }
    }

    /// Pulses left before the ticker stops.
    pub const fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Ticker for FixedTicker {
    async fn tick(&mut self) -> Option<Instant> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(Instant::now())
    }

    fn stop(&mut self) {
        self.remaining = 0;
    }
}

/// Builds [`FixedTicker`]s that all pulse the same number of times.
#[derive(Debug, Clone, Copy)]
pub struct FixedTickerFactory {
    ticks: usize,
}

impl FixedTickerFactory {
    /// Tickers built by this factory pulse `ticks` times each.
    pub const fn new(ticks: usize) -> Self {
        Self { ticks }
    }
}

impl TickerFactory for FixedTickerFactory {
    type Ticker = FixedTicker;

    fn new_ticker(&self) -> FixedTicker {
        FixedTicker::new(self.ticks)
    }
}
