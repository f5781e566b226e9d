//! Scheduling for the scan loop: a ticker abstraction with cancellation.
//!
//! The original system hard-coded fixed-interval polling loops inside its
//! chain-watching code. Splitting the "when" (ticker) from the "what"
//! (scanner) lets production run on a tokio interval while tests drive
//! cycles one at a time.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

/// Drives the scan loop. `tick` resolves `true` when the next cycle should
/// run and `false` when the loop should stop.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self) -> bool;
}

// ---------------------------------------------------------------------------
// IntervalTicker
// ---------------------------------------------------------------------------

/// Production ticker: fires every `period` until cancelled.
pub struct IntervalTicker {
    interval: tokio::time::Interval,
    cancelled: watch::Receiver<bool>,
}

/// Cancels the loop attached to an [`IntervalTicker`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // Receiver side treats a dropped sender as cancellation too, so
        // the send result is irrelevant.
        let _ = self.tx.send(true);
    }
}

impl IntervalTicker {
    #[must_use]
    pub fn new(period: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        (
            Self {
                interval,
                cancelled: rx,
            },
            CancelHandle { tx },
        )
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        if *self.cancelled.borrow() {
            return false;
        }
        tokio::select! {
            _ = self.interval.tick() => true,
            changed = self.cancelled.changed() => match changed {
                Ok(()) => !*self.cancelled.borrow(),
                // Sender dropped: stop.
                Err(_) => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ManualTicker
// ---------------------------------------------------------------------------

/// Test ticker: fires exactly when the handle says so.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Drives a [`ManualTicker`] one cycle at a time.
#[derive(Debug, Clone)]
pub struct ManualTickerHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    #[must_use]
    pub fn new() -> (Self, ManualTickerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTickerHandle { tx })
    }
}

impl ManualTickerHandle {
    /// Queue one scan cycle.
    pub fn step(&self) {
        let _ = self.tx.send(());
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        // Channel closed (all handles dropped) means stop.
        self.rx.recv().await.is_some()
    }
}
