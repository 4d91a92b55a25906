/*
[INPUT]:  Arm/cancel requests from the session facade
[OUTPUT]: Periodic refresh ticks on a channel
[POS]:    Session layer - proactive token renewal timer
[UPDATE]: When changing refresh cadence or timer ownership
*/

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default cadence, well inside the access token lifetime
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(9 * 60);

/// Sent each time the armed timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTick {
    /// Arm generation that produced the tick
    pub generation: u64,
}

/// Two-state timer: idle, or armed with exactly one running task.
///
/// The scheduler never calls refresh itself; it only sends [`RefreshTick`]s
/// to whoever owns the receiver.
#[derive(Debug)]
pub struct RefreshScheduler {
    interval: Duration,
    tick_tx: mpsc::UnboundedSender<RefreshTick>,
    timer: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
}

impl RefreshScheduler {
    /// A zero `interval` falls back to [`DEFAULT_REFRESH_INTERVAL`]
    pub fn new(interval: Duration) -> (Self, mpsc::UnboundedReceiver<RefreshTick>) {
        let interval = if interval.is_zero() {
            warn!("zero refresh interval, using the default");
            DEFAULT_REFRESH_INTERVAL
        } else {
            interval
        };
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            interval,
            tick_tx,
            timer: Mutex::new(None),
            generation: AtomicU64::new(0),
        };
        (scheduler, tick_rx)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Cancel any running timer and start a fresh one. Must run inside a tokio runtime.
    pub fn arm(&self) {
        let Ok(mut timer) = self.timer.lock() else {
            return;
        };
        if let Some(previous) = timer.take() {
            previous.cancel();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        *timer = Some(token.clone());

        let interval = self.interval;
        let tick_tx = self.tick_tx.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        trace!(generation, "refresh timer fired");
                        if tick_tx.send(RefreshTick { generation }).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        debug!(generation, interval_secs = interval.as_secs(), "refresh scheduler armed");
    }

    /// Stop the running timer, if any
    pub fn cancel(&self) {
        let Ok(mut timer) = self.timer.lock() else {
            return;
        };
        if let Some(token) = timer.take() {
            token.cancel();
            debug!("refresh scheduler cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.lock().map(|t| t.is_some()).unwrap_or(false)
    }

    /// Whether `tick` came from the timer that is currently armed
    pub fn is_current(&self, tick: RefreshTick) -> bool {
        self.is_armed() && tick.generation == self.generation.load(Ordering::SeqCst)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn test_idle_until_armed() {
        let (scheduler, mut ticks) = RefreshScheduler::new(Duration::from_secs(60));
        assert!(!scheduler.is_armed());

        advance(Duration::from_secs(600)).await;
        assert!(ticks.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_interval() {
        let (scheduler, mut ticks) = RefreshScheduler::new(Duration::from_secs(60));
        scheduler.arm();

        let first = ticks.recv().await.unwrap();
        let second = ticks.recv().await.unwrap();
        assert_eq!(first.generation, second.generation);
        assert!(scheduler.is_current(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_timer() {
        let (scheduler, mut ticks) = RefreshScheduler::new(Duration::from_secs(60));
        scheduler.arm();
        advance(Duration::from_secs(30)).await;
        scheduler.arm();

        let tick = ticks.recv().await.unwrap();
        assert_eq!(tick.generation, 2);
        assert!(scheduler.is_current(tick));
        assert!(!scheduler.is_current(RefreshTick { generation: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_uses_default() {
        let (scheduler, mut ticks) = RefreshScheduler::new(Duration::ZERO);
        assert_eq!(scheduler.interval(), DEFAULT_REFRESH_INTERVAL);

        scheduler.arm();
        let tick = ticks.recv().await.unwrap();
        assert!(scheduler.is_current(tick));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let (scheduler, mut ticks) = RefreshScheduler::new(Duration::from_secs(60));
        scheduler.arm();
        scheduler.cancel();
        assert!(!scheduler.is_armed());

        let waited = timeout(Duration::from_secs(600), ticks.recv()).await;
        assert!(waited.is_err(), "no tick expected after cancel");
    }
}
