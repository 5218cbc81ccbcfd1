//! Poll loop: repeated fetch + normalize, fanned out to a consumer

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::price::{BatchConsumer, PriceSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives at most one background poll loop.
///
/// `start` while a loop is running is a no-op. `stop` lets an in-flight cycle
/// finish and waits up to `stop_timeout` before aborting the task; the worker
/// slot stays locked for that wait, so a concurrent `start` only spawns once
/// the old task is gone.
pub struct PriceMonitor {
    source: Arc<dyn PriceSource>,
    stop_timeout: Duration,
    worker: Mutex<Option<Worker>>,
}

impl PriceMonitor {
    pub fn new(source: Arc<dyn PriceSource>, stop_timeout: Duration) -> Self {
        Self {
            source,
            stop_timeout,
            worker: Mutex::new(None),
        }
    }

    pub fn source(&self) -> &Arc<dyn PriceSource> {
        &self.source
    }

    /// Spawn the loop. Returns `false` if one is already running or `period` is zero.
    pub async fn start(
        &self,
        symbols: Vec<String>,
        period: Duration,
        consumer: Arc<dyn BatchConsumer>,
    ) -> bool {
        if period.is_zero() {
            warn!("⚠️ Poll interval must be positive, ignoring start");
            return false;
        }

        let mut worker = self.worker.lock().await;
        if let Some(running) = worker.as_ref() {
            if !running.handle.is_finished() {
                warn!("⚠️ Price monitor already running, ignoring start");
                return false;
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        info!(
            "🚀 Polling {} symbols every {:?} ({} source)",
            symbols.len(),
            period,
            self.source.kind()
        );
        let handle = tokio::spawn(poll_loop(
            self.source.clone(),
            symbols,
            period,
            consumer,
            shutdown_rx,
        ));
        *worker = Some(Worker { shutdown, handle });
        true
    }

    /// Signal the loop and wait for it. Returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        let mut slot = self.worker.lock().await;
        let Some(worker) = slot.take() else {
            return false;
        };

        // The receiver is gone if the task already ended
        let _ = worker.shutdown.send(true);
        let mut handle = worker.handle;
        match timeout(self.stop_timeout, &mut handle).await {
            Ok(Ok(())) => info!("🛑 Price monitor stopped"),
            Ok(Err(e)) => error!("Price monitor task ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    "Price monitor did not stop within {:?}, aborting",
                    self.stop_timeout
                );
                handle.abort();
            }
        }
        drop(slot);
        true
    }

    pub async fn state(&self) -> PollState {
        match self.worker.lock().await.as_ref() {
            Some(worker) if !worker.handle.is_finished() => PollState::Polling,
            _ => PollState::Idle,
        }
    }

    pub async fn is_active(&self) -> bool {
        self.state().await == PollState::Polling
    }
}

async fn poll_loop(
    source: Arc<dyn PriceSource>,
    symbols: Vec<String>,
    period: Duration,
    consumer: Arc<dyn BatchConsumer>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycle: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }

        cycle += 1;
        match source.latest_prices(&symbols).await {
            Ok(batch) => {
                debug!(
                    "Cycle {}: {} quotes, {} unknown, {} failed batches",
                    cycle,
                    batch.quotes.len(),
                    batch.unknown.len(),
                    batch.failures.len()
                );
                for failure in &batch.failures {
                    warn!("Cycle {}: {} feeds failed: {}", cycle, failure.feed_ids.len(), failure.error);
                }
                consumer.on_batch(&batch);
            }
            Err(e) => {
                error!("❌ Cycle {} failed: {}", cycle, e);
                consumer.on_error(&e);
            }
        }
    }

    debug!("Poll loop exited after {} cycles", cycle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fetcher::SnapshotFetcher;
    use crate::application::services::FullPriceService;
    use crate::domain::feed::FeedRegistry;
    use crate::infrastructure::retry::RetryPolicy;
    use crate::shared::errors::{FeedError, FetchError};
    use crate::shared::types::PriceBatch;
    use crate::testing::{btc_eth_registry, FakeSource};
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Collector {
        batches: SyncMutex<Vec<PriceBatch>>,
        errors: SyncMutex<usize>,
    }

    impl BatchConsumer for Collector {
        fn on_batch(&self, batch: &PriceBatch) {
            self.batches.lock().push(batch.clone());
        }

        fn on_error(&self, _error: &FeedError) {
            *self.errors.lock() += 1;
        }
    }

    fn monitor(source: Arc<FakeSource>) -> PriceMonitor {
        let registry = Arc::new(btc_eth_registry());
        let fetcher = SnapshotFetcher::new(source, RetryPolicy::none(), 20);
        PriceMonitor::new(Arc::new(FullPriceService::new(registry, fetcher)), Duration::from_secs(5))
    }

    fn symbols() -> Vec<String> {
        vec!["BTC/USD".to_string()]
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_noop() {
        let source = Arc::new(FakeSource::serving(&btc_eth_registry()));
        let monitor = monitor(source.clone());
        let collector = Arc::new(Collector::default());

        assert!(monitor.start(symbols(), Duration::from_secs(1), collector.clone()).await);
        assert!(!monitor.start(symbols(), Duration::from_secs(1), collector.clone()).await);
        assert_eq!(monitor.state().await, PollState::Polling);

        // Ticks at 0s, 1s and 2s
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(monitor.stop().await);

        assert_eq!(source.request_count(), 3);
        assert_eq!(collector.batches.lock().len(), 3);
        assert_eq!(monitor.state().await, PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_end_the_loop() {
        let source = Arc::new(FakeSource::serving(&btc_eth_registry()));
        source.fail_next(2, FetchError::Timeout);
        let monitor = monitor(source.clone());
        let collector = Arc::new(Collector::default());

        monitor.start(symbols(), Duration::from_secs(1), collector.clone()).await;
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        monitor.stop().await;

        assert_eq!(*collector.errors.lock(), 2);
        assert_eq!(collector.batches.lock().len(), 2);
        assert_eq!(collector.batches.lock()[0].quotes.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let source = Arc::new(FakeSource::serving(&btc_eth_registry()));
        let monitor = monitor(source.clone());
        let collector = Arc::new(Collector::default());

        assert!(!monitor.stop().await);
        assert!(monitor.start(symbols(), Duration::from_secs(10), collector.clone()).await);
        assert!(monitor.stop().await);
        assert!(monitor.start(symbols(), Duration::from_secs(10), collector.clone()).await);
        assert!(monitor.is_active().await);
        monitor.stop().await;
    }

    struct Stuck(FeedRegistry);

    #[async_trait]
    impl PriceSource for Stuck {
        fn kind(&self) -> &'static str {
            "stuck"
        }

        fn registry(&self) -> &FeedRegistry {
            &self.0
        }

        async fn latest_prices(&self, _symbols: &[String]) -> Result<PriceBatch, FeedError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_aborts_after_timeout() {
        let monitor = PriceMonitor::new(Arc::new(Stuck(btc_eth_registry())), Duration::from_secs(5));
        let collector = Arc::new(Collector::default());

        monitor.start(symbols(), Duration::from_secs(1), collector.clone()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = tokio::time::Instant::now();
        assert!(monitor.stop().await);
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert!(!monitor.is_active().await);
    }

    #[derive(Default)]
    struct Slow {
        registry: FeedRegistry,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl PriceSource for Slow {
        fn kind(&self) -> &'static str {
            "slow"
        }

        fn registry(&self) -> &FeedRegistry {
            &self.registry
        }

        async fn latest_prices(&self, _symbols: &[String]) -> Result<PriceBatch, FeedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(PriceBatch::empty())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_during_stop_waits_for_old_loop() {
        let source = Arc::new(Slow {
            registry: btc_eth_registry(),
            ..Default::default()
        });
        let monitor = Arc::new(PriceMonitor::new(source.clone(), Duration::from_secs(5)));
        let collector = Arc::new(Collector::default());

        assert!(monitor.start(symbols(), Duration::from_secs(1), collector.clone()).await);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stopping = tokio::spawn({
            let monitor = monitor.clone();
            async move { monitor.stop().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let started = tokio::time::Instant::now();
        assert!(monitor.start(symbols(), Duration::from_secs(1), collector.clone()).await);
        assert!(started.elapsed() >= Duration::from_millis(2_800));
        assert!(stopping.await.unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(monitor.stop().await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(collector.batches.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_rejected() {
        let source = Arc::new(FakeSource::serving(&btc_eth_registry()));
        let monitor = monitor(source.clone());
        let collector = Arc::new(Collector::default());

        assert!(!monitor.start(symbols(), Duration::ZERO, collector).await);
        assert_eq!(monitor.state().await, PollState::Idle);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.request_count(), 0);
    }
}
