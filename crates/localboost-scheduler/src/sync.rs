//! Channel sync — periodic concurrent stats collection.
//! Each tick queries every configured channel in parallel, each under its
//! own timeout, then swaps the merged snapshot in atomically. A channel
//! that fails shows up as an error entry for that tick — stale numbers
//! are never carried forward as if they were fresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use localboost_channels::ChannelRegistry;
use localboost_core::types::{ChannelError, ChannelReport, DashboardSnapshot, Platform};
use tokio::sync::{Mutex, watch};

/// Collects per-channel statistics into [`DashboardSnapshot`]s.
pub struct SyncAggregator {
    channels: ChannelRegistry,
    fetch_timeout: Duration,
    latest_tx: watch::Sender<Arc<DashboardSnapshot>>,
    /// Stop signal for the running loop, if any.
    stop: Mutex<Option<watch::Sender<bool>>>,
}

impl SyncAggregator {
    pub fn new(channels: ChannelRegistry, fetch_timeout: Duration) -> Self {
        let initial = Arc::new(DashboardSnapshot {
            channels: HashMap::new(),
            generated_at: Utc::now(),
        });
        let (latest_tx, _) = watch::channel(initial);
        Self {
            channels,
            fetch_timeout,
            latest_tx,
            stop: Mutex::new(None),
        }
    }

    /// One collection pass. Every platform gets an entry: fresh stats, an
    /// error for this tick, or an explicit unconfigured marker — never a
    /// fabricated number. The snapshot replaces the previous one whole.
    pub async fn tick(&self) -> Arc<DashboardSnapshot> {
        let started = std::time::Instant::now();
        let fetches = Platform::ALL.iter().map(|&platform| {
            let adapter = self.channels.get(platform);
            let deadline = self.fetch_timeout;
            async move {
                let Some(adapter) = adapter else {
                    return (platform, ChannelReport::Unconfigured);
                };
                if !adapter.is_configured() {
                    return (platform, ChannelReport::Unconfigured);
                }
                let report = match tokio::time::timeout(deadline, adapter.fetch_stats()).await {
                    Ok(Ok(stats)) => ChannelReport::Stats(stats),
                    Ok(Err(e)) => ChannelReport::Error(ChannelError {
                        platform,
                        reason: e.to_string(),
                        occurred_at: Utc::now(),
                    }),
                    Err(_) => ChannelReport::Error(ChannelError {
                        platform,
                        reason: format!("stats fetch timed out after {deadline:?}"),
                        occurred_at: Utc::now(),
                    }),
                };
                (platform, report)
            }
        });

        let channels: HashMap<Platform, ChannelReport> =
            join_all(fetches).await.into_iter().collect();
        let snapshot = Arc::new(DashboardSnapshot {
            channels,
            generated_at: Utc::now(),
        });
        tracing::info!(
            "📊 Sync pass done in {:?}: {} ok, {} failed, {} unconfigured",
            started.elapsed(),
            snapshot.stats_count(),
            snapshot.error_count(),
            snapshot.unconfigured_count()
        );
        self.latest_tx.send_replace(snapshot.clone());
        snapshot
    }

    /// Start the periodic loop. Idempotent: a second start replaces the
    /// running loop instead of stacking another one. The first pass runs
    /// immediately.
    pub async fn start(self: &Arc<Self>, every: Duration) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        {
            let mut slot = self.stop.lock().await;
            if let Some(previous) = slot.replace(stop_tx) {
                let _ = previous.send(true);
            }
        }

        let aggregator = self.clone();
        tokio::spawn(async move {
            tracing::info!("📊 Channel sync started (every {every:?})");
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // A pass in flight runs to completion and its
                        // snapshot lands; stop is seen on the next turn.
                        aggregator.tick().await;
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("📊 Channel sync stopped");
        });
    }

    /// Cancel future passes. One already in flight completes and its
    /// snapshot is still delivered.
    pub async fn stop(&self) {
        if let Some(stop_tx) = self.stop.lock().await.take() {
            let _ = stop_tx.send(true);
        }
    }

    /// The most recent snapshot. Empty (no channel entries) until the
    /// first pass completes.
    pub fn latest(&self) -> Arc<DashboardSnapshot> {
        self.latest_tx.borrow().clone()
    }

    /// Live snapshot feed for push consumers.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.latest_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use localboost_core::error::{LocalBoostError, Result};
    use localboost_core::traits::ChannelAdapter;
    use localboost_core::types::{ChannelSnapshot, PostReceipt};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubChannel {
        platform: Platform,
        configured: bool,
        delay: Duration,
        fail: Arc<AtomicBool>,
        fetches: Arc<AtomicUsize>,
    }

    impl StubChannel {
        fn ok(platform: Platform) -> Arc<dyn ChannelAdapter> {
            Arc::new(Self::raw(platform, true, Duration::ZERO))
        }

        fn slow(platform: Platform, delay: Duration) -> Arc<dyn ChannelAdapter> {
            Arc::new(Self::raw(platform, true, delay))
        }

        fn raw(platform: Platform, configured: bool, delay: Duration) -> Self {
            Self {
                platform,
                configured,
                delay,
                fail: Arc::new(AtomicBool::new(false)),
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ChannelAdapter for StubChannel {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn publish(&self, _content: &str, _media_urls: &[String]) -> Result<PostReceipt> {
            Err(LocalBoostError::Publish("not exercised here".into()))
        }

        async fn fetch_stats(&self) -> Result<ChannelSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(LocalBoostError::Fetch(format!("{}: api down", self.platform)));
            }
            Ok(ChannelSnapshot {
                platform: self.platform,
                followers: 100,
                impressions: 500,
                engagements: 50,
                posts_published: 3,
                collected_at: Utc::now(),
            })
        }
    }

    fn aggregator(
        adapters: Vec<Arc<dyn ChannelAdapter>>,
        timeout: Duration,
    ) -> Arc<SyncAggregator> {
        Arc::new(SyncAggregator::new(
            ChannelRegistry::from_adapters(adapters),
            timeout,
        ))
    }

    #[tokio::test]
    async fn snapshot_covers_every_platform() {
        let broken = StubChannel::raw(Platform::Twitter, true, Duration::ZERO);
        broken.fail.store(true, Ordering::SeqCst);
        let agg = aggregator(
            vec![StubChannel::ok(Platform::Facebook), Arc::new(broken)],
            Duration::from_millis(200),
        );

        let snapshot = agg.tick().await;
        assert_eq!(snapshot.channels.len(), Platform::ALL.len());
        assert_eq!(snapshot.stats_count(), 1);
        assert_eq!(snapshot.error_count(), 1);
        assert_eq!(snapshot.unconfigured_count(), 3);

        match &snapshot.channels[&Platform::Twitter] {
            ChannelReport::Error(e) => assert!(e.reason.contains("api down")),
            other => panic!("expected an error entry, got {other:?}"),
        }
        assert!(snapshot.channels[&Platform::Facebook].is_stats());
    }

    #[tokio::test]
    async fn fetches_run_concurrently() {
        let delay = Duration::from_millis(200);
        let agg = aggregator(
            vec![
                StubChannel::slow(Platform::Facebook, delay),
                StubChannel::slow(Platform::Instagram, delay),
                StubChannel::slow(Platform::Twitter, delay),
            ],
            Duration::from_secs(2),
        );

        let started = std::time::Instant::now();
        let snapshot = agg.tick().await;
        // Three sequential 200ms fetches would need 600ms.
        assert!(started.elapsed() < Duration::from_millis(550));
        assert_eq!(snapshot.stats_count(), 3);
    }

    #[tokio::test]
    async fn slow_channel_times_out_without_dragging_the_others() {
        let agg = aggregator(
            vec![
                StubChannel::slow(Platform::Facebook, Duration::from_millis(400)),
                StubChannel::ok(Platform::Twitter),
            ],
            Duration::from_millis(100),
        );

        let snapshot = agg.tick().await;
        match &snapshot.channels[&Platform::Facebook] {
            ChannelReport::Error(e) => assert!(e.reason.contains("timed out")),
            other => panic!("expected a timeout entry, got {other:?}"),
        }
        assert!(snapshot.channels[&Platform::Twitter].is_stats());
    }

    #[tokio::test]
    async fn a_failing_tick_replaces_old_stats_instead_of_reusing_them() {
        let channel = StubChannel::raw(Platform::Facebook, true, Duration::ZERO);
        let fail = channel.fail.clone();
        let agg = aggregator(vec![Arc::new(channel)], Duration::from_millis(200));

        let first = agg.tick().await;
        assert!(first.channels[&Platform::Facebook].is_stats());

        fail.store(true, Ordering::SeqCst);
        let second = agg.tick().await;
        // The old numbers are gone; this tick's failure is what shows.
        assert!(second.channels[&Platform::Facebook].is_error());
        assert!(agg.latest().channels[&Platform::Facebook].is_error());
    }

    #[tokio::test]
    async fn latest_is_empty_until_the_first_pass() {
        let agg = aggregator(vec![StubChannel::ok(Platform::Facebook)], Duration::from_millis(200));
        assert!(agg.latest().channels.is_empty());

        agg.tick().await;
        assert!(!agg.latest().channels.is_empty());
    }

    #[tokio::test]
    async fn stop_halts_future_passes() {
        let channel = StubChannel::raw(Platform::Facebook, true, Duration::ZERO);
        let fetches = channel.fetches.clone();
        let agg = aggregator(vec![Arc::new(channel)], Duration::from_millis(200));

        agg.start(Duration::from_millis(40)).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        agg.stop().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let after_stop = fetches.load(Ordering::SeqCst);
        assert!(after_stop >= 1);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn restart_replaces_the_loop_instead_of_stacking() {
        let channel = StubChannel::raw(Platform::Facebook, true, Duration::ZERO);
        let fetches = channel.fetches.clone();
        let agg = aggregator(vec![Arc::new(channel)], Duration::from_millis(200));

        agg.start(Duration::from_secs(3600)).await;
        agg.start(Duration::from_secs(3600)).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Each start runs its immediate first pass; the first loop died on
        // replacement, so no further passes accumulate.
        let settled = fetches.load(Ordering::SeqCst);
        assert!(settled <= 2);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), settled);
        agg.stop().await;
    }

    #[tokio::test]
    async fn a_pass_in_flight_when_stopped_still_delivers() {
        let agg = aggregator(
            vec![StubChannel::slow(Platform::Facebook, Duration::from_millis(150))],
            Duration::from_secs(1),
        );
        let mut feed = agg.subscribe();

        agg.start(Duration::from_secs(3600)).await;
        // The immediate first pass is now in flight; stop mid-pass.
        tokio::time::sleep(Duration::from_millis(30)).await;
        agg.stop().await;

        tokio::time::timeout(Duration::from_millis(500), feed.changed())
            .await
            .expect("snapshot should still be delivered")
            .unwrap();
        assert!(feed.borrow().channels[&Platform::Facebook].is_stats());
    }
}
