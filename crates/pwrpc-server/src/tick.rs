//! Periodic Tick
//!
//! A background task that runs independently of any request: each tick
//! publishes the daemon's self-metrics through the [`ValueSink`] and then
//! drives [`SnapshotCache::refresh`]. The tick is the only writer of the
//! snapshot table.

use crate::cache::SnapshotCache;
use crate::counters::Counters;
use crate::sink::{MetricValue, ValueSink};
use crate::source::NameSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Tick {
    cache: Arc<SnapshotCache>,
    counters: Arc<Counters>,
    source: Arc<dyn NameSource>,
    sink: Arc<dyn ValueSink>,
    interval: Duration,
}

impl Tick {
    pub fn new(
        cache: Arc<SnapshotCache>,
        counters: Arc<Counters>,
        source: Arc<dyn NameSource>,
        sink: Arc<dyn ValueSink>,
        interval: Duration,
    ) -> Self {
        Self {
            cache,
            counters,
            source,
            sink,
            interval,
        }
    }

    /// Start the tick loop.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "periodic tick started");
            let mut interval = tokio::time::interval(self.interval);
            loop {
                interval.tick().await;
                let tick = self.clone();
                // get_names may block on the host's index or the
                // filesystem; keep it off the async workers.
                if tokio::task::spawn_blocking(move || tick.tick_once())
                    .await
                    .is_err()
                {
                    warn!("tick task panicked");
                }
            }
        })
    }

    /// One tick: publish self-metrics, then refresh the snapshot cache.
    pub fn tick_once(&self) {
        let counters = self.counters.snapshot();
        self.sink.dispatch(
            "current_connections",
            "nb_clients",
            MetricValue::Gauge(counters.active_clients as f64),
        );
        self.sink.dispatch(
            "total_requests",
            "nb_request_failed",
            MetricValue::Derive(counters.request_failed),
        );
        self.sink.dispatch(
            "total_requests",
            "nb_request_succeeded",
            MetricValue::Derive(counters.request_success),
        );
        self.sink.dispatch(
            "http_requests",
            "nb_connections",
            MetricValue::Derive(counters.new_connections),
        );

        if let Err(e) = self.cache.refresh(self.source.as_ref()) {
            warn!(error = %e, "snapshot cache refresh failed");
        }

        let stats = self.cache.stats();
        self.sink.dispatch(
            "cache_size",
            "nb_used_cached",
            MetricValue::Gauge(stats.ready_count as f64),
        );
        for (slot, refs) in stats.slot_refs.iter().enumerate() {
            self.sink.dispatch(
                "cache_entries",
                &slot.to_string(),
                MetricValue::Gauge(*refs as f64),
            );
        }
        self.sink
            .dispatch("nb_values", "", MetricValue::Gauge(stats.current_len as f64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SLOT_COUNT;
    use crate::sink::test_support::RecordingSink;
    use crate::source::NameIndex;
    use pwrpc_common::protocol::Result;

    struct OneEntrySource;

    impl NameSource for OneEntrySource {
        fn get_names(&self) -> Result<NameIndex> {
            Ok(NameIndex {
                names: vec!["a/cpu/idle".into()],
                times: vec![10],
            })
        }
    }

    fn tick_with_recording() -> (Tick, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let tick = Tick::new(
            Arc::new(SnapshotCache::new(60)),
            Arc::new(Counters::new()),
            Arc::new(OneEntrySource),
            sink.clone(),
            Duration::from_secs(10),
        );
        (tick, sink)
    }

    #[test]
    fn test_tick_publishes_all_series() {
        let (tick, sink) = tick_with_recording();
        tick.tick_once();

        let values = sink.values.lock().unwrap();
        let series: Vec<(String, String)> = values
            .iter()
            .map(|(t, i, _)| (t.clone(), i.clone()))
            .collect();

        assert!(series.contains(&("current_connections".into(), "nb_clients".into())));
        assert!(series.contains(&("total_requests".into(), "nb_request_failed".into())));
        assert!(series.contains(&("total_requests".into(), "nb_request_succeeded".into())));
        assert!(series.contains(&("http_requests".into(), "nb_connections".into())));
        assert!(series.contains(&("cache_size".into(), "nb_used_cached".into())));
        for slot in 0..SLOT_COUNT {
            assert!(series.contains(&("cache_entries".into(), slot.to_string())));
        }
        assert!(series.contains(&("nb_values".into(), String::new())));
    }

    #[test]
    fn test_tick_refreshes_cache() {
        let (tick, sink) = tick_with_recording();
        tick.tick_once();

        let values = sink.values.lock().unwrap();
        // After the refresh the current snapshot holds one entry.
        let nb_values = values
            .iter()
            .find(|(t, _, _)| t == "nb_values")
            .map(|(_, _, v)| *v)
            .unwrap();
        assert_eq!(nb_values, MetricValue::Gauge(1.0));

        let ready = values
            .iter()
            .find(|(t, _, _)| t == "cache_size")
            .map(|(_, _, v)| *v)
            .unwrap();
        assert_eq!(ready, MetricValue::Gauge(1.0));
    }

    #[test]
    fn test_tick_counts_follow_counters() {
        let (tick, sink) = tick_with_recording();
        tick.counters.record_success(3);
        tick.counters.record_failure(2);
        tick.tick_once();

        let values = sink.values.lock().unwrap();
        let succeeded = values
            .iter()
            .find(|(_, i, _)| i == "nb_request_succeeded")
            .map(|(_, _, v)| *v)
            .unwrap();
        assert_eq!(succeeded, MetricValue::Derive(3));

        let failed = values
            .iter()
            .find(|(_, i, _)| i == "nb_request_failed")
            .map(|(_, _, v)| *v)
            .unwrap();
        assert_eq!(failed, MetricValue::Derive(2));
    }
}
