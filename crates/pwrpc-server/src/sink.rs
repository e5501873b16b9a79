//! Self-Metric Publication
//!
//! The periodic tick publishes the daemon's own counters through a
//! [`ValueSink`], the counterpart of the host process's value-dispatch
//! hook. An embedding host forwards these into its metric pipeline; the
//! standalone binary logs them.

/// A single published value. `Gauge` is an instantaneous level, `Derive`
/// a monotonically growing total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Derive(u64),
}

/// The value-dispatch contract of the host process.
pub trait ValueSink: Send + Sync {
    /// Publish one value under `<type>/<type_instance>`.
    fn dispatch(&self, type_name: &str, type_instance: &str, value: MetricValue);
}

/// Sink that emits values as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ValueSink for TracingSink {
    fn dispatch(&self, type_name: &str, type_instance: &str, value: MetricValue) {
        match value {
            MetricValue::Gauge(v) => {
                tracing::debug!(type_name, type_instance, gauge = v, "self-metric")
            }
            MetricValue::Derive(v) => {
                tracing::debug!(type_name, type_instance, derive = v, "self-metric")
            }
        }
    }
}
