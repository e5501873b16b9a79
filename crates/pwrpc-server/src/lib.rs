//! pwrpc Server
//!
//! The concurrent request-processing engine between the HTTP listener and
//! the metric-data sources.
//!
//! # Architecture
//!
//! Three concerns interact here:
//!
//! - an HTTP front-end serving many short requests concurrently under a
//!   hard client cap with immediate 503 backpressure;
//! - a versioned, reference-counted snapshot cache of the live metric-name
//!   index, refreshed on a timer and reclaimed only when no reader holds a
//!   reference;
//! - a JSON-RPC 2.0 dispatcher that accepts single or batched calls, looks
//!   up handlers by name and composes structured error responses.
//!
//! Query handlers read a borrowed snapshot or list the on-disk data
//! hierarchy; the periodic tick, independent of any request, publishes
//! self-metrics and advances the cache.
//!
//! # Concurrency
//!
//! One task per connection; one background tick task. The snapshot table
//! is guarded by a single mutex held only across O(1) bookkeeping; the
//! expensive index copy and all filesystem walks happen outside it. The
//! four lifecycle counters are independent atomics. The method table is
//! immutable after startup.
//!
//! # Main Components
//!
//! - [`SnapshotCache`] - slot table of ref-counted name-index snapshots
//! - [`HttpServer`] - the HTTP front-end
//! - [`Tick`] - periodic self-metrics and cache refresh
//! - [`ServerConfig`] - TOML configuration
//! - [`NameSource`] / [`ValueSink`] - host-process collaborator contracts

pub mod cache;
pub mod codec;
pub mod config;
pub mod counters;
pub mod handlers;
pub mod http_server;
pub mod registry;
pub mod sink;
pub mod source;
pub mod tick;

pub use cache::{CacheStats, SnapshotCache, SnapshotRef, SLOT_COUNT};
pub use config::ServerConfig;
pub use counters::Counters;
pub use http_server::HttpServer;
pub use registry::{Handler, HandlerContext, Method, Registry};
pub use sink::{MetricValue, TracingSink, ValueSink};
pub use source::{FsNameSource, NameIndex, NameSource};
pub use tick::Tick;
