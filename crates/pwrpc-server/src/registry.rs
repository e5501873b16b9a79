//! Method Registry
//!
//! A static, ordered table of `(name, handler)` pairs with exact-match
//! lookup. The table is immutable after startup and read without locking;
//! the handful of methods makes a linear scan the right tool. New methods
//! are added at compile time in [`crate::handlers`].

use crate::cache::SnapshotCache;
use pwrpc_common::protocol::JsonRpcError;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared read-only state handed to every handler.
pub struct HandlerContext {
    /// Snapshot cache of the metric name index
    pub cache: Arc<SnapshotCache>,
    /// Root of the on-disk data hierarchy
    pub data_dir: PathBuf,
}

/// A query handler.
///
/// On success the returned value becomes the envelope's `result` field.
/// Caller faults come back as [`JsonRpcError`] with a canonical code;
/// anything else an error maps to `-32603`.
pub type Handler = fn(&HandlerContext, Option<&Value>) -> Result<Value, JsonRpcError>;

pub struct Method {
    pub name: &'static str,
    pub handler: Handler,
}

pub struct Registry {
    methods: &'static [Method],
}

impl Registry {
    pub fn new(methods: &'static [Method]) -> Self {
        Self { methods }
    }

    /// Exact-match linear lookup.
    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.handler)
    }
}
