//! Query Handlers
//!
//! The perfwatcher method set: two methods answering from the metric-name
//! snapshot and three listing the on-disk data hierarchy. All are
//! read-only. Caller faults return `-32602`; a missing snapshot or an
//! unreadable directory returns `-32603`.

use crate::registry::{HandlerContext, Method, Registry};
use crate::source::unix_now;
use pwrpc_common::protocol::JsonRpcError;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// The perfwatcher method table. Extended at compile time only.
pub static METHODS: &[Method] = &[
    Method {
        name: "pw_get_status",
        handler: pw_get_status,
    },
    Method {
        name: "pw_get_metric",
        handler: pw_get_metric,
    },
    Method {
        name: "pw_get_dir_hosts",
        handler: pw_get_dir_hosts,
    },
    Method {
        name: "pw_get_dir_plugins",
        handler: pw_get_dir_plugins,
    },
    Method {
        name: "pw_get_dir_types",
        handler: pw_get_dir_types,
    },
];

pub fn perfwatcher_registry() -> Registry {
    Registry::new(METHODS)
}

/// `pw_get_status`: classify each requested server as `"up"`, `"down"`
/// or `"unknown"`.
///
/// Params: `{"timeout": <seconds>, "server": [<hostname>, ...]}`.
///
/// A server is `"unknown"` when no metric of its host prefix appears in
/// the snapshot, `"up"` when its newest metric is no older than `timeout`
/// seconds, `"down"` otherwise. Servers are reported in lexicographic
/// order.
fn pw_get_status(
    ctx: &HandlerContext,
    params: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    let params = params
        .and_then(Value::as_object)
        .ok_or_else(JsonRpcError::invalid_params)?;
    let timeout = params
        .get("timeout")
        .and_then(Value::as_i64)
        .ok_or_else(JsonRpcError::invalid_params)?;
    let servers = params
        .get("server")
        .and_then(Value::as_array)
        .ok_or_else(JsonRpcError::invalid_params)?;

    // Keys are copied out of the request so the answer owns its strings.
    let mut latest: BTreeMap<String, u64> = BTreeMap::new();
    for server in servers {
        let name = server
            .as_str()
            .ok_or_else(JsonRpcError::invalid_params)?;
        latest.insert(name.to_string(), 0);
    }

    let snapshot = ctx
        .cache
        .acquire()
        .ok_or_else(JsonRpcError::internal_error)?;
    for (name, time) in snapshot.entries() {
        let host = name.split('/').next().unwrap_or(name);
        if let Some(seen) = latest.get_mut(host) {
            if time > *seen {
                *seen = time;
            }
        }
    }
    drop(snapshot);

    let now = unix_now() as i64;
    let mut states = Map::new();
    for (server, seen) in latest {
        let state = if seen == 0 {
            "unknown"
        } else if (seen as i64).saturating_add(timeout) >= now {
            "up"
        } else {
            "down"
        };
        states.insert(server, Value::String(state.to_string()));
    }

    Ok(Value::Object(states))
}

/// `pw_get_metric`: the distinct metric identifiers seen for any of the
/// requested servers, sorted lexicographically.
///
/// Params: `[<hostname>, ...]`.
fn pw_get_metric(
    ctx: &HandlerContext,
    params: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    let servers_param = params
        .and_then(Value::as_array)
        .ok_or_else(JsonRpcError::invalid_params)?;
    let mut servers: BTreeSet<String> = BTreeSet::new();
    for server in servers_param {
        let name = server
            .as_str()
            .ok_or_else(JsonRpcError::invalid_params)?;
        servers.insert(name.to_string());
    }

    let snapshot = ctx
        .cache
        .acquire()
        .ok_or_else(JsonRpcError::internal_error)?;
    let mut metrics: BTreeSet<String> = BTreeSet::new();
    for name in &snapshot.names {
        // A name without '/' carries no metric identifier; skip it.
        let Some((host, metric)) = name.split_once('/') else {
            continue;
        };
        if servers.contains(host) {
            metrics.insert(metric.to_string());
        }
    }
    drop(snapshot);

    Ok(Value::Array(
        metrics.into_iter().map(Value::String).collect(),
    ))
}

/// `pw_get_dir_hosts`: list the data directory.
fn pw_get_dir_hosts(
    ctx: &HandlerContext,
    _params: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    list_directory(&ctx.data_dir)
}

/// `pw_get_dir_plugins`: list `<datadir>/<hostname>`.
///
/// Params: `{"hostname": <string>}`.
fn pw_get_dir_plugins(
    ctx: &HandlerContext,
    params: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    let params = params
        .and_then(Value::as_object)
        .ok_or_else(JsonRpcError::invalid_params)?;
    let hostname = get_path_component(params, "hostname")?;
    list_directory(&ctx.data_dir.join(hostname))
}

/// `pw_get_dir_types`: list `<datadir>/<hostname>/<plugin>`.
///
/// Params: `{"hostname": <string>, "plugin": <string>}`.
fn pw_get_dir_types(
    ctx: &HandlerContext,
    params: Option<&Value>,
) -> Result<Value, JsonRpcError> {
    let params = params
        .and_then(Value::as_object)
        .ok_or_else(JsonRpcError::invalid_params)?;
    let hostname = get_path_component(params, "hostname")?;
    let plugin = get_path_component(params, "plugin")?;
    list_directory(&ctx.data_dir.join(hostname).join(plugin))
}

/// Fetch a string param that will be used as one path component below the
/// data directory. Rejects separators and dot entries.
fn get_path_component<'a>(
    params: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, JsonRpcError> {
    let value = params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(JsonRpcError::invalid_params)?;
    if value.contains('/') || value == "." || value == ".." {
        return Err(JsonRpcError::invalid_params());
    }
    Ok(value)
}

/// List a directory as `{"values": [...], "nb": N}` in natural directory
/// order.
fn list_directory(path: &Path) -> Result<Value, JsonRpcError> {
    let entries = std::fs::read_dir(path).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "could not open directory");
        JsonRpcError::internal_error()
    })?;

    let mut values = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|_| JsonRpcError::internal_error())?;
        values.push(entry.file_name().to_string_lossy().into_owned());
    }
    let nb = values.len();

    Ok(json!({ "values": values, "nb": nb }))
}
