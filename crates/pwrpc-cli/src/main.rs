//! # pwrpcd Entry Point
//!
//! Standalone perfwatcher JSON-RPC query daemon. Serves the `pw_*` query
//! methods over HTTP, answering from a periodically refreshed snapshot of
//! the metric name index and from the on-disk data hierarchy.
//!
//! ## Usage
//!
//! ```bash
//! # Serve a data directory on port 9264
//! pwrpcd --port 9264 --data-dir /var/lib/collect
//!
//! # Settings from a config file, flags override
//! pwrpcd --config /etc/pwrpc.toml --max-clients 32
//!
//! # Listen on loopback only
//! pwrpcd --port 9264 --bind 127.0.0.1
//! ```
//!
//! When run standalone, the metric name index is derived from the data
//! directory itself (`<datadir>/<host>/<plugin>/<type>`, last-update time
//! from file mtimes). An embedding host process wires its own
//! [`pwrpc_server::NameSource`] and [`pwrpc_server::ValueSink`] instead.

use anyhow::Result;
use argh::FromArgs;
use pwrpc_server::{
    Counters, FsNameSource, HandlerContext, HttpServer, ServerConfig, SnapshotCache, Tick,
    TracingSink,
};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// perfwatcher JSON-RPC query daemon
#[derive(FromArgs)]
struct Args {
    /// path to a TOML configuration file
    ///
    /// Recognized keys: Port, MaxClients, JsonrpcCacheExpirationTime,
    /// DataDir. Command-line flags override file settings.
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// listen port (required unless set in the config file)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// address to bind the listener to
    ///
    /// Defaults to "0.0.0.0" (all interfaces). The port comes from
    /// --port or the config file.
    #[argh(option, short = 'b')]
    bind: Option<String>,

    /// root of the data directory hierarchy
    ///
    /// Defaults to the current directory.
    #[argh(option, short = 'd')]
    data_dir: Option<PathBuf>,

    /// client cap for admission control
    ///
    /// Requests beyond the cap are answered 503 immediately. Defaults
    /// to 16.
    #[argh(option)]
    max_clients: Option<u32>,

    /// snapshot expiration in seconds, 1..=3600
    ///
    /// The metric-name snapshot is rebuilt once it is older than this.
    /// Defaults to 60.
    #[argh(option)]
    cache_expiration_secs: Option<u64>,

    /// seconds between periodic ticks (self-metrics and cache refresh)
    #[argh(option, default = "10")]
    tick_interval_secs: u64,
}

fn resolve_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig {
            port: args
                .port
                .ok_or_else(|| anyhow::anyhow!("--port is required without --config"))?,
            max_clients: pwrpc_server::config::DEFAULT_MAX_CLIENTS,
            cache_expiration_secs: pwrpc_server::config::DEFAULT_CACHE_EXPIRATION_SECS,
            data_dir: PathBuf::new(),
        },
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(data_dir) = &args.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(max_clients) = args.max_clients {
        config.max_clients = max_clients;
    }
    if let Some(expiration) = args.cache_expiration_secs {
        config.cache_expiration_secs = expiration;
    }
    config.validate()?;
    Ok(config)
}

fn resolve_bind(args: &Args) -> Result<IpAddr> {
    let bind = args.bind.as_deref().unwrap_or("0.0.0.0");
    bind.parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {bind}: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    // Default log level INFO, RUST_LOG overrides.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = resolve_config(&args)?;
    let bind = resolve_bind(&args)?;
    let data_dir = config.effective_data_dir();
    tracing::info!(
        %bind,
        port = config.port,
        max_clients = config.max_clients,
        cache_expiration_secs = config.cache_expiration_secs,
        data_dir = %data_dir.display(),
        "starting pwrpcd"
    );

    let cache = Arc::new(SnapshotCache::new(config.cache_expiration_secs));
    let counters = Arc::new(Counters::new());

    let tick = Tick::new(
        Arc::clone(&cache),
        Arc::clone(&counters),
        Arc::new(FsNameSource::new(data_dir.clone())),
        Arc::new(TracingSink),
        Duration::from_secs(args.tick_interval_secs),
    );
    let tick_handle = tick.spawn();

    let ctx = HandlerContext { cache, data_dir };
    let server = HttpServer::new(ctx, counters, config.max_clients);
    let addr = SocketAddr::new(bind, config.port);

    tokio::select! {
        result = server.run(addr) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }
    tick_handle.abort();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::from_args(&["pwrpcd"], args).unwrap()
    }

    #[test]
    fn test_flags_without_config() {
        let args = parse(&["--port", "9264", "--data-dir", "/data"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.port, 9264);
        assert_eq!(config.max_clients, 16);
        assert_eq!(config.effective_data_dir(), PathBuf::from("/data"));
    }

    #[test]
    fn test_port_required_without_config() {
        let args = parse(&["--max-clients", "4"]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pwrpc.toml");
        std::fs::write(&path, "Port = 1111\nMaxClients = 8\n").unwrap();

        let args = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--port",
            "2222",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.port, 2222);
        assert_eq!(config.max_clients, 8);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = parse(&["--port", "9264", "--cache-expiration-secs", "9999"]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_default_tick_interval() {
        let args = parse(&["--port", "9264"]);
        assert_eq!(args.tick_interval_secs, 10);
    }

    #[test]
    fn test_bind_defaults_to_all_interfaces() {
        let args = parse(&["--port", "9264"]);
        let bind = resolve_bind(&args).unwrap();
        assert_eq!(bind, "0.0.0.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_bind_flag_parsed() {
        let args = parse(&["--port", "9264", "--bind", "127.0.0.1"]);
        let bind = resolve_bind(&args).unwrap();
        assert_eq!(bind, "127.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_invalid_bind_rejected() {
        let args = parse(&["--port", "9264", "--bind", "not-an-address"]);
        assert!(resolve_bind(&args).is_err());
    }
}
