//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use windmill_core::stream::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_IDLE_INTERVAL};
use windmill_core::StreamConfig;

/// Default address to listen on.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default API key accepted by the ingestion endpoint.
pub const DEFAULT_API_KEY: &str = "dev-secret-key";

/// Default age after which a device is reported offline, in seconds.
pub const DEFAULT_OFFLINE_THRESHOLD_SECS: u64 = 300;

/// Windmill Monitor gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "windmill-gateway")]
#[command(version, about = "HTTP gateway for Windmill Monitor")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,

    /// Port to listen on. Overrides the port part of --listen.
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Path to the reading storage directory.
    #[arg(short, long, env = "DATA_PATH", default_value = "./data")]
    pub data_path: PathBuf,

    /// API key required by the ingestion endpoint (x-api-key header).
    #[arg(long, env = "API_KEY", default_value = DEFAULT_API_KEY)]
    pub api_key: String,

    /// Allowed CORS origins, comma separated, or `*`.
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Seconds without a reading after which a device counts as offline.
    #[arg(long, env = "OFFLINE_THRESHOLD_SECONDS", default_value_t = DEFAULT_OFFLINE_THRESHOLD_SECS)]
    pub offline_threshold_secs: u64,

    /// Seconds a live stream may stay idle before a keepalive is sent.
    #[arg(long, default_value_t = DEFAULT_IDLE_INTERVAL.as_secs())]
    pub keepalive_secs: u64,

    /// Readings buffered per live subscriber before new ones are dropped.
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Directory of a built frontend to serve for non-API paths.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Disable the /api/v1/dev endpoints.
    #[arg(long)]
    pub no_dev_routes: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Origins allowed to make cross-origin requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// Parse `*` or a comma separated origin list.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value == "*" {
            return CorsOrigins::Any;
        }

        CorsOrigins::List(
            value
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        )
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Path to the reading storage directory.
    pub data_path: PathBuf,
    /// API key required by the ingestion endpoint.
    pub api_key: String,
    /// Allowed CORS origins.
    pub cors_origins: CorsOrigins,
    /// Age after which a device counts as offline.
    pub offline_threshold: Duration,
    /// Live stream settings.
    pub stream: StreamConfig,
    /// Frontend directory served for non-API paths.
    pub static_dir: Option<PathBuf>,
    /// Whether the development endpoints are mounted.
    pub dev_routes: bool,
}

impl GatewayConfig {
    /// Check that the configuration can be served.
    pub fn validate(&self) -> windmill_core::Result<()> {
        self.stream.validate()?;
        if self.api_key.is_empty() {
            return Err(windmill_core::Error::Config("api key must not be empty".to_string()));
        }
        Ok(())
    }
}

impl From<Args> for GatewayConfig {
    fn from(args: Args) -> Self {
        let listen_addr = match args.port {
            Some(port) => with_port(&args.listen, port),
            None => args.listen,
        };

        Self {
            listen_addr,
            data_path: args.data_path,
            api_key: args.api_key,
            cors_origins: CorsOrigins::parse(&args.cors_origins),
            offline_threshold: Duration::from_secs(args.offline_threshold_secs),
            stream: StreamConfig::new()
                .with_channel_capacity(args.channel_capacity)
                .with_idle_interval(Duration::from_secs(args.keepalive_secs)),
            static_dir: args.static_dir,
            dev_routes: !args.no_dev_routes,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            data_path: PathBuf::from("./data"),
            api_key: DEFAULT_API_KEY.to_string(),
            cors_origins: CorsOrigins::Any,
            offline_threshold: Duration::from_secs(DEFAULT_OFFLINE_THRESHOLD_SECS),
            stream: StreamConfig::default(),
            static_dir: None,
            dev_routes: true,
        }
    }
}

/// Replace the port of a `host:port` address.
fn with_port(addr: &str, port: u16) -> String {
    let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
    format!("{}:{}", host, port)
}
