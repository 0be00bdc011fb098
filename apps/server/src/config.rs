use clap::Parser;
use std::time::Duration;
use wormhole_common::constants::{
    HEARTBEAT_INTERVAL_SECS, MAX_BODY_SIZE_BYTES, MAX_TUNNELS, REQUEST_TIMEOUT_SECS,
};

/// Server configuration, loaded from `WH_`-prefixed environment variables
/// with CLI flag overrides.
#[derive(Parser, Debug, Clone)]
#[command(name = "wormhole-server")]
#[command(about = "HTTP tunneling server - expose local services to the internet", long_about = None)]
#[command(version)]
pub struct Config {
    /// Bind address
    #[arg(long, env = "WH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port
    #[arg(long, env = "WH_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Host suffix used for subdomain extraction
    #[arg(long, env = "WH_BASE_DOMAIN", default_value = "localhost")]
    pub base_domain: String,

    /// Ping cadence in seconds; an agent is considered dead after twice this
    #[arg(long, env = "WH_WEBSOCKET_HEARTBEAT", default_value_t = HEARTBEAT_INTERVAL_SECS)]
    pub websocket_heartbeat: u64,

    /// Deadline for a public request to receive its reply, in seconds
    #[arg(long, env = "WH_REQUEST_TIMEOUT", default_value_t = REQUEST_TIMEOUT_SECS)]
    pub request_timeout: f64,

    /// Request/response body cap in bytes
    #[arg(long, env = "WH_MAX_BODY_BYTES", default_value_t = MAX_BODY_SIZE_BYTES)]
    pub max_body_bytes: usize,

    /// Maximum number of concurrently live tunnels
    #[arg(long, env = "WH_MAX_TUNNELS", default_value_t = MAX_TUNNELS)]
    pub max_tunnels: usize,
}

impl Config {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.websocket_heartbeat)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout)
    }

    /// Public URL a tunnel is reachable under. TLS termination happens at the
    /// edge, so the scheme reflects this server's own listener.
    pub fn public_url(&self, subdomain: &str) -> String {
        if self.port == 80 {
            format!("http://{subdomain}.{}", self.base_domain)
        } else {
            format!("http://{subdomain}.{}:{}", self.base_domain, self.port)
        }
    }
}
