/// Interval between server-sent ping frames (seconds)
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Deadline for a public request to receive its reply (seconds)
pub const REQUEST_TIMEOUT_SECS: f64 = 10.0;

/// Maximum request/response body size carried through a tunnel (2 MiB)
pub const MAX_BODY_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Maximum number of concurrently live tunnels
pub const MAX_TUNNELS: usize = 1024;

/// Attempts to allocate a fresh subdomain before giving up
pub const SUBDOMAIN_RETRY_LIMIT: usize = 8;

/// Capacity of a tunnel's outbound frame channel; a full channel applies
/// backpressure to dispatching proxy handlers
pub const TUNNEL_CHANNEL_CAPACITY: usize = 256;

/// Minimum delay for exponential backoff reconnection (1 second)
pub const RECONNECT_MIN_DELAY_MS: u64 = 1000;

/// Maximum delay for exponential backoff reconnection (60 seconds)
pub const RECONNECT_MAX_DELAY_MS: u64 = 60000;

/// Multiplier for exponential backoff reconnection
pub const RECONNECT_MULTIPLIER: f64 = 2.0;
