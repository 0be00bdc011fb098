//! WormHole tunnel server.
//!
//! One `Server` value owns the tunnel registry, the pending-request table,
//! and the configuration; axum handlers borrow it through shared state. No
//! process-wide globals.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wormhole_common::TunnelError;

pub mod config;
pub mod handlers;
pub mod host;
pub mod pending;
pub mod registry;

pub use config::Config;
use pending::PendingRequests;
use registry::TunnelRegistry;

/// Shared state for all handlers
pub struct Server {
    pub config: Config,
    pub registry: TunnelRegistry,
    pub pending: PendingRequests,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let registry = TunnelRegistry::new(config.max_tunnels);
        Self {
            config,
            registry,
            pending: PendingRequests::new(),
        }
    }

    /// Destroy a tunnel exactly once: unlink its subdomain and fail every
    /// pending request still bound to it.
    pub fn teardown_tunnel(&self, tunnel_id: &str) {
        if self.registry.remove(tunnel_id).is_some() {
            self.pending.fail_all_for(tunnel_id, TunnelError::TunnelGone);
        }
    }
}

/// Build the router: admin surface on the bare domain, everything else
/// proxied. Host-based dispatch runs inside each admin handler so requests to
/// a tunnel subdomain are always proxied, whatever their path.
pub fn app(server: Arc<Server>) -> Router {
    Router::new()
        .route("/", get(handlers::status::handle_index))
        .route("/status", get(handlers::status::handle_status))
        .route("/tunnel", get(handlers::control::handle_tunnel_connect))
        .layer(CorsLayer::permissive())
        .fallback(handlers::proxy::handle_proxied_request)
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}
