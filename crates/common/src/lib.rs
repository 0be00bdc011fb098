//! Common utilities and types for the WormHole tunnel system
//!
//! This crate provides the shared frame schema, error types, and utilities used
//! by both the server (tunnel multiplexer) and the forwarder (local agent).

pub mod constants;
pub mod error;
pub mod protocol;
pub mod utils;

// Re-export commonly used types for convenience
pub use error::{Result, TunnelError};
pub use protocol::{HttpRequest, HttpResponse, Message};
pub use utils::{
    decode_body, encode_body, generate_request_id, generate_subdomain, headers_to_map,
    is_hop_by_hop, map_to_headers,
};
