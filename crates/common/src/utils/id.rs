use rand::RngCore;
use rand::thread_rng;
use uuid::Uuid;

/// Generate a random subdomain label.
/// Format: 16 lowercase hex characters, carrying 64 bits of entropy.
pub fn generate_subdomain() -> String {
    format!("{:016x}", thread_rng().next_u64())
}

/// Generate a unique request identifier: `req_` followed by a UUID v4
pub fn generate_request_id() -> String {
    format!("req_{}", Uuid::new_v4())
}
