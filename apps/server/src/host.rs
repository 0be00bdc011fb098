//! Subdomain extraction from the Host header.
//!
//! The admin surface lives at the bare base domain; every other host targets a
//! tunnel. Matching is case-insensitive, the port suffix is stripped, and the
//! returned label is lowercase.

use std::net::IpAddr;

/// Extract the tunnel label from a Host header value.
///
/// Returns `Some(label)` when `host` is `<label>.<base_domain>` with a
/// non-empty, dot-free label. Returns `None` for the bare base domain, hosts
/// under a different domain, and IP literals.
pub fn extract_subdomain(host: &str, base_domain: &str) -> Option<String> {
    let host = host.trim();

    // Bracketed IPv6 literals, e.g. "[::1]:8080"
    if host.starts_with('[') {
        return None;
    }

    let host = host.split(':').next().unwrap_or(host);
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }

    let host = host.to_ascii_lowercase();
    let base = base_domain.to_ascii_lowercase();

    let label = host.strip_suffix(&base)?.strip_suffix('.')?;
    if label.is_empty() || label.contains('.') {
        return None;
    }

    Some(label.to_string())
}
