use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Headers with per-connection semantics, stripped at the proxy boundary.
///
/// `proxy-*` covers proxy-authenticate, proxy-authorization, proxy-connection.
pub fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name,
        "connection" | "keep-alive" | "transfer-encoding" | "upgrade"
    ) || name.starts_with("proxy-")
}

/// Convert HTTP headers to the wire format: a flat map of lowercase name to
/// value, repeated headers joined with a comma per HTTP field-combining rules.
pub fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();

    for (name, value) in headers.iter() {
        // HeaderName is lowercase by construction
        let key = name.as_str().to_string();
        let val = value.to_str().unwrap_or("").to_string();

        match map.entry(key) {
            Entry::Occupied(mut entry) => {
                let joined = entry.get_mut();
                joined.push_str(", ");
                joined.push_str(&val);
            }
            Entry::Vacant(entry) => {
                entry.insert(val);
            }
        }
    }

    map
}

/// Convert the wire header format back to an HTTP HeaderMap.
///
/// Names or values that are not valid HTTP are skipped rather than failing the
/// whole response.
pub fn map_to_headers(map: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in map.iter() {
        if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes())
            && let Ok(header_value) = HeaderValue::from_str(value)
        {
            headers.insert(header_name, header_value);
        }
    }

    headers
}
