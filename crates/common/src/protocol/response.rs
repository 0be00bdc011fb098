use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The response from the local service, sent back through the tunnel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Must match the request_id from the corresponding HttpRequest
    pub request_id: String,

    /// HTTP status code; consumers clamp to [100, 599] before use
    pub status: u16,

    /// Headers as a flat map of lowercase name to value
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Response body encoded in Base64
    #[serde(default)]
    pub body: String,
}

impl HttpResponse {
    /// Create a new HTTP response with no headers or body
    pub fn new(request_id: String, status: u16) -> Self {
        Self {
            request_id,
            status,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Check if the response has a body
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Whether the status code is inside the renderable HTTP range
    pub fn status_in_range(&self) -> bool {
        (100..=599).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_response_creation() {
        let res = HttpResponse::new("req_123".to_string(), 200);

        assert_eq!(res.request_id, "req_123");
        assert_eq!(res.status, 200);
        assert!(res.headers.is_empty());
        assert!(!res.has_body());
    }

    #[test]
    fn test_status_in_range() {
        assert!(HttpResponse::new("r".to_string(), 100).status_in_range());
        assert!(HttpResponse::new("r".to_string(), 200).status_in_range());
        assert!(HttpResponse::new("r".to_string(), 599).status_in_range());
        assert!(!HttpResponse::new("r".to_string(), 99).status_in_range());
        assert!(!HttpResponse::new("r".to_string(), 600).status_in_range());
        assert!(!HttpResponse::new("r".to_string(), 0).status_in_range());
    }

    #[test]
    fn test_http_response_serialization() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());

        let res = HttpResponse {
            request_id: "req_abc123".to_string(),
            status: 201,
            headers,
            body: "dGVzdCBkYXRh".to_string(), // "test data"
        };

        let json = serde_json::to_string(&res).unwrap();
        assert!(json.contains(r#""request_id":"req_abc123"#));
        assert!(json.contains(r#""status":201"#));

        let parsed: HttpResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, res.request_id);
        assert_eq!(parsed.status, res.status);
        assert_eq!(parsed.body, res.body);
    }

    #[test]
    fn test_http_response_defaults() {
        let json = r#"{
            "request_id": "req_123",
            "status": 200
        }"#;

        let parsed: HttpResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.body, "");
        assert!(parsed.headers.is_empty());
        assert!(!parsed.has_body());
    }
}
