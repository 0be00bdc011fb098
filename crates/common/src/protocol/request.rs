use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An HTTP request forwarded from the public endpoint to the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// Unique identifier to correlate request and response
    pub request_id: String,

    /// HTTP method (GET, POST, PUT, DELETE, etc.)
    pub method: String,

    /// Request path, always starting with `/`
    pub path: String,

    /// Raw query string without the leading `?`; empty when absent
    #[serde(default)]
    pub query_string: String,

    /// Headers as a flat map of lowercase name to value; repeated headers
    /// are joined with a comma before they reach the wire
    pub headers: HashMap<String, String>,

    /// Request body encoded in Base64; empty string for requests without body
    #[serde(default)]
    pub body: String,
}

impl HttpRequest {
    /// Check if the request has a body
    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    /// Path and query string reassembled, e.g. `/a/b?x=1`
    pub fn path_and_query(&self) -> String {
        if self.query_string.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, query: &str) -> HttpRequest {
        HttpRequest {
            request_id: "req_123".to_string(),
            method: "GET".to_string(),
            path: path.to_string(),
            query_string: query.to_string(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_path_and_query() {
        assert_eq!(request("/api/users", "").path_and_query(), "/api/users");
        assert_eq!(
            request("/api/users", "limit=10&page=2").path_and_query(),
            "/api/users?limit=10&page=2"
        );
    }

    #[test]
    fn test_http_request_serialization() {
        let mut headers = HashMap::new();
        headers.insert("host".to_string(), "s1.localhost".to_string());

        let req = HttpRequest {
            request_id: "req_abc123".to_string(),
            method: "GET".to_string(),
            path: "/path".to_string(),
            query_string: "query=value".to_string(),
            headers,
            body: String::new(),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""request_id":"req_abc123"#));
        assert!(json.contains(r#""method":"GET"#));
        assert!(json.contains(r#""query_string":"query=value"#));

        let parsed: HttpRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, req.request_id);
        assert_eq!(parsed.path, req.path);
        assert_eq!(parsed.query_string, req.query_string);
    }

    #[test]
    fn test_http_request_defaults() {
        let json = r#"{
            "request_id": "req_123",
            "method": "GET",
            "path": "/test",
            "headers": {}
        }"#;

        let parsed: HttpRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.body, "");
        assert_eq!(parsed.query_string, "");
        assert!(!parsed.has_body());
    }
}
