use serde::{Deserialize, Serialize};

use super::{HttpRequest, HttpResponse};

/// All control-channel frames are wrapped in this typed envelope.
///
/// Decoding is strict on the `type` discriminator and required fields, lenient
/// on unknown extra fields so newer peers can add data without breaking us.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Control plane heartbeat
    Ping,
    Pong,

    /// Tunnel assignment, sent by the server right after the WS handshake
    Connected {
        tunnel_id: String,
        subdomain: String,
        public_url: String,
    },

    /// Data plane messages
    HttpRequest(HttpRequest),
    HttpResponse(HttpResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_ping_pong_serialization() {
        let ping = Message::Ping;
        let json = serde_json::to_string(&ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);

        let pong = Message::Pong;
        let json = serde_json::to_string(&pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, Message::Pong));
    }

    #[test]
    fn test_connected_serialization() {
        let msg = Message::Connected {
            tunnel_id: "3b2c1d4e-0000-4000-8000-000000000000".to_string(),
            subdomain: "9f8e7d6c5b4a3210".to_string(),
            public_url: "http://9f8e7d6c5b4a3210.localhost:8080".to_string(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"connected"#));
        assert!(json.contains(r#""subdomain":"9f8e7d6c5b4a3210"#));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        match parsed {
            Message::Connected { subdomain, .. } => {
                assert_eq!(subdomain, "9f8e7d6c5b4a3210");
            }
            _ => panic!("Expected Connected"),
        }
    }

    #[test]
    fn test_http_request_serialization() {
        let request = HttpRequest {
            request_id: "req_123".to_string(),
            method: "GET".to_string(),
            path: "/api/v1/users".to_string(),
            query_string: "limit=10".to_string(),
            headers: HashMap::new(),
            body: String::new(),
        };

        let msg = Message::HttpRequest(request);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"http_request"#));
        assert!(json.contains(r#""request_id":"req_123"#));
        // An empty body is carried as an empty string, never omitted
        assert!(json.contains(r#""body":""#));

        let parsed: Message = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, Message::HttpRequest(_)));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type":"shutdown","reason":"bye"}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_missing_required_field_rejected() {
        // http_response without a request_id cannot be correlated
        let json = r#"{"type":"http_response","status":200,"headers":{},"body":""}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn test_unknown_extra_fields_ignored() {
        let json = r#"{"type":"connected","tunnel_id":"t","subdomain":"s","public_url":"u","build":"v9"}"#;
        let parsed: Message = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, Message::Connected { .. }));
    }
}
