use thiserror::Error;

/// Error types for the WormHole tunnel system
///
/// One variant per failure kind a request or tunnel can observe; the server's
/// reply slots carry these so the proxy handler can render them to HTTP.
#[derive(Error, Debug, Clone)]
pub enum TunnelError {
    #[error("No live tunnel for subdomain: {0}")]
    TunnelNotFound(String),

    #[error("Tunnel closed while the request was in flight")]
    TunnelGone,

    #[error("Failed to dispatch request frame: {0}")]
    DispatchFailed(String),

    #[error("Timeout waiting for response")]
    Timeout,

    #[error("Body of {0} bytes exceeds the configured limit")]
    PayloadTooLarge(usize),

    #[error("Invalid frame from agent: {0}")]
    ProtocolError(String),

    #[error("Request cancelled by the caller")]
    Cancelled,

    #[error("Subdomain space exhausted")]
    Exhausted,

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Local service unavailable: {0}")]
    LocalServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Type alias for Results using TunnelError
pub type Result<T> = std::result::Result<T, TunnelError>;

impl From<serde_json::Error> for TunnelError {
    fn from(err: serde_json::Error) -> Self {
        TunnelError::ProtocolError(err.to_string())
    }
}

impl From<base64::DecodeError> for TunnelError {
    fn from(err: base64::DecodeError) -> Self {
        TunnelError::ProtocolError(format!("invalid base64 body: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TunnelError::TunnelNotFound("s1".to_string());
        assert_eq!(err.to_string(), "No live tunnel for subdomain: s1");

        let err = TunnelError::Timeout;
        assert_eq!(err.to_string(), "Timeout waiting for response");
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        assert!(json_err.is_err());

        let tunnel_err: TunnelError = json_err.unwrap_err().into();
        assert!(matches!(tunnel_err, TunnelError::ProtocolError(_)));
    }

    #[test]
    fn test_errors_are_cloneable() {
        // Reply slots fan the same error out to several pendings at teardown
        let err = TunnelError::TunnelGone;
        let copy = err.clone();
        assert!(matches!(copy, TunnelError::TunnelGone));
    }
}
