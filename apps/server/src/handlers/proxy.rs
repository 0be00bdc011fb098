//! Proxy handler: the public side of a tunnel.
//!
//! Resolves the tunnel from the Host header, forwards the buffered request as
//! an `http_request` frame, and blocks on the pending table until the first
//! of reply, timeout, tunnel teardown, or the public client going away.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Host, State};
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::Response;
use tokio::time::Instant;
use tracing::{debug, warn};
use wormhole_common::protocol::{HttpRequest, HttpResponse, Message};
use wormhole_common::utils::{decode_body, encode_body, generate_request_id, headers_to_map};
use wormhole_common::{TunnelError, is_hop_by_hop};

use crate::Server;
use crate::host::extract_subdomain;

/// Fallback handler: everything that is not an admin route on the bare domain
pub async fn handle_proxied_request(
    State(server): State<Arc<Server>>,
    Host(host): Host,
    req: Request<Body>,
) -> Response {
    match extract_subdomain(&host, &server.config.base_domain) {
        Some(subdomain) => proxy_request(server, subdomain, req).await,
        None => error_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Forward one public request through the tunnel owning `subdomain`.
pub async fn proxy_request(server: Arc<Server>, subdomain: String, req: Request<Body>) -> Response {
    let Some(tunnel) = server.registry.lookup(&subdomain) else {
        debug!(%subdomain, "No live tunnel for subdomain");
        return render_error(&TunnelError::TunnelNotFound(subdomain));
    };

    let (parts, body) = req.into_parts();
    let method = parts.method.to_string();
    let path = parts.uri.path().to_string();
    let query_string = parts.uri.query().unwrap_or("").to_string();
    let headers = headers_to_map(&parts.headers);

    let body = match axum::body::to_bytes(body, server.config.max_body_bytes).await {
        Ok(body) => body,
        Err(_) => {
            debug!(%subdomain, "Request body over the configured cap");
            return render_error(&TunnelError::PayloadTooLarge(server.config.max_body_bytes));
        }
    };

    let request_id = generate_request_id();
    let frame = Message::HttpRequest(HttpRequest {
        request_id: request_id.clone(),
        method,
        path,
        query_string,
        headers,
        body: encode_body(&body),
    });

    // Register before dispatch so the reply cannot race past us; the deadline
    // starts now, dispatch backpressure included
    let deadline = Instant::now() + server.config.request_timeout();
    let handle = match server.pending.register(&request_id, &tunnel, deadline) {
        Ok(handle) => handle,
        Err(e) => return render_error(&e),
    };

    if let Err(e) = tunnel.send_frame(&frame).await {
        debug!(%subdomain, %request_id, "Dispatch failed: {e}");
        // Dropping the handle unregisters the pending entry
        return render_error(&e);
    }
    tunnel.incr_request_count();

    debug!(%subdomain, %request_id, "Request dispatched");

    match handle.await_reply().await {
        Ok(reply) => render_reply(reply, server.config.max_body_bytes),
        Err(e) => {
            debug!(%subdomain, %request_id, "Request failed: {e}");
            render_error(&e)
        }
    }
}

/// Copy an agent reply into the outbound response: status clamped to the
/// renderable range, hop-by-hop headers dropped, body base64-decoded.
fn render_reply(reply: HttpResponse, max_body_bytes: usize) -> Response {
    if !reply.status_in_range() {
        warn!(status = reply.status, "Agent reply status out of range");
        return error_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
    }

    let body = match decode_body(&reply.body) {
        Ok(body) => body,
        Err(e) => {
            warn!("Agent reply body is not valid base64: {e}");
            return error_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
        }
    };
    if body.len() > max_body_bytes {
        warn!(len = body.len(), "Agent reply body over the configured cap");
        return error_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
    }

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);

    for (name, value) in &reply.headers {
        let name = name.to_ascii_lowercase();
        if is_hop_by_hop(&name) {
            continue;
        }
        if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes())
            && let Ok(header_value) = HeaderValue::from_str(value)
        {
            builder = builder.header(header_name, header_value);
        }
    }

    builder
        .body(Body::from(body))
        .unwrap_or_else(|_| error_response(StatusCode::BAD_GATEWAY, "Bad Gateway"))
}

/// Map an error kind to its public status line
fn render_error(error: &TunnelError) -> Response {
    match error {
        TunnelError::TunnelNotFound(_) => error_response(StatusCode::NOT_FOUND, "Tunnel Not Active"),
        TunnelError::Timeout => error_response(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout"),
        TunnelError::PayloadTooLarge(_) => {
            error_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
        }
        // tunnel-gone, dispatch failures, protocol errors; cancellation lands
        // here too, but its response has no reader
        _ => error_response(StatusCode::BAD_GATEWAY, "Bad Gateway"),
    }
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(Body::from(message.to_string()))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal error"))
                .unwrap()
        })
}
