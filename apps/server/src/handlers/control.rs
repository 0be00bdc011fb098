//! Control-channel handler: agent WebSocket lifecycle.
//!
//! A connection moves INIT -> ASSIGNED on upgrade (tunnel created, `connected`
//! frame sent) and stays there demultiplexing agent replies until the socket
//! closes, a protocol violation is seen, or the heartbeat deadline passes.
//! Leaving ASSIGNED always unlinks the tunnel and fails its pending requests.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, close_code};
use axum::extract::{FromRequestParts, Host, State, WebSocketUpgrade};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use wormhole_common::constants::TUNNEL_CHANNEL_CAPACITY;
use wormhole_common::protocol::Message;

use crate::Server;
use crate::handlers::proxy;
use crate::host::extract_subdomain;
use crate::registry::Tunnel;

/// Why an ASSIGNED connection ended
enum CloseReason {
    AgentClosed,
    TransportError(String),
    ProtocolViolation(String),
    HeartbeatTimeout,
}

/// `GET /tunnel` on the bare domain: upgrade and run the control channel.
/// On a tunnel subdomain the path is proxied like any other.
pub async fn handle_tunnel_connect(
    State(server): State<Arc<Server>>,
    Host(host): Host,
    req: Request<Body>,
) -> Response {
    if let Some(subdomain) = extract_subdomain(&host, &server.config.base_domain) {
        return proxy::proxy_request(server, subdomain, req).await;
    }

    let (mut parts, _body) = req.into_parts();
    match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_agent_socket(server, socket))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_agent_socket(server: Arc<Server>, mut socket: WebSocket) {
    let (outbound_tx, outbound_rx) = mpsc::channel(TUNNEL_CHANNEL_CAPACITY);

    let tunnel = match server.registry.create(outbound_tx) {
        Ok(tunnel) => tunnel,
        Err(e) => {
            warn!("Refusing agent connection: {e}");
            let _ = socket
                .send(WsMessage::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: Cow::from("exhausted"),
                })))
                .await;
            return;
        }
    };

    // INIT -> ASSIGNED: the assignment frame goes out before anything else
    let public_url = server.config.public_url(&tunnel.subdomain);
    let connected = Message::Connected {
        tunnel_id: tunnel.tunnel_id.clone(),
        subdomain: tunnel.subdomain.clone(),
        public_url: public_url.clone(),
    };
    let json = match serde_json::to_string(&connected) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize connected frame: {e}");
            server.teardown_tunnel(&tunnel.tunnel_id);
            return;
        }
    };
    if socket.send(WsMessage::Text(json)).await.is_err() {
        server.teardown_tunnel(&tunnel.tunnel_id);
        return;
    }

    info!(
        subdomain = %tunnel.subdomain,
        tunnel_id = %tunnel.tunnel_id,
        "✅ Tunnel established: {public_url}"
    );

    let (ws_tx, ws_rx) = socket.split();
    let mut writer = tokio::spawn(write_loop(ws_tx, outbound_rx));

    let reason = read_loop(&server, &tunnel, ws_rx).await;

    let close_frame = match &reason {
        CloseReason::AgentClosed => {
            info!(subdomain = %tunnel.subdomain, "Agent closed the tunnel");
            CloseFrame {
                code: close_code::NORMAL,
                reason: Cow::from("bye"),
            }
        }
        CloseReason::TransportError(e) => {
            warn!(subdomain = %tunnel.subdomain, "Tunnel transport error: {e}");
            CloseFrame {
                code: close_code::ERROR,
                reason: Cow::from("transport error"),
            }
        }
        CloseReason::ProtocolViolation(e) => {
            warn!(subdomain = %tunnel.subdomain, "Protocol violation from agent: {e}");
            CloseFrame {
                code: close_code::PROTOCOL,
                reason: Cow::from("protocol-error"),
            }
        }
        CloseReason::HeartbeatTimeout => {
            warn!(subdomain = %tunnel.subdomain, "Agent missed heartbeat deadline");
            CloseFrame {
                code: close_code::AWAY,
                reason: Cow::from("heartbeat timeout"),
            }
        }
    };

    // The close frame queues behind frames already dispatched; the writer
    // flushes them in order and stops at the close.
    tunnel.send_raw(WsMessage::Close(Some(close_frame))).await;

    // CLOSED: unlink the subdomain and fail everything still waiting
    server.teardown_tunnel(&tunnel.tunnel_id);

    if tokio::time::timeout(Duration::from_secs(5), &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
}

/// Single writer per socket: drains the tunnel's outbound channel so frames
/// queued by concurrent proxy handlers reach the wire one at a time.
async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut outbound_rx: mpsc::Receiver<WsMessage>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        let is_close = matches!(msg, WsMessage::Close(_));
        if ws_tx.send(msg).await.is_err() {
            break;
        }
        if is_close {
            break;
        }
    }
    debug!("Tunnel writer exiting");
}

async fn read_loop(
    server: &Server,
    tunnel: &Arc<Tunnel>,
    mut ws_rx: SplitStream<WebSocket>,
) -> CloseReason {
    let heartbeat = server.config.heartbeat_interval();
    let liveness_deadline = heartbeat * 2;
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await; // the first tick fires immediately
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if last_seen.elapsed() >= liveness_deadline {
                    return CloseReason::HeartbeatTimeout;
                }
                if tunnel.send_frame(&Message::Ping).await.is_err() {
                    return CloseReason::TransportError("writer gone".to_string());
                }
            }
            frame = ws_rx.next() => match frame {
                None => return CloseReason::AgentClosed,
                Some(Err(e)) => return CloseReason::TransportError(e.to_string()),
                Some(Ok(msg)) => {
                    last_seen = Instant::now();
                    if let Some(reason) = handle_frame(server, tunnel, msg).await {
                        return reason;
                    }
                }
            }
        }
    }
}

/// Classify one inbound frame; `Some` means the connection must close.
async fn handle_frame(
    server: &Server,
    tunnel: &Arc<Tunnel>,
    msg: WsMessage,
) -> Option<CloseReason> {
    match msg {
        WsMessage::Text(text) => match serde_json::from_str::<Message>(&text) {
            Ok(Message::HttpResponse(reply)) => {
                let request_id = reply.request_id.clone();
                if server.pending.fulfill(&request_id, reply) {
                    debug!(%request_id, "Reply correlated");
                }
                // Unknown or stale ids are dropped silently
                None
            }
            Ok(Message::Ping) => {
                if tunnel.send_frame(&Message::Pong).await.is_err() {
                    Some(CloseReason::TransportError("writer gone".to_string()))
                } else {
                    None
                }
            }
            Ok(Message::Pong) => None,
            Ok(Message::Connected { .. }) => Some(CloseReason::ProtocolViolation(
                "unexpected connected frame from agent".to_string(),
            )),
            Ok(Message::HttpRequest(_)) => Some(CloseReason::ProtocolViolation(
                "unexpected http_request frame from agent".to_string(),
            )),
            Err(e) => Some(CloseReason::ProtocolViolation(e.to_string())),
        },
        // WebSocket-level ping/pong counts as liveness; the transport answers
        // pings on its own
        WsMessage::Ping(_) | WsMessage::Pong(_) => None,
        WsMessage::Close(_) => Some(CloseReason::AgentClosed),
        WsMessage::Binary(_) => Some(CloseReason::ProtocolViolation(
            "binary frame on control channel".to_string(),
        )),
    }
}
