use anyhow::Result;
use clap::Parser;
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message as WsMessage,
};
use tracing::{debug, error, info, warn};
use wormhole_common::constants::{
    RECONNECT_MAX_DELAY_MS, RECONNECT_MIN_DELAY_MS, RECONNECT_MULTIPLIER,
};
use wormhole_common::{
    HttpRequest, HttpResponse, Message, TunnelError, decode_body, encode_body, headers_to_map,
};

type WebSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// CLI arguments for the forwarder agent
#[derive(Parser, Debug)]
#[command(name = "whf")]
#[command(about = "WormHole forwarder agent - expose a local HTTP service", long_about = None)]
#[command(version)]
struct Args {
    /// Local port to forward requests to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Local host address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// WebSocket tunnel endpoint
    #[arg(
        short,
        long,
        env = "WH_ENDPOINT",
        default_value = "ws://localhost:8080/tunnel"
    )]
    endpoint: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Request timeout against the local service in seconds
    #[arg(long, default_value = "10")]
    request_timeout: u64,
}

/// Configuration for the forwarder
#[derive(Debug, Clone)]
pub struct Config {
    /// Local service address (e.g., "http://127.0.0.1:3000")
    pub local_address: String,

    /// WebSocket endpoint URL
    pub websocket_url: String,

    /// Request timeout when calling the local service
    pub request_timeout: Duration,

    /// Reconnection strategy
    pub reconnect_config: ReconnectConfig,
}

/// Reconnection configuration with exponential backoff
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Config {
    fn from_args(args: &Args) -> Self {
        Self {
            local_address: format!("http://{}:{}", args.host, args.port),
            websocket_url: args.endpoint.clone(),
            request_timeout: Duration::from_secs(args.request_timeout),
            reconnect_config: ReconnectConfig {
                min_delay: Duration::from_millis(RECONNECT_MIN_DELAY_MS),
                max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
                multiplier: RECONNECT_MULTIPLIER,
            },
        }
    }
}

/// Connection manager handles the WebSocket lifecycle and reconnection
pub struct ConnectionManager {
    config: Config,
}

impl ConnectionManager {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Main run loop with automatic reconnection
    pub async fn run(&self) -> Result<()> {
        let mut reconnect_delay = self.config.reconnect_config.min_delay;
        let mut attempt = 0;

        loop {
            match self.establish_connection().await {
                Ok((ws_stream, public_url)) => {
                    info!("Tunnel established: {}", public_url);
                    reconnect_delay = self.config.reconnect_config.min_delay;
                    attempt = 0;

                    if let Err(e) = self.handle_connection(ws_stream).await {
                        error!("Connection error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to connect: {}", e);
                }
            }

            attempt += 1;
            info!(
                "Reconnecting in {:?} (attempt {})",
                reconnect_delay, attempt
            );
            tokio::time::sleep(reconnect_delay).await;

            // Exponential backoff
            reconnect_delay = Duration::from_millis(
                ((reconnect_delay.as_millis() as f64 * self.config.reconnect_config.multiplier)
                    .min(self.config.reconnect_config.max_delay.as_millis() as f64))
                    as u64,
            );
        }
    }

    /// Connect and wait for the server's `connected` frame
    async fn establish_connection(&self) -> Result<(WebSocket, String)> {
        debug!("Connecting to {}", self.config.websocket_url);

        let (mut ws_stream, _) = connect_async(&self.config.websocket_url)
            .await
            .map_err(|e| TunnelError::ConnectionError(e.to_string()))?;

        // The server assigns the tunnel unprompted, right after the upgrade
        while let Some(message) = ws_stream.next().await {
            match message {
                Ok(WsMessage::Text(text)) => {
                    if let Ok(Message::Connected {
                        tunnel_id,
                        subdomain,
                        public_url,
                    }) = serde_json::from_str::<Message>(&text)
                    {
                        info!("  Tunnel ID: {}", tunnel_id);
                        info!("  Subdomain: {}", subdomain);
                        info!("  Public URL: {}", public_url);
                        return Ok((ws_stream, public_url));
                    }
                }
                Ok(WsMessage::Close(frame)) => {
                    return Err(TunnelError::ConnectionError(format!(
                        "Server closed connection during handshake: {frame:?}"
                    ))
                    .into());
                }
                Err(e) => {
                    return Err(TunnelError::WebSocketError(e.to_string()).into());
                }
                _ => {}
            }
        }

        Err(TunnelError::ConnectionError("Connection closed before handshake".to_string()).into())
    }

    /// Handle an active connection with split read/write tasks
    async fn handle_connection(&self, ws_stream: WebSocket) -> Result<()> {
        let (write, read) = ws_stream.split();

        let (outgoing_tx, outgoing_rx) = mpsc::channel(100);

        let write_handle = tokio::spawn(write_task(write, outgoing_rx));
        let read_handle = tokio::spawn(read_task(
            read,
            outgoing_tx,
            self.config.local_address.clone(),
            self.config.request_timeout,
        ));

        // Either task ending means the connection is done
        tokio::select! {
            result = write_handle => {
                warn!("Write task ended: {:?}", result);
            }
            result = read_handle => {
                warn!("Read task ended: {:?}", result);
            }
        }

        Ok(())
    }
}

/// Write task sends outgoing messages through the WebSocket
async fn write_task(
    mut write: SplitSink<WebSocket, WsMessage>,
    mut outgoing_rx: mpsc::Receiver<WsMessage>,
) -> Result<()> {
    while let Some(message) = outgoing_rx.recv().await {
        if let Err(e) = write.send(message).await {
            error!("Failed to send message: {}", e);
            break;
        }
    }

    debug!("Write task exiting");
    Ok(())
}

/// Read task receives incoming messages and dispatches them
async fn read_task(
    mut read: SplitStream<WebSocket>,
    outgoing_tx: mpsc::Sender<WsMessage>,
    local_address: String,
    request_timeout: Duration,
) -> Result<()> {
    while let Some(message) = read.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                if let Err(e) =
                    handle_text_message(&text, &outgoing_tx, &local_address, request_timeout).await
                {
                    error!("Error handling message: {}", e);
                }
            }
            Ok(WsMessage::Binary(_)) => {
                warn!("Received unexpected binary message");
            }
            Ok(WsMessage::Ping(data)) => {
                debug!("Received WebSocket ping");
                if outgoing_tx.send(WsMessage::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(WsMessage::Pong(_)) => {
                debug!("Received WebSocket pong");
            }
            Ok(WsMessage::Close(_)) => {
                info!("Server closed connection");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    debug!("Read task exiting");
    Ok(())
}

/// Handle one decoded control-channel frame
async fn handle_text_message(
    text: &str,
    outgoing_tx: &mpsc::Sender<WsMessage>,
    local_address: &str,
    request_timeout: Duration,
) -> Result<()> {
    let message: Message = serde_json::from_str(text)
        .map_err(|e| TunnelError::ProtocolError(format!("Failed to parse message: {e}")))?;

    match message {
        Message::HttpRequest(request) => {
            debug!("Received HTTP request: {} {}", request.method, request.path);

            // Handle each request concurrently; replies are matched by id
            let local_address = local_address.to_string();
            let outgoing_tx = outgoing_tx.clone();

            tokio::spawn(async move {
                if let Err(e) =
                    handle_http_request(request, &local_address, request_timeout, outgoing_tx).await
                {
                    error!("Failed to handle request: {}", e);
                }
            });
        }

        Message::Ping => {
            debug!("Received ping, answering");
            let pong = serde_json::to_string(&Message::Pong)
                .map_err(|e| TunnelError::ProtocolError(e.to_string()))?;
            outgoing_tx
                .send(WsMessage::Text(pong.into()))
                .await
                .map_err(|e| TunnelError::WebSocketError(e.to_string()))?;
        }

        Message::Pong => {
            debug!("Received pong");
        }

        Message::Connected { public_url, .. } => {
            // Seen on reconnect races; the URL is worth repeating
            info!("Tunnel reassigned: {}", public_url);
        }

        _ => {
            warn!("Received unexpected message type");
        }
    }

    Ok(())
}

/// Replay a tunneled request against the local service and send the reply back
async fn handle_http_request(
    request: HttpRequest,
    local_address: &str,
    timeout: Duration,
    outgoing_tx: mpsc::Sender<WsMessage>,
) -> Result<()> {
    let request_id = request.request_id.clone();

    debug!("Forwarding: {} {}", request.method, request.path_and_query());

    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TunnelError::LocalServiceUnavailable(e.to_string()))?;

    let url = format!("{}{}", local_address, request.path_and_query());
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| TunnelError::ProtocolError(format!("Bad HTTP method: {}", request.method)))?;

    let mut req_builder = client.request(method, &url);

    for (name, value) in request.headers.iter() {
        // The local service sees its own host
        if name.eq_ignore_ascii_case("host") {
            continue;
        }
        req_builder = req_builder.header(name, value);
    }

    if request.has_body() {
        let body_bytes = decode_body(&request.body)
            .map_err(|e| TunnelError::ProtocolError(format!("Failed to decode body: {e}")))?;
        req_builder = req_builder.body(body_bytes);
    }

    let reply = match req_builder.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let headers = headers_to_map(response.headers());
            let body_bytes = response
                .bytes()
                .await
                .map_err(|e| TunnelError::LocalServiceUnavailable(e.to_string()))?;

            debug!("Local service replied {} for {}", status, request_id);

            HttpResponse {
                request_id,
                status,
                headers,
                body: encode_body(&body_bytes),
            }
        }
        Err(e) => {
            error!("Local service error: {}", e);
            let mut unavailable = HttpResponse::new(request_id, 502);
            unavailable.body = encode_body(b"Local service unavailable");
            unavailable
        }
    };

    let response_json = serde_json::to_string(&Message::HttpResponse(reply))
        .map_err(|e| TunnelError::ProtocolError(e.to_string()))?;

    outgoing_tx
        .send(WsMessage::Text(response_json.into()))
        .await
        .map_err(|e| TunnelError::WebSocketError(e.to_string()))?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    info!("WormHole Forwarder v{}", env!("CARGO_PKG_VERSION"));
    info!("Local service: {}:{}", args.host, args.port);
    info!("Tunnel endpoint: {}", args.endpoint);

    let config = Config::from_args(&args);
    let manager = ConnectionManager::new(config);

    tokio::select! {
        result = manager.run() => {
            error!("Connection manager exited: {:?}", result);
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down gracefully...");
        }
    }

    Ok(())
}
