//! Status and landing surface, served on the bare base domain only.

use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Host, State};
use axum::http::Request;
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;

use crate::Server;
use crate::handlers::proxy;
use crate::host::extract_subdomain;
use crate::registry::TunnelSnapshot;

#[derive(Serialize)]
struct ServerStatus {
    status: &'static str,
    active_tunnels: usize,
    tunnels: Vec<TunnelSnapshot>,
}

/// `GET /status`: server health and the live tunnel list. Never fails.
pub async fn handle_status(
    State(server): State<Arc<Server>>,
    Host(host): Host,
    req: Request<Body>,
) -> Response {
    if let Some(subdomain) = extract_subdomain(&host, &server.config.base_domain) {
        return proxy::proxy_request(server, subdomain, req).await;
    }

    let tunnels = server.registry.snapshot();
    Json(ServerStatus {
        status: "running",
        active_tunnels: tunnels.len(),
        tunnels,
    })
    .into_response()
}

/// `GET /`: a small landing page
pub async fn handle_index(
    State(server): State<Arc<Server>>,
    Host(host): Host,
    req: Request<Body>,
) -> Response {
    if let Some(subdomain) = extract_subdomain(&host, &server.config.base_domain) {
        return proxy::proxy_request(server, subdomain, req).await;
    }

    let tunnel_count = server.registry.count();
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>WormHole Server</title></head>
<body>
  <h1>WormHole Server</h1>
  <p>HTTP tunneling service - expose your localhost to the internet</p>
  <p>Active tunnels: {tunnel_count}</p>
  <h3>Endpoints</h3>
  <ul>
    <li><code>GET /status</code> - server status and active tunnels</li>
    <li><code>WS /tunnel</code> - create a new tunnel</li>
    <li><code>* &lt;subdomain&gt;.{base}/*</code> - proxied requests</li>
  </ul>
</body>
</html>
"#,
        base = server.config.base_domain,
    );

    Html(html).into_response()
}
