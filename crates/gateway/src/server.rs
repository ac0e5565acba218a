//! HTTP listener.
//!
//! A single POST route accepting single or batched JSON-RPC envelopes.
//! JSON-RPC errors travel inside a 200 body; the HTTP status only changes
//! when the transport itself fails. CORS is allow-all, the gateway sits in
//! front of wallets running on arbitrary origins.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use ethrpc_types::{RpcErrorBody, RpcRequestWrapper, RpcResponse};

use crate::error::{codes, GatewayError};
use crate::router::Router;

/// Build the axum application around a router.
pub fn app(router: Arc<Router>) -> axum::Router {
    axum::Router::new()
        .route("/", post(handle_http_request))
        .layer(CorsLayer::permissive())
        .with_state(router)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, router: Arc<Router>) -> Result<(), GatewayError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Other(format!("bind {addr}: {e}")))?;
    info!(%addr, "gateway listening");
    axum::serve(listener, app(router))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Other(e.to_string()))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn handle_http_request(
    State(router): State<Arc<Router>>,
    body: String,
) -> Json<Value> {
    let response = match serde_json::from_str::<RpcRequestWrapper>(&body) {
        Ok(RpcRequestWrapper::Single(request)) => {
            serde_json::to_value(router.handle(request).await)
        }
        Ok(RpcRequestWrapper::Multiple(requests)) => {
            let mut responses = Vec::with_capacity(requests.len());
            for request in requests {
                responses.push(router.handle(request).await);
            }
            serde_json::to_value(responses)
        }
        Err(e) => serde_json::to_value(RpcResponse::error(
            Value::Null,
            RpcErrorBody::new(codes::PARSE_ERROR, format!("invalid request body: {e}")),
        )),
    };
    Json(response.unwrap_or(Value::Null))
}
