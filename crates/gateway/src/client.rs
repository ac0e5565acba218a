//! Outbound JSON-RPC client.
//!
//! [`Rpc`] is the seam between the gateway and its downstream node; the
//! production implementation is [`HttpRpc`] over reqwest. Tests substitute a
//! canned implementation the same way the RPC server crates in this
//! workspace substitute their providers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use ethrpc_types::{parse_quantity, parse_quantity_u256};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Downstream JSON-RPC connection.
#[async_trait]
pub trait Rpc: Send + Sync + 'static {
    /// Send one request and return the `result` value.
    ///
    /// Backend-reported errors surface as [`GatewayError::Backend`] when they
    /// carry a code and [`GatewayError::Execution`] when they do not.
    async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError>;

    /// Positional-params convenience wrapper.
    async fn request_vec(&self, method: &str, params: Vec<Value>) -> Result<Value, GatewayError> {
        self.request(method, Value::Array(params)).await
    }

    /// Request a 0x-hex quantity and parse it as u64.
    async fn quantity(&self, method: &str, params: Vec<Value>) -> Result<u64, GatewayError> {
        let value = self.request_vec(method, params).await?;
        let raw = value
            .as_str()
            .ok_or_else(|| GatewayError::InvalidJsonResponse(format!("{method}: {value}")))?;
        parse_quantity(raw)
            .map_err(|e| GatewayError::InvalidJsonResponse(format!("{method}: {e}")))
    }

    /// Request a 0x-hex quantity and parse it as U256.
    async fn quantity_u256(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<U256, GatewayError> {
        let value = self.request_vec(method, params).await?;
        let raw = value
            .as_str()
            .ok_or_else(|| GatewayError::InvalidJsonResponse(format!("{method}: {value}")))?;
        parse_quantity_u256(raw)
            .map_err(|e| GatewayError::InvalidJsonResponse(format!("{method}: {e}")))
    }
}

/// JSON-RPC over HTTP(S).
pub struct HttpRpc {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpRpc {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GatewayError::Other(format!("http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Rpc for HttpRpc {
    async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "backend request");

        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Other(format!("backend timeout for {method}"))
                } else if e.is_connect() {
                    GatewayError::Other(format!("backend connection failed for {method}"))
                } else {
                    GatewayError::Other(e.to_string())
                }
            })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidJsonResponse(e.to_string()))?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            warn!(method, %error, "backend error");
            return Err(match error.get("code").and_then(Value::as_i64) {
                Some(code) => GatewayError::Backend {
                    code,
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown backend error")
                        .to_string(),
                    data: error.get("data").filter(|d| !d.is_null()).cloned(),
                },
                None => GatewayError::Execution {
                    message: "backend error without code".to_string(),
                    data: Some(Value::String(error.to_string())),
                },
            });
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticRpc(Value);

    #[async_trait]
    impl Rpc for StaticRpc {
        async fn request(&self, _method: &str, _params: Value) -> Result<Value, GatewayError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn quantity_helpers_parse_hex_results() {
        let rpc = StaticRpc(json!("0x2a"));
        assert_eq!(rpc.quantity("eth_blockNumber", vec![]).await.unwrap(), 42);
        assert_eq!(
            rpc.quantity_u256("eth_gasPrice", vec![]).await.unwrap(),
            U256::from(42u64)
        );
    }

    #[tokio::test]
    async fn quantity_rejects_non_string_results() {
        let rpc = StaticRpc(json!(42));
        assert!(matches!(
            rpc.quantity("eth_blockNumber", vec![]).await,
            Err(GatewayError::InvalidJsonResponse(_))
        ));
    }
}
