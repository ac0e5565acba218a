//! The request router.
//!
//! One operation: [`Router::handle`], envelope in, envelope out. The
//! pipeline is method rewrite → parameter preprocess → dispatch (local
//! handler or raw forward) → response postprocess → envelope. Every failure
//! anywhere in the pipeline is caught and marshalled into an error envelope
//! with the request id echoed; nothing leaks to the transport layer.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use ethrpc_types::{RpcRequest, RpcResponse};

use crate::backend::Backend;
use crate::error::GatewayError;
use crate::handlers;

pub struct Router {
    backend: Arc<dyn Backend>,
}

impl Router {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    /// Process one request; always produces exactly one response with the
    /// same id.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let id = request.id.clone();
        info!(method = %request.method, backend = self.backend.name(), "rpc request");
        match self.process(&request).await {
            Ok(result) => {
                debug!(method = %request.method, %result, "rpc result");
                RpcResponse::success(id, result)
            }
            Err(err) => {
                warn!(method = %request.method, error = %err, "rpc error");
                RpcResponse::error(id, err.into_body())
            }
        }
    }

    async fn process(&self, request: &RpcRequest) -> Result<Value, GatewayError> {
        let backend = &*self.backend;
        let original = request.method.as_str();
        let rewritten = backend.alias_method(original).to_string();

        let result = match backend.local_method(&rewritten) {
            Some(local) => {
                let params = request.params_vec().map_err(GatewayError::Malformed)?;
                debug!(method = original, ?params, "local dispatch");
                let params = backend.rewrite_params(original, params)?;
                handlers::dispatch(backend, local, &rewritten, params).await?
            }
            None => {
                // Unknown methods keep their params verbatim, whatever the
                // shape; known array params still get translated.
                match request.params_vec() {
                    Ok(params) => {
                        debug!(method = original, ?params, "raw forward");
                        let params = backend.rewrite_params(original, params)?;
                        backend.raw_send(&rewritten, Value::Array(params)).await?
                    }
                    Err(_) => {
                        let params = request.params.clone().unwrap_or(Value::Null);
                        backend.raw_send(&rewritten, params).await?
                    }
                }
            }
        };

        if original.starts_with("eth_") && (result.is_object() || result.is_array()) {
            return backend.rewrite_response(original, result);
        }
        Ok(result)
    }
}
