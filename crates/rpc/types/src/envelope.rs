//! JSON-RPC 2.0 request and response envelopes.
//!
//! The gateway echoes request ids verbatim, including `null` and string ids,
//! so the id is carried as a raw [`serde_json::Value`] rather than a typed
//! enum. A response holds exactly one of `result` / `error`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only protocol version the gateway speaks.
pub const JSONRPC_VERSION: &str = "2.0";

/// A single inbound JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version; tolerated when absent, echoed as "2.0" regardless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    /// Request id, echoed unchanged in the response.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    /// Raw positional params; `None` and `null` are treated as empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: Value, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: Some(JSONRPC_VERSION.to_string()),
            id,
            method: method.into(),
            params: Some(Value::Array(params)),
        }
    }

    /// Positional params as a vector. Absent or `null` params are empty;
    /// anything that is not an array is rejected.
    pub fn params_vec(&self) -> Result<Vec<Value>, String> {
        match &self.params {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(format!(
                "expected positional params array, got {}",
                type_name(other)
            )),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Single request or JSON-RPC batch, per the 2.0 specification.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RpcRequestWrapper {
    Single(RpcRequest),
    Multiple(Vec<RpcRequest>),
}

/// Error body carried inside an error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorBody {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// A single outbound JSON-RPC response: success or error, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResponse {
    Success {
        jsonrpc: String,
        id: Value,
        result: Value,
    },
    Error {
        jsonrpc: String,
        id: Value,
        error: RpcErrorBody,
    },
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        RpcResponse::Success {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        }
    }

    pub fn error(id: Value, error: RpcErrorBody) -> Self {
        RpcResponse::Error {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error,
        }
    }

    pub fn id(&self) -> &Value {
        match self {
            RpcResponse::Success { id, .. } | RpcResponse::Error { id, .. } => id,
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match self {
            RpcResponse::Success { result, .. } => Some(result),
            RpcResponse::Error { .. } => None,
        }
    }

    pub fn error_body(&self) -> Option<&RpcErrorBody> {
        match self {
            RpcResponse::Success { .. } => None,
            RpcResponse::Error { error, .. } => Some(error),
        }
    }
}
