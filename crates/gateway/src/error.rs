//! The gateway error sum and its JSON-RPC projection.
//!
//! Every layer maps its native failures into [`GatewayError`] exactly once,
//! at the boundary; the router's error-to-envelope translation is the single
//! match in [`GatewayError::into_body`]. Backend errors that already carry a
//! JSON-RPC code pass through unchanged apart from the envelope.

use alloy_primitives::U256;
use ethrpc_types::RpcErrorBody;
use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error codes used by the gateway.
pub mod codes {
    /// Parse error: unparseable envelope, params or backend body.
    pub const PARSE_ERROR: i64 = -32700;
    /// Method not found.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Server error: unknown signer.
    pub const UNKNOWN_SIGNER: i64 = -32000;
    /// Unknown filter id.
    pub const UNSUPPORTED_FILTER: i64 = -32500;
    /// Backend surfaced a revert or execution failure.
    pub const EXECUTION_ERROR: i64 = -32015;
    /// Gas tuning violations and the catch-all.
    pub const SERVER_ERROR: i64 = -32099;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("the method {0} does not exist/is not available")]
    UnknownMethod(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown signer {0}")]
    UnknownSigner(String),

    #[error("unsupported filter {0}")]
    UnsupportedFilter(String),

    #[error("execution error: {message}")]
    Execution {
        message: String,
        data: Option<Value>,
    },

    #[error("Gas price exceeds threshold: {price} > {threshold} wei")]
    GasPriceAboveThreshold { price: U256, threshold: U256 },

    #[error("Estimated gas price exceeds threshold: {price} > {threshold} wei")]
    EstimatedGasPriceAboveThreshold { price: U256, threshold: U256 },

    #[error("Gas limit exceeds threshold: {limit} > {threshold}")]
    GasLimitAboveThreshold { limit: u64, threshold: u64 },

    #[error("Estimated gas limit exceeds threshold: {limit} > {threshold}")]
    EstimatedGasLimitAboveThreshold { limit: u64, threshold: u64 },

    #[error("gas price could not be estimated: {0}")]
    UnpredictableGasPrice(String),

    #[error("gas limit could not be estimated: {0}")]
    UnpredictableGasLimit(String),

    #[error("invalid JSON from backend: {0}")]
    InvalidJsonResponse(String),

    /// An error the backend reported with its own code; passed through.
    #[error("backend error {code}: {message}")]
    Backend {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("wallet error: {0}")]
    Wallet(#[from] ethrpc_wallet::WalletError),

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// JSON-RPC error code for this kind.
    pub fn code(&self) -> i64 {
        match self {
            GatewayError::Malformed(_) | GatewayError::InvalidJsonResponse(_) => {
                codes::PARSE_ERROR
            }
            GatewayError::UnknownMethod(_) => codes::METHOD_NOT_FOUND,
            GatewayError::InvalidParameter(_) => codes::INVALID_PARAMS,
            GatewayError::UnknownSigner(_) | GatewayError::Wallet(_) => codes::UNKNOWN_SIGNER,
            GatewayError::UnsupportedFilter(_) => codes::UNSUPPORTED_FILTER,
            GatewayError::Execution { .. } => codes::EXECUTION_ERROR,
            GatewayError::Backend { code, .. } => *code,
            GatewayError::GasPriceAboveThreshold { .. }
            | GatewayError::EstimatedGasPriceAboveThreshold { .. }
            | GatewayError::GasLimitAboveThreshold { .. }
            | GatewayError::EstimatedGasLimitAboveThreshold { .. }
            | GatewayError::UnpredictableGasPrice(_)
            | GatewayError::UnpredictableGasLimit(_)
            | GatewayError::Other(_) => codes::SERVER_ERROR,
        }
    }

    /// The single error-to-envelope translation.
    pub fn into_body(self) -> RpcErrorBody {
        let code = self.code();
        match self {
            GatewayError::Backend {
                message, data, ..
            }
            | GatewayError::Execution { message, data } => RpcErrorBody {
                code,
                message,
                data,
            },
            other => RpcErrorBody::new(code, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn codes_follow_the_taxonomy() {
        assert_eq!(GatewayError::Malformed("x".into()).code(), -32700);
        assert_eq!(GatewayError::UnknownMethod("m".into()).code(), -32601);
        assert_eq!(GatewayError::InvalidParameter("p".into()).code(), -32602);
        assert_eq!(GatewayError::UnknownSigner("0x0".into()).code(), -32000);
        assert_eq!(GatewayError::UnsupportedFilter("0x2".into()).code(), -32500);
        assert_eq!(
            GatewayError::Execution {
                message: "revert".into(),
                data: None
            }
            .code(),
            -32015
        );
        assert_eq!(GatewayError::InvalidJsonResponse("x".into()).code(), -32700);
        assert_eq!(
            GatewayError::EstimatedGasPriceAboveThreshold {
                price: U256::from(25_000_000_000u64),
                threshold: U256::from(20_000_000_000u64),
            }
            .code(),
            -32099
        );
        assert_eq!(GatewayError::Other("anything".into()).code(), -32099);
    }

    #[test]
    fn backend_errors_pass_through_code_message_and_data() {
        let body = GatewayError::Backend {
            code: 3,
            message: "execution reverted".into(),
            data: Some(json!("0x08c379a0")),
        }
        .into_body();
        assert_eq!(body.code, 3);
        assert_eq!(body.message, "execution reverted");
        assert_eq!(body.data, Some(json!("0x08c379a0")));
    }

    #[test]
    fn threshold_message_names_the_estimate() {
        let err = GatewayError::EstimatedGasPriceAboveThreshold {
            price: U256::from(25_000_000_000u64),
            threshold: U256::from(20_000_000_000u64),
        };
        assert!(err
            .to_string()
            .contains("Estimated gas price exceeds threshold"));
    }
}
