//! Dispatch of locally-intercepted methods.
//!
//! The router classifies a rewritten method name into a [`LocalMethod`] and
//! hands it here together with the (already preprocessed) params. Parameter
//! shapes are decoded eagerly; anything that does not match the contract is
//! an `InvalidParameter`, not a forwarded guess.

use serde_json::{json, Value};

use crate::backend::{Backend, LocalMethod, MOCK_FILTER_ID};
use crate::error::GatewayError;

/// Client-version string reported by `web3_clientVersion`.
pub const CLIENT_VERSION: &str = concat!("ethrpcd/v", env!("CARGO_PKG_VERSION"));

/// Run one local handler.
pub async fn dispatch(
    backend: &dyn Backend,
    method: LocalMethod,
    rewritten: &str,
    params: Vec<Value>,
) -> Result<Value, GatewayError> {
    match method {
        LocalMethod::Accounts => Ok(backend.accounts()),
        LocalMethod::ChainId => Ok(backend.chain_id_hex()),
        LocalMethod::NetVersion => Ok(backend.net_version()),
        LocalMethod::NetListening => Ok(json!(true)),
        LocalMethod::ClientVersion => Ok(json!(CLIENT_VERSION)),
        LocalMethod::Sign => {
            let (address, payload) = two_strings(&params)?;
            backend.sign(&address, &payload).await
        }
        LocalMethod::SendTransaction => backend.send_transaction(params).await,
        LocalMethod::SignTransaction => backend.sign_transaction(params).await,
        LocalMethod::EstimateGas => backend.estimate_gas(params).await,
        LocalMethod::GasPrice => backend.gas_price().await,
        LocalMethod::Call => backend.call(rewritten, params).await,
        LocalMethod::BlockNumber => backend.block_number().await,
        LocalMethod::GetBlockByNumber => backend.get_block_by_number(rewritten, params).await,
        LocalMethod::GetTransactionByHash => backend.transaction_by_hash(params).await,
        LocalMethod::GetTransactionReceipt => backend.transaction_receipt(params).await,
        LocalMethod::Syncing => Ok(json!(false)),
        LocalMethod::NewBlockFilter | LocalMethod::NewPendingTransactionFilter => {
            Ok(json!(MOCK_FILTER_ID))
        }
        LocalMethod::GetFilterChanges => {
            let filter_id = params
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| GatewayError::InvalidParameter("missing filter id".into()))?;
            if filter_id != MOCK_FILTER_ID {
                return Err(GatewayError::UnsupportedFilter(filter_id.to_string()));
            }
            let block = backend.latest_block().await?;
            match block.get("hash").cloned() {
                Some(hash) if !hash.is_null() => Ok(json!([hash])),
                _ => Ok(json!([])),
            }
        }
        LocalMethod::UninstallFilter => Ok(json!(true)),
    }
}

fn two_strings(params: &[Value]) -> Result<(String, String), GatewayError> {
    match params {
        [Value::String(a), Value::String(b), ..] => Ok((a.clone(), b.clone())),
        _ => Err(GatewayError::InvalidParameter(
            "expected [address, message]".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_strings_requires_both_params() {
        assert!(two_strings(&[json!("0xabc")]).is_err());
        assert!(two_strings(&[json!("0xabc"), json!(1)]).is_err());
        let (a, b) = two_strings(&[json!("0xabc"), json!("0x68")]).unwrap();
        assert_eq!(a, "0xabc");
        assert_eq!(b, "0x68");
    }
}
