//! The logical transaction request.
//!
//! This is the object clients pass to `eth_sendTransaction`, `eth_call` and
//! `eth_estimateGas`. All fields are optional on the wire; composition fills
//! in what the backend needs and enforces the configured thresholds.

use alloy_primitives::{Address, Bytes, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transaction request as decoded from client params.
///
/// `input` is accepted as an alias of `data`; unknown fields (e.g. Celo's
/// `feeCurrency` arriving from a dapp) are dropped on decode and re-attached
/// by the owning backend where relevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Absent `to` means contract creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(alias = "input", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<U64>,
}

impl TransactionRequest {
    /// Decode from the first positional param of a call-shaped method.
    pub fn from_value(value: &Value) -> Result<Self, String> {
        serde_json::from_value(value.clone()).map_err(|e| e.to_string())
    }

    /// Wire form for forwarding to a backend.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// A request with no sender is a read-only call; gas fields may stay
    /// unset for those.
    pub fn is_read_only(&self) -> bool {
        self.from.is_none()
    }

    /// Calldata, empty when absent.
    pub fn input(&self) -> &[u8] {
        self.data.as_deref().map_or(&[], |v| v)
    }
}
