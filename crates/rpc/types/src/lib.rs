//! JSON-RPC envelope and Ethereum wire types for the ethrpc gateway.
//!
//! This crate provides the request/response envelope the gateway speaks with
//! its clients, plus the Ethereum-shaped types it decodes eagerly before
//! dispatching: block tags, quantities and the logical transaction request.
//! Everything serializes to the JSON wallets and tooling (MetaMask, Foundry,
//! etc.) expect.

use serde::{Deserialize, Serialize};

pub mod envelope;
pub mod quantity;
pub mod request;

pub use envelope::{RpcErrorBody, RpcRequest, RpcRequestWrapper, RpcResponse, JSONRPC_VERSION};
pub use quantity::{
    normalize_quantity, parse_quantity, parse_quantity_u256, to_quantity, u256_to_quantity,
};
pub use request::TransactionRequest;

/// Block number or tag as sent by Ethereum clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockNumberOrTag {
    /// Named tag (`latest`, `pending`, ...).
    Tag(BlockTag),
    /// Hex-encoded block number.
    Number(String),
}

impl Default for BlockNumberOrTag {
    fn default() -> Self {
        BlockNumberOrTag::Tag(BlockTag::Latest)
    }
}

impl BlockNumberOrTag {
    /// Wire representation, exactly as a client would have sent it.
    pub fn as_str(&self) -> &str {
        match self {
            BlockNumberOrTag::Tag(tag) => tag.as_str(),
            BlockNumberOrTag::Number(hex) => hex,
        }
    }
}

/// Standard Ethereum block tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
}

impl BlockTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockTag::Latest => "latest",
            BlockTag::Earliest => "earliest",
            BlockTag::Pending => "pending",
            BlockTag::Safe => "safe",
            BlockTag::Finalized => "finalized",
        }
    }
}

/// Sync status for `eth_syncing` responses.
///
/// The gateway only ever reports `NotSyncing(false)` itself, when the backend
/// is configured as always-synced; otherwise the backend's own answer is
/// forwarded untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncStatus {
    NotSyncing(bool),
    Syncing(SyncProgress),
}

/// Sync progress details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub starting_block: String,
    pub current_block: String,
    pub highest_block: String,
}
