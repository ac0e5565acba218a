//! Projection of Reef index data onto Ethereum JSON-RPC shapes.
//!
//! The GraphQL index returns Substrate blocks and extrinsics; wallets expect
//! Ethereum blocks, transactions and receipts. Fields Substrate does not
//! have are pinned to fixed values: nonce and miner are zero, gas limit and
//! gas used saturate at `0xffffffff`, extra data is empty.

use serde::Deserialize;
use serde_json::{json, Value};

use ethrpc_gateway::GatewayError;
use ethrpc_types::to_quantity;

/// Fixed gas placeholder used where Substrate has no equivalent.
const GAS_PLACEHOLDER: &str = "0xffffffff";
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
const ZERO_NONCE: &str = "0x0000000000000000";

/// Block row as selected by the queries in [`crate::graphql`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphBlock {
    pub height: u64,
    pub hash: String,
    #[serde(default)]
    pub parent_hash: String,
    #[serde(default)]
    pub state_root: String,
    /// ISO-8601 timestamp.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub finalized: bool,
    #[serde(default)]
    pub extrinsics: Vec<GraphExtrinsic>,
}

/// Extrinsic row; only evm-section extrinsics are selected.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphExtrinsic {
    pub hash: String,
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub signed_data: Option<SignedData>,
    #[serde(default)]
    pub block: Option<GraphBlockRef>,
    #[serde(default)]
    pub events: Vec<GraphEvent>,
}

/// Enclosing block of an extrinsic fetched by hash.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphBlockRef {
    pub height: u64,
    pub hash: String,
    #[serde(default)]
    pub finalized: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignedData {
    pub fee: Fee,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    /// Decimal string.
    #[serde(default)]
    pub partial_fee: String,
    #[serde(default)]
    pub weight: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEvent {
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub index: u64,
}

/// ISO-8601 → unix seconds; tolerates an already-numeric timestamp.
pub fn timestamp_seconds(raw: &str) -> u64 {
    if let Ok(seconds) = raw.parse::<u64>() {
        return seconds;
    }
    parse_iso8601(raw).unwrap_or(0)
}

fn parse_iso8601(raw: &str) -> Option<u64> {
    // "2023-05-17T12:34:56.789Z" or without fraction
    let (date, time) = raw.split_once('T')?;
    let mut date_parts = date.split('-');
    let year: i64 = date_parts.next()?.parse().ok()?;
    let month: u64 = date_parts.next()?.parse().ok()?;
    let day: u64 = date_parts.next()?.parse().ok()?;

    let time = time.trim_end_matches('Z');
    let time = time.split_once('.').map(|(t, _)| t).unwrap_or(time);
    let time = time.split_once('+').map(|(t, _)| t).unwrap_or(time);
    let mut time_parts = time.split(':');
    let hour: u64 = time_parts.next()?.parse().ok()?;
    let minute: u64 = time_parts.next()?.parse().ok()?;
    let second: u64 = time_parts.next().unwrap_or("0").parse().ok()?;

    // civil-date to days since the unix epoch
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = (y - era * 400) as u64;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146_097 + doe as i64 - 719_468;
    if days < 0 {
        return None;
    }
    Some(days as u64 * 86_400 + hour * 3_600 + minute * 60 + second)
}

/// Project a block with its evm extrinsics onto an Ethereum block.
pub fn project_block(block: &GraphBlock, full_transactions: bool) -> Value {
    let transactions: Vec<Value> = if full_transactions {
        block
            .extrinsics
            .iter()
            .enumerate()
            .map(|(i, ext)| project_transaction(ext, &block.hash, block.height, i as u64))
            .collect()
    } else {
        block
            .extrinsics
            .iter()
            .map(|ext| json!(&ext.hash))
            .collect()
    };

    json!({
        "hash": &block.hash,
        "parentHash": &block.parent_hash,
        "number": to_quantity(block.height),
        "stateRoot": &block.state_root,
        "timestamp": to_quantity(timestamp_seconds(&block.timestamp)),
        "nonce": ZERO_NONCE,
        "difficulty": 0,
        "gasLimit": GAS_PLACEHOLDER,
        "gasUsed": GAS_PLACEHOLDER,
        "miner": ZERO_ADDRESS,
        "extraData": "0x",
        "transactions": transactions,
    })
}

/// Project one evm extrinsic onto an Ethereum transaction object.
pub fn project_transaction(
    ext: &GraphExtrinsic,
    block_hash: &str,
    block_height: u64,
    index: u64,
) -> Value {
    json!({
        "hash": &ext.hash,
        "blockHash": block_hash,
        "blockNumber": to_quantity(block_height),
        "transactionIndex": to_quantity(index),
        "from": evm_event_address(ext).unwrap_or_else(|| ZERO_ADDRESS.to_string()),
        "to": evm_event_target(ext),
        "value": "0x0",
        "gas": GAS_PLACEHOLDER,
        "gasPrice": to_quantity(effective_gas_price(ext)),
        "input": "0x",
        "nonce": "0x0",
    })
}

/// Project one evm extrinsic onto an Ethereum receipt.
///
/// Requires the enclosing block to be finalized; pending state never leaves
/// the adapter.
pub fn project_receipt(ext: &GraphExtrinsic) -> Result<Value, GatewayError> {
    let block = ext.block.as_ref().ok_or_else(|| {
        GatewayError::InvalidJsonResponse("extrinsic without enclosing block".into())
    })?;
    if !block.finalized {
        return Ok(Value::Null);
    }

    let status = if ext.status == "success" { "0x1" } else { "0x0" };
    let index = to_quantity(ext.index);
    let contract_address = ext
        .events
        .iter()
        .find(|e| e.section == "evm" && e.method == "Created")
        .and_then(|e| event_address(&e.data));

    let logs: Vec<Value> = ext
        .events
        .iter()
        .filter(|e| e.section == "evm" && e.method == "Log")
        .enumerate()
        .map(|(i, event)| {
            let body = event.data.get(0).cloned().unwrap_or_else(|| json!({}));
            let mut log = match body {
                Value::Object(fields) => Value::Object(fields),
                other => json!({ "data": other }),
            };
            if let Value::Object(fields) = &mut log {
                fields.insert("logIndex".into(), json!(to_quantity(i as u64)));
                fields.insert("transactionIndex".into(), json!(&index));
                fields.insert("transactionHash".into(), json!(&ext.hash));
                fields.insert("blockHash".into(), json!(&block.hash));
                fields.insert("blockNumber".into(), json!(to_quantity(block.height)));
            }
            log
        })
        .collect();

    Ok(json!({
        "transactionHash": &ext.hash,
        "transactionIndex": index,
        "blockHash": &block.hash,
        "blockNumber": to_quantity(block.height),
        "from": evm_event_address(ext).unwrap_or_else(|| ZERO_ADDRESS.to_string()),
        "to": evm_event_target(ext),
        "status": status,
        "gasUsed": GAS_PLACEHOLDER,
        "cumulativeGasUsed": GAS_PLACEHOLDER,
        "effectiveGasPrice": to_quantity(effective_gas_price(ext)),
        "contractAddress": contract_address,
        "logs": logs,
        "logsBloom": format!("0x{}", "0".repeat(512)),
    }))
}

/// `effectiveGasPrice = partialFee / weight`.
pub fn effective_gas_price(ext: &GraphExtrinsic) -> u64 {
    let Some(signed) = &ext.signed_data else {
        return 0;
    };
    let fee: u128 = signed.fee.partial_fee.parse().unwrap_or(0);
    if signed.fee.weight == 0 {
        return 0;
    }
    (fee / u128::from(signed.fee.weight)) as u64
}

/// Sender address carried in the extrinsic's evm events.
fn evm_event_address(ext: &GraphExtrinsic) -> Option<String> {
    ext.events
        .iter()
        .find(|e| e.section == "evm")
        .and_then(|e| e.data.get(0))
        .and_then(|v| v.get("address").or(Some(v)))
        .and_then(Value::as_str)
        .filter(|s| s.starts_with("0x") && s.len() == 42)
        .map(str::to_string)
}

fn evm_event_target(ext: &GraphExtrinsic) -> Value {
    ext.events
        .iter()
        .find(|e| e.section == "evm" && (e.method == "Executed" || e.method == "ExecutedFailed"))
        .and_then(|e| e.data.get(1))
        .and_then(Value::as_str)
        .map(|s| json!(s))
        .unwrap_or(Value::Null)
}

fn event_address(data: &Value) -> Option<Value> {
    let first = data.get(0)?;
    if let Some(s) = first.as_str() {
        return Some(json!(s));
    }
    first.get("address").cloned()
}
