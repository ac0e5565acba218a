//! Bidirectional Ethereum ↔ Conflux translation.
//!
//! Parameters are rewritten on the way in (hex addresses to CIP-37, block
//! tags to epoch labels); responses are rebuilt on the way out (CIP-37
//! strings back to hex, Conflux field names projected onto their Ethereum
//! counterparts, outcome status inverted). The response pass is a pure
//! recursive rebuild; re-running it on an already-Ethereum-shaped tree is a
//! no-op.

use alloy_primitives::Address;
use serde_json::{Map, Value};

use ethrpc_gateway::GatewayError;
use ethrpc_types::to_quantity;

use crate::address;

/// Epoch label read-only calls are bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EpochLabel {
    #[default]
    LatestState,
    LatestConfirmed,
    LatestFinalized,
    LatestCheckpoint,
}

impl EpochLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EpochLabel::LatestState => "latest_state",
            EpochLabel::LatestConfirmed => "latest_confirmed",
            EpochLabel::LatestFinalized => "latest_finalized",
            EpochLabel::LatestCheckpoint => "latest_checkpoint",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "latest_state" => EpochLabel::LatestState,
            "latest_confirmed" => EpochLabel::LatestConfirmed,
            "latest_finalized" => EpochLabel::LatestFinalized,
            "latest_checkpoint" => EpochLabel::LatestCheckpoint,
            _ => return None,
        })
    }
}

/// Method rewrite table, Ethereum name → Conflux native name.
pub fn alias_method(method: &str) -> &str {
    match method {
        "eth_blockNumber" => "cfx_epochNumber",
        "eth_call" => "cfx_call",
        "eth_gasPrice" => "cfx_gasPrice",
        "eth_getBalance" => "cfx_getBalance",
        "eth_getBlockByHash" => "cfx_getBlockByHash",
        "eth_getBlockByNumber" => "cfx_getBlockByEpochNumber",
        "eth_getCode" => "cfx_getCode",
        "eth_getLogs" => "cfx_getLogs",
        "eth_getStorageAt" => "cfx_getStorageAt",
        "eth_getTransactionByHash" => "cfx_getTransactionByHash",
        "eth_getTransactionCount" => "cfx_getNextNonce",
        "eth_getTransactionReceipt" => "cfx_getTransactionReceipt",
        other => other,
    }
}

/// Ethereum block tag → Conflux epoch tag. Unknown values pass through
/// (hex numbers, `earliest`, explicit epoch labels).
pub fn translate_tag(tag: &str, label: EpochLabel) -> String {
    match tag {
        "latest" => label.as_str().to_string(),
        "pending" => EpochLabel::LatestCheckpoint.as_str().to_string(),
        other => other.to_string(),
    }
}

/// Parameter preprocessor, keyed by the original Ethereum method name.
pub fn rewrite_params(
    method: &str,
    mut params: Vec<Value>,
    network_id: u32,
    label: EpochLabel,
) -> Result<Vec<Value>, GatewayError> {
    match method {
        "eth_call" | "eth_estimateGas" | "eth_sendTransaction" | "eth_signTransaction" => {
            if let Some(Value::Object(fields)) = params.first_mut() {
                translate_address_field(fields, "from", network_id)?;
                translate_address_field(fields, "to", network_id)?;
            }
            translate_tag_param(&mut params, 1, label);
        }
        "eth_getBalance" | "eth_getCode" | "eth_getTransactionCount" => {
            translate_address_param(&mut params, 0, network_id)?;
            translate_tag_param(&mut params, 1, label);
        }
        "eth_getStorageAt" => {
            translate_address_param(&mut params, 0, network_id)?;
            translate_tag_param(&mut params, 2, label);
        }
        "eth_getBlockByNumber" => {
            translate_tag_param(&mut params, 0, label);
        }
        "eth_sign" => {
            translate_address_param(&mut params, 0, network_id)?;
        }
        "eth_getLogs" => {
            if let Some(Value::Object(filter)) = params.first_mut() {
                translate_filter(filter, network_id, label)?;
            }
        }
        _ => {}
    }
    Ok(params)
}

/// Log filters carry addresses (single or list) and block-tag bounds.
fn translate_filter(
    filter: &mut Map<String, Value>,
    network_id: u32,
    label: EpochLabel,
) -> Result<(), GatewayError> {
    match filter.get_mut("address") {
        Some(Value::String(raw)) => *raw = eth_to_cfx(raw, network_id)?,
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::String(raw) = item {
                    *raw = eth_to_cfx(raw, network_id)?;
                }
            }
        }
        _ => {}
    }
    for key in ["fromBlock", "toBlock", "fromEpoch", "toEpoch"] {
        if let Some(Value::String(tag)) = filter.get_mut(key) {
            *tag = translate_tag(tag, label);
        }
    }
    Ok(())
}

fn translate_address_param(
    params: &mut [Value],
    index: usize,
    network_id: u32,
) -> Result<(), GatewayError> {
    if let Some(value) = params.get_mut(index) {
        if let Value::String(raw) = value {
            *raw = eth_to_cfx(raw, network_id)?;
        }
    }
    Ok(())
}

fn translate_address_field(
    fields: &mut Map<String, Value>,
    key: &str,
    network_id: u32,
) -> Result<(), GatewayError> {
    if let Some(Value::String(raw)) = fields.get_mut(key) {
        *raw = eth_to_cfx(raw, network_id)?;
    }
    Ok(())
}

fn translate_tag_param(params: &mut [Value], index: usize, label: EpochLabel) {
    if let Some(Value::String(tag)) = params.get_mut(index) {
        *tag = translate_tag(tag, label);
    }
}

/// Hex address → CIP-37. Input that is already base32 passes through.
pub fn eth_to_cfx(raw: &str, network_id: u32) -> Result<String, GatewayError> {
    if address::looks_like_base32(raw) {
        return Ok(raw.to_string());
    }
    let parsed: Address = raw
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| GatewayError::InvalidParameter(format!("invalid address '{raw}'")))?;
    Ok(address::encode(parsed, network_id))
}

/// Field projections applied to every response object: source key →
/// derived keys it is also exposed as.
const DERIVED_KEYS: &[(&str, &[&str])] = &[
    ("epochNumber", &["number", "blockNumber"]),
    ("index", &["transactionIndex"]),
    ("gasUsed", &["cumulativeGasUsed"]),
    ("contractCreated", &["contractAddress"]),
    ("stateRoot", &["root"]),
];

/// Rebuild a backend response into Ethereum shape.
///
/// Pure recursive descent: base32 strings become hex, Conflux field names
/// gain their Ethereum aliases, `outcomeStatus` is inverted into Ethereum
/// `status` semantics, and receipt logs are enriched with their enclosing
/// context.
pub fn rewrite_response(value: &Value) -> Value {
    match value {
        Value::String(raw) => Value::String(cfx_string_to_hex(raw)),
        Value::Array(items) => Value::Array(items.iter().map(rewrite_response).collect()),
        Value::Object(fields) => rewrite_object(fields),
        other => other.clone(),
    }
}

fn rewrite_object(fields: &Map<String, Value>) -> Value {
    let mut out = Map::with_capacity(fields.len() + 4);
    for (key, value) in fields {
        let rebuilt = rewrite_response(value);
        for (source, derived) in DERIVED_KEYS {
            if key == source {
                for alias in *derived {
                    out.insert((*alias).to_string(), rebuilt.clone());
                }
            }
        }
        out.insert(key.clone(), rebuilt);
    }

    // Conflux outcome semantics are inverted: 0 is success. The projection
    // is driven by `outcomeStatus` (receipts) or a numeric `status`
    // (transactions); Ethereum-native "0x0"/"0x1" strings stay untouched.
    if let Some(outcome) = fields.get("outcomeStatus") {
        out.insert("status".to_string(), invert_status(outcome));
    } else if let Some(status) = fields.get("status") {
        if status.is_number() || matches!(status, Value::String(s) if !s.starts_with("0x")) {
            out.insert("status".to_string(), invert_status(status));
        }
    }

    enrich_logs(&mut out);
    Value::Object(out)
}

/// Conflux 0 = success, Ethereum "0x1" = success.
fn invert_status(value: &Value) -> Value {
    let is_success = match value {
        Value::Number(n) => n.as_u64() == Some(0),
        Value::String(s) => matches!(s.as_str(), "0" | "0x0"),
        _ => false,
    };
    Value::String(if is_success { "0x1" } else { "0x0" }.to_string())
}

fn enrich_logs(out: &mut Map<String, Value>) {
    let context: Vec<(&str, Option<Value>)> = vec![
        ("transactionIndex", out.get("transactionIndex").cloned()),
        ("transactionHash", out.get("transactionHash").cloned()),
        ("blockNumber", out.get("blockNumber").cloned()),
        ("blockHash", out.get("blockHash").cloned()),
    ];
    let Some(Value::Array(logs)) = out.get_mut("logs") else {
        return;
    };
    for (index, log) in logs.iter_mut().enumerate() {
        let Value::Object(log_fields) = log else {
            continue;
        };
        log_fields.insert("logIndex".to_string(), Value::String(to_quantity(index as u64)));
        for (key, value) in &context {
            if let Some(value) = value {
                log_fields.insert((*key).to_string(), value.clone());
            }
        }
    }
}

fn cfx_string_to_hex(raw: &str) -> String {
    if !address::looks_like_base32(raw) {
        return raw.to_string();
    }
    match address::decode(raw) {
        Ok((addr, _)) => format!("{addr:#x}"),
        Err(_) => raw.to_string(),
    }
}
