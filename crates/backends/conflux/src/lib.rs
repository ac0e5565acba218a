//! Conflux Core Space adapter.
//!
//! Conflux speaks its own JSON-RPC dialect (`cfx_*` methods, CIP-37 base32
//! addresses, epoch labels instead of block tags) and allows voluntary
//! rollbacks of non-finalized state. This adapter keeps the generic
//! composition pipeline and swaps the translation and submission layers:
//! method aliasing and parameter/response rewriting live in [`translate`],
//! the base32 codec in [`address`], and the native wire format in [`tx`].

use alloy_primitives::U256;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use ethrpc_gateway::backend::{decode_hex_payload, Backend, BackendCore, LocalMethod};
use ethrpc_gateway::{GatewayError, RollbackKind};
use ethrpc_types::{parse_quantity, to_quantity, TransactionRequest};

pub mod address;
pub mod translate;
pub mod tx;

pub use translate::EpochLabel;

/// Conflux-specific knobs on top of the shared gas config.
#[derive(Debug, Clone)]
pub struct ConfluxConfig {
    /// Epoch label `latest` maps to on read paths.
    pub epoch_label: EpochLabel,
    /// Confirmation depth: read binding offset and rollback severity
    /// threshold.
    pub confirmation_epochs: u64,
    /// CIP-37 network id, probed from `cfx_getStatus` at startup.
    pub network_id: u32,
}

impl Default for ConfluxConfig {
    fn default() -> Self {
        Self {
            epoch_label: EpochLabel::LatestState,
            confirmation_epochs: 0,
            network_id: address::MAINNET_ID,
        }
    }
}

pub struct ConfluxBackend {
    core: BackendCore,
    config: ConfluxConfig,
}

impl ConfluxBackend {
    pub fn new(core: BackendCore, config: ConfluxConfig) -> Self {
        Self { core, config }
    }

    pub fn config(&self) -> &ConfluxConfig {
        &self.config
    }

    /// Translate base32 `from`/`to` fields back to hex so the object can be
    /// decoded as a standard transaction request.
    fn to_hex_object(&self, value: &Value) -> Result<Value, GatewayError> {
        let mut out = value.clone();
        if let Value::Object(fields) = &mut out {
            for key in ["from", "to"] {
                if let Some(Value::String(raw)) = fields.get_mut(key) {
                    if address::looks_like_base32(raw) {
                        let (parsed, _) = address::decode(raw).map_err(|e| {
                            GatewayError::InvalidParameter(e.to_string())
                        })?;
                        *raw = format!("{parsed:#x}");
                    }
                }
            }
        }
        Ok(out)
    }

    /// Serialize a composed transaction as a `cfx_*` call object with
    /// base32 addresses.
    fn native_call_object(&self, tx: &TransactionRequest) -> Value {
        let mut out = tx.to_value();
        if let Value::Object(fields) = &mut out {
            for key in ["from", "to"] {
                if let Some(Value::String(raw)) = fields.get_mut(key) {
                    if let Ok(parsed) = raw.parse() {
                        *raw = address::encode(parsed, self.config.network_id);
                    }
                }
            }
        }
        out
    }

    async fn current_epoch(&self) -> Result<u64, GatewayError> {
        self.core
            .client
            .quantity(
                "cfx_epochNumber",
                vec![json!(self.config.epoch_label.as_str())],
            )
            .await
    }

    /// Collateral estimate for the storage the transaction will occupy.
    /// Plain transfers occupy none; estimation failures fall back to zero
    /// and let the node reject if it disagrees.
    async fn storage_limit(&self, tx: &TransactionRequest) -> u64 {
        if tx.input().is_empty() && tx.to.is_some() {
            return 0;
        }
        let params = vec![
            self.native_call_object(tx),
            json!(self.config.epoch_label.as_str()),
        ];
        match self
            .core
            .client
            .request_vec("cfx_estimateGasAndCollateral", params)
            .await
        {
            Ok(result) => result
                .get("storageCollateralized")
                .and_then(Value::as_str)
                .and_then(|raw| parse_quantity(raw).ok())
                .unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "storage collateral estimate failed, assuming zero");
                0
            }
        }
    }

    /// Compose → resolve signer → nonce → native sign.
    async fn prepare_native_transaction(
        &self,
        params: Vec<Value>,
    ) -> Result<String, GatewayError> {
        let first = params
            .first()
            .ok_or_else(|| GatewayError::InvalidParameter("missing transaction object".into()))?;
        let hexified = self.to_hex_object(first)?;
        let request = TransactionRequest::from_value(&hexified)
            .map_err(GatewayError::InvalidParameter)?;

        let wallet = self.resolve_wallet(request.from)?;
        let mut request = request;
        request.from = Some(wallet.address());

        let composed = self.compose_transaction(&request, false).await?;

        let nonce = match composed.nonce {
            Some(nonce) => nonce.to::<u64>(),
            None => self.fetch_nonce(wallet.address()).await?.to::<u64>(),
        };
        let storage_limit = self.storage_limit(&composed).await;
        let epoch_height = self.current_epoch().await?;

        let native = tx::NativeTransaction {
            nonce,
            gas_price: composed.gas_price.unwrap_or(self.core.gas.default_gas_price),
            gas: composed
                .gas
                .map(|g| g.to::<u64>())
                .unwrap_or(self.core.gas.default_gas_limit),
            to: tx::CallTarget(composed.to),
            value: composed.value.unwrap_or(U256::ZERO),
            storage_limit,
            epoch_height,
            chain_id: self.core.chain_id,
            data: composed.data.clone().unwrap_or_default(),
        };

        let signature = wallet.sign_hash(&native.signature_hash())?;
        info!(from = %wallet.address(), nonce, epoch_height, "signed native transaction");
        Ok(format!("0x{}", hex::encode(native.into_signed(signature))))
    }
}

#[async_trait]
impl Backend for ConfluxBackend {
    fn name(&self) -> &'static str {
        "conflux"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn alias_method<'a>(&self, method: &'a str) -> &'a str {
        translate::alias_method(method)
    }

    fn rewrite_params(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Value>, GatewayError> {
        translate::rewrite_params(
            method,
            params,
            self.config.network_id,
            self.config.epoch_label,
        )
    }

    fn rewrite_response(&self, _method: &str, result: Value) -> Result<Value, GatewayError> {
        Ok(translate::rewrite_response(&result))
    }

    fn local_method(&self, method: &str) -> Option<LocalMethod> {
        match method {
            "cfx_call" => Some(LocalMethod::Call),
            "cfx_gasPrice" => Some(LocalMethod::GasPrice),
            "cfx_getBlockByEpochNumber" => Some(LocalMethod::GetBlockByNumber),
            other => LocalMethod::classify(other, &self.core.gas),
        }
    }

    fn gas_price_method(&self) -> &'static str {
        "cfx_gasPrice"
    }

    fn block_number_method(&self) -> &'static str {
        "cfx_epochNumber"
    }

    async fn fetch_gas_limit(&self, tx: &TransactionRequest) -> Result<u64, GatewayError> {
        let params = vec![
            self.native_call_object(tx),
            json!(self.config.epoch_label.as_str()),
        ];
        let result = self
            .core
            .client
            .request_vec("cfx_estimateGasAndCollateral", params)
            .await?;
        let raw = result
            .get("gasLimit")
            .or_else(|| result.get("gasUsed"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::InvalidJsonResponse(format!(
                    "cfx_estimateGasAndCollateral: {result}"
                ))
            })?;
        parse_quantity(raw)
            .map_err(|e| GatewayError::InvalidJsonResponse(format!("gas estimate: {e}")))
    }

    async fn fetch_nonce(
        &self,
        address: alloy_primitives::Address,
    ) -> Result<alloy_primitives::U64, GatewayError> {
        let base32 = address::encode(address, self.config.network_id);
        let nonce = self
            .core
            .client
            .quantity("cfx_getNextNonce", vec![json!(base32)])
            .await?;
        Ok(alloy_primitives::U64::from(nonce))
    }

    /// Epoch observation at the configured label. Rollbacks are possible by
    /// construction on Conflux; they are traced and never abort the call.
    async fn check_rollbacks(&self) -> Result<u64, GatewayError> {
        let epoch = self.current_epoch().await?;
        match self
            .core
            .rollback
            .observe(epoch, self.config.confirmation_epochs)
        {
            RollbackKind::None => {}
            RollbackKind::Filtered { gap } => {
                warn!(epoch, gap, "filtered epoch rollback");
            }
            RollbackKind::Compromising { gap } => {
                error!(epoch, gap, "compromising epoch rollback");
            }
        }
        Ok(epoch)
    }

    async fn sign(&self, address_raw: &str, payload: &str) -> Result<Value, GatewayError> {
        // the param translator hands the address over in base32
        let hex_form = if address::looks_like_base32(address_raw) {
            let (parsed, _) = address::decode(address_raw)
                .map_err(|e| GatewayError::InvalidParameter(e.to_string()))?;
            format!("{parsed:#x}")
        } else {
            address_raw.to_string()
        };
        let wallet = self
            .core
            .wallets
            .find(&hex_form)
            .ok_or_else(|| GatewayError::UnknownSigner(address_raw.to_string()))?;
        let message = decode_hex_payload(payload)?;
        let signature = wallet.sign_message(&message)?;
        Ok(json!(format!("0x{}", hex::encode(signature))))
    }

    async fn send_transaction(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let raw = self.prepare_native_transaction(params).await?;
        self.core
            .client
            .request_vec("cfx_sendRawTransaction", vec![json!(raw)])
            .await
    }

    async fn sign_transaction(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let raw = self.prepare_native_transaction(params).await?;
        Ok(json!(raw))
    }

    async fn estimate_gas(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let first = params
            .first()
            .ok_or_else(|| GatewayError::InvalidParameter("missing transaction object".into()))?;
        let hexified = self.to_hex_object(first)?;
        let request = TransactionRequest::from_value(&hexified)
            .map_err(GatewayError::InvalidParameter)?;
        let composed = self.compose_transaction(&request, true).await?;
        let limit = match composed.gas {
            Some(limit) => limit.to::<u64>(),
            None => self.resolve_gas_limit(&composed).await?,
        };
        Ok(json!(to_quantity(limit)))
    }

    /// Read-only call: observe the epoch first, then bind to
    /// `lastKnownEpoch − confirmationEpochs` when a confirmation window is
    /// configured.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, GatewayError> {
        let call_object = params.first().cloned().unwrap_or_else(|| json!({}));
        let epoch = self.check_rollbacks().await?;

        let mut forwarded = vec![call_object];
        if self.config.confirmation_epochs > 0 {
            forwarded.push(json!(to_quantity(
                epoch.saturating_sub(self.config.confirmation_epochs)
            )));
        } else if let Some(tag) = params.get(1) {
            forwarded.push(tag.clone());
        }
        self.core.client.request_vec(method, forwarded).await
    }

    async fn latest_block(&self) -> Result<Value, GatewayError> {
        self.core
            .client
            .request_vec(
                "cfx_getBlockByEpochNumber",
                vec![json!(self.config.epoch_label.as_str()), json!(false)],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethrpc_gateway::{GasConfig, Router, Rpc};
    use ethrpc_types::RpcRequest;
    use ethrpc_wallet::WalletSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    const DEV_MNEMONIC: &str =
        "candy maple cake sugar pudding cream honey rich smooth crumble sweet treat";

    /// Mock Conflux node: serves a fixed epoch sequence and canned objects.
    struct MockCfx {
        epochs: Vec<u64>,
        cursor: AtomicU64,
    }

    impl MockCfx {
        fn new(epochs: Vec<u64>) -> Self {
            Self {
                epochs,
                cursor: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl Rpc for MockCfx {
        async fn request(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
            match method {
                "cfx_epochNumber" => {
                    let i = self.cursor.fetch_add(1, Ordering::SeqCst) as usize;
                    let epoch = *self
                        .epochs
                        .get(i)
                        .or(self.epochs.last())
                        .unwrap_or(&100);
                    Ok(json!(to_quantity(epoch)))
                }
                "cfx_gasPrice" => Ok(json!("0x3b9aca00")),
                "cfx_getNextNonce" => Ok(json!("0x7")),
                "cfx_call" => Ok(json!({"echoedParams": params})),
                "cfx_getBlockByEpochNumber" => Ok(json!({
                    "epochNumber": "0x2a",
                    "miner": "cfx:acc7uawf5ubtnmezvhu9dhc6sghea0403y2dgpyfjp",
                    "hash": "0x11"
                })),
                "cfx_sendRawTransaction" => Ok(json!(
                    "0x2222222222222222222222222222222222222222222222222222222222222222"
                )),
                "cfx_getTransactionReceipt" => Ok(json!({
                    "transactionHash": "0x2222",
                    "index": "0x0",
                    "epochNumber": "0x64",
                    "blockHash": "0x11",
                    "outcomeStatus": 0,
                    "gasUsed": "0x5208",
                    "stateRoot": "0x5001",
                    "contractCreated": null,
                    "logs": [
                        {"address": "cfx:aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa0sfbnjm2",
                         "topics": [], "data": "0x"}
                    ]
                })),
                "cfx_estimateGasAndCollateral" => Ok(json!({
                    "gasLimit": "0x5208",
                    "gasUsed": "0x5208",
                    "storageCollateralized": "0x40"
                })),
                other => Err(GatewayError::Backend {
                    code: -32601,
                    message: format!("unknown method {other}"),
                    data: None,
                }),
            }
        }
    }

    fn backend_with(epochs: Vec<u64>, confirmation_epochs: u64) -> Arc<ConfluxBackend> {
        let wallets =
            WalletSet::from_sources(Some(DEV_MNEMONIC.to_string()), 1, Vec::new()).unwrap();
        let core = BackendCore::new(
            wallets,
            Arc::new(MockCfx::new(epochs)),
            GasConfig::default(),
            address::MAINNET_ID as u64,
        );
        Arc::new(ConfluxBackend::new(
            core,
            ConfluxConfig {
                epoch_label: EpochLabel::LatestFinalized,
                confirmation_epochs,
                network_id: address::MAINNET_ID,
            },
        ))
    }

    #[tokio::test]
    async fn block_by_number_translates_method_tag_and_response() {
        let router = Router::new(backend_with(vec![100], 0));
        let response = router
            .handle(RpcRequest::new(
                json!(3),
                "eth_getBlockByNumber",
                vec![json!("latest"), json!(false)],
            ))
            .await;
        let block = response.result().unwrap();
        assert_eq!(block["epochNumber"], json!("0x2a"));
        assert_eq!(block["number"], json!("0x2a"));
        assert_eq!(block["blockNumber"], json!("0x2a"));
        assert_eq!(
            block["miner"],
            json!("0x85d80245dc02f5a89589e1f19c5c718e405b56cd")
        );
    }

    #[tokio::test]
    async fn call_binds_to_confirmation_depth_and_survives_rollbacks() {
        let backend = backend_with(vec![100, 95, 80], 12);
        let router = Router::new(backend.clone());

        // first call observes epoch 100, binds to 100-12
        let response = router
            .handle(RpcRequest::new(
                json!(1),
                "eth_call",
                vec![json!({"to": "0x85d80245dc02f5a89589e1f19c5c718e405b56cd"}), json!("latest")],
            ))
            .await;
        let echoed = &response.result().unwrap()["echoedParams"];
        assert_eq!(echoed[1], json!("0x58")); // 88

        // rollback to 95 (gap 5 < 12): warn path, still bound and answered
        let response = router
            .handle(RpcRequest::new(
                json!(2),
                "eth_call",
                vec![json!({"to": "0x85d80245dc02f5a89589e1f19c5c718e405b56cd"})],
            ))
            .await;
        assert_eq!(response.result().unwrap()["echoedParams"][1], json!("0x53")); // 95-12

        // rollback to 80 (gap 15 >= 12): error path, still proceeds
        let response = router
            .handle(RpcRequest::new(
                json!(3),
                "eth_call",
                vec![json!({"to": "0x85d80245dc02f5a89589e1f19c5c718e405b56cd"})],
            ))
            .await;
        assert_eq!(response.result().unwrap()["echoedParams"][1], json!("0x44")); // 80-12
        assert_eq!(backend.core().rollback.last_known(), 80);
    }

    #[tokio::test]
    async fn receipt_forwards_under_the_alias_and_inverts_status() {
        let router = Router::new(backend_with(vec![100], 0));
        let response = router
            .handle(RpcRequest::new(
                json!(4),
                "eth_getTransactionReceipt",
                vec![json!("0x2222")],
            ))
            .await;
        let receipt = response.result().unwrap();
        // conflux success (0) becomes ethereum success ("0x1"), the native
        // field stays
        assert_eq!(receipt["status"], json!("0x1"));
        assert_eq!(receipt["outcomeStatus"], json!(0));
        // projections
        assert_eq!(receipt["blockNumber"], json!("0x64"));
        assert_eq!(receipt["transactionIndex"], json!("0x0"));
        assert_eq!(receipt["cumulativeGasUsed"], json!("0x5208"));
        assert_eq!(receipt["root"], json!("0x5001"));
        // log enrichment from the receipt context
        let log = &receipt["logs"][0];
        assert_eq!(log["logIndex"], json!("0x0"));
        assert_eq!(log["transactionHash"], json!("0x2222"));
        assert_eq!(log["blockNumber"], json!("0x64"));
        assert_eq!(
            log["address"],
            json!("0x0000000000000000000000000000000000000000")
        );
    }

    #[tokio::test]
    async fn send_transaction_signs_natively_and_returns_backend_hash() {
        let router = Router::new(backend_with(vec![100], 0));
        let response = router
            .handle(RpcRequest::new(
                json!(5),
                "eth_sendTransaction",
                vec![json!({
                    "from": "0x627306090abab3a6e1400e9345bc60c78a8bef57",
                    "to": "0x85d80245dc02f5a89589e1f19c5c718e405b56cd",
                    "value": "0x1",
                    "gasPrice": "0x3b9aca00",
                    "gas": "0x5208"
                })],
            ))
            .await;
        assert_eq!(
            response.result().unwrap(),
            &json!("0x2222222222222222222222222222222222222222222222222222222222222222")
        );
    }

    #[tokio::test]
    async fn send_transaction_from_unknown_account_fails() {
        let router = Router::new(backend_with(vec![100], 0));
        let response = router
            .handle(RpcRequest::new(
                json!(6),
                "eth_sendTransaction",
                vec![json!({
                    "from": "0x85d80245dc02f5a89589e1f19c5c718e405b56cd",
                    "to": "0x627306090abab3a6e1400e9345bc60c78a8bef57"
                })],
            ))
            .await;
        assert_eq!(response.error_body().unwrap().code, -32000);
    }

    #[tokio::test]
    async fn nonce_is_fetched_in_base32_space() {
        let backend = backend_with(vec![100], 0);
        let nonce = backend
            .fetch_nonce(
                "0x627306090abab3a6e1400e9345bc60c78a8bef57"
                    .parse()
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(nonce.to::<u64>(), 7);
    }

    #[tokio::test]
    async fn sign_resolves_base32_addresses() {
        let backend = backend_with(vec![100], 0);
        let base32 = address::encode(
            "0x627306090abab3a6e1400e9345bc60c78a8bef57".parse().unwrap(),
            address::MAINNET_ID,
        );
        let signature = backend.sign(&base32, "0x68656c6c6f").await.unwrap();
        assert!(signature.as_str().unwrap().starts_with("0x"));

        let unknown = address::encode(
            "0x85d80245dc02f5a89589e1f19c5c718e405b56cd".parse().unwrap(),
            address::MAINNET_ID,
        );
        assert!(matches!(
            backend.sign(&unknown, "0x00").await,
            Err(GatewayError::UnknownSigner(_))
        ));
    }
}
