//! The backend wrapper: wallet set, downstream connection and gas policy.
//!
//! [`Backend`] carries the generic EVM semantics as provided methods;
//! specialized adapters (Conflux, Celo, Reef) override the translation and
//! gas hooks while keeping the composition pipeline. [`BackendCore`] is the
//! shared state every wrapper owns.

use alloy_primitives::{Address, U256, U64};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use ethrpc_types::{to_quantity, u256_to_quantity, TransactionRequest};
use ethrpc_wallet::{Wallet, WalletSet};

use crate::client::Rpc;
use crate::config::{apply_factor, apply_factor_u64, GasConfig};
use crate::error::GatewayError;
use crate::rollback::{RollbackKind, RollbackState};

use std::sync::Arc;

/// Filter id handed out by the mock filter handlers.
pub const MOCK_FILTER_ID: &str = "0x1";

/// Canonical set of locally-intercepted methods.
///
/// Everything outside this enum forwards raw to the backend, which keeps the
/// method surface open for chain-specific extensions without the gateway
/// knowing about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalMethod {
    Accounts,
    ChainId,
    NetVersion,
    NetListening,
    ClientVersion,
    Sign,
    SendTransaction,
    SignTransaction,
    EstimateGas,
    GasPrice,
    Call,
    BlockNumber,
    GetBlockByNumber,
    GetTransactionByHash,
    GetTransactionReceipt,
    Syncing,
    NewBlockFilter,
    NewPendingTransactionFilter,
    GetFilterChanges,
    UninstallFilter,
}

impl LocalMethod {
    /// Classify a (rewritten) method name against the standard Ethereum
    /// handler table.
    pub fn classify(method: &str, gas: &GasConfig) -> Option<Self> {
        Some(match method {
            "eth_accounts" => LocalMethod::Accounts,
            "eth_chainId" => LocalMethod::ChainId,
            "net_version" => LocalMethod::NetVersion,
            "net_listening" => LocalMethod::NetListening,
            "web3_clientVersion" => LocalMethod::ClientVersion,
            "eth_sign" => LocalMethod::Sign,
            "eth_sendTransaction" => LocalMethod::SendTransaction,
            "eth_signTransaction" => LocalMethod::SignTransaction,
            "eth_estimateGas" => LocalMethod::EstimateGas,
            "eth_gasPrice" => LocalMethod::GasPrice,
            "eth_call" => LocalMethod::Call,
            "eth_getBlockByNumber" => LocalMethod::GetBlockByNumber,
            "eth_syncing" if gas.always_synced => LocalMethod::Syncing,
            "eth_newBlockFilter" if gas.mock_filters => LocalMethod::NewBlockFilter,
            "eth_newPendingTransactionFilter" if gas.mock_filters => {
                LocalMethod::NewPendingTransactionFilter
            }
            "eth_getFilterChanges" if gas.mock_filters => LocalMethod::GetFilterChanges,
            "eth_uninstallFilter" => LocalMethod::UninstallFilter,
            _ => return None,
        })
    }
}

/// State shared by every backend wrapper.
pub struct BackendCore {
    pub wallets: WalletSet,
    pub client: Arc<dyn Rpc>,
    pub gas: GasConfig,
    /// Downstream chain id, probed once at startup.
    pub chain_id: u64,
    pub rollback: RollbackState,
}

impl BackendCore {
    pub fn new(wallets: WalletSet, client: Arc<dyn Rpc>, gas: GasConfig, chain_id: u64) -> Self {
        Self {
            wallets,
            client,
            gas,
            chain_id,
            rollback: RollbackState::new(),
        }
    }
}

/// One backend wrapper: translation hooks plus the operations the local
/// handlers need. Provided implementations carry the generic EVM behavior.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn core(&self) -> &BackendCore;

    // ---- routing hooks -------------------------------------------------

    /// Method rewrite. The handler table is keyed by the rewritten name,
    /// parameter translators by the original one.
    fn alias_method<'a>(&self, method: &'a str) -> &'a str {
        method
    }

    /// Parameter preprocessor, keyed by the original method name.
    /// Side-effect free apart from tracing.
    fn rewrite_params(
        &self,
        _method: &str,
        params: Vec<Value>,
    ) -> Result<Vec<Value>, GatewayError> {
        Ok(params)
    }

    /// Response postprocessor for structured results of `eth_*` methods.
    fn rewrite_response(&self, _method: &str, result: Value) -> Result<Value, GatewayError> {
        Ok(result)
    }

    /// Classify a rewritten method into a local handler.
    fn local_method(&self, method: &str) -> Option<LocalMethod> {
        LocalMethod::classify(method, &self.core().gas)
    }

    /// Forward a request verbatim.
    async fn raw_send(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        self.core().client.request(method, params).await
    }

    // ---- gas hooks -----------------------------------------------------

    fn gas_price_method(&self) -> &'static str {
        "eth_gasPrice"
    }

    fn block_number_method(&self) -> &'static str {
        "eth_blockNumber"
    }

    /// Ceiling for gas price rejection.
    fn gas_price_threshold(&self) -> U256 {
        self.core().gas.default_gas_price
    }

    /// Ask the backend for its gas price.
    async fn fetch_gas_price(&self) -> Result<U256, GatewayError> {
        self.core()
            .client
            .quantity_u256(self.gas_price_method(), vec![])
            .await
    }

    /// Ask the backend for a gas limit estimate.
    async fn fetch_gas_limit(&self, tx: &TransactionRequest) -> Result<u64, GatewayError> {
        self.core()
            .client
            .quantity("eth_estimateGas", vec![tx.to_value()])
            .await
    }

    /// Next nonce for an owned account.
    async fn fetch_nonce(&self, address: Address) -> Result<U64, GatewayError> {
        let nonce = self
            .core()
            .client
            .quantity(
                "eth_getTransactionCount",
                vec![json!(format!("{address:#x}")), json!("pending")],
            )
            .await?;
        Ok(U64::from(nonce))
    }

    /// Gas price per policy: backend estimate × factor, capped, or the
    /// configured default.
    async fn resolve_gas_price(&self) -> Result<U256, GatewayError> {
        let gas = &self.core().gas;
        if !gas.estimate_gas_price {
            return Ok(gas.default_gas_price);
        }
        let estimate = self
            .fetch_gas_price()
            .await
            .map_err(|e| GatewayError::UnpredictableGasPrice(e.to_string()))?;
        let price = apply_factor(estimate, gas.gas_price_factor);
        let threshold = self.gas_price_threshold();
        if price > threshold {
            return Err(GatewayError::EstimatedGasPriceAboveThreshold { price, threshold });
        }
        Ok(price)
    }

    /// Gas limit per policy, symmetric to [`Backend::resolve_gas_price`].
    async fn resolve_gas_limit(&self, tx: &TransactionRequest) -> Result<u64, GatewayError> {
        let gas = &self.core().gas;
        if !gas.estimate_gas_limit {
            return Ok(gas.default_gas_limit);
        }
        let estimate = self
            .fetch_gas_limit(tx)
            .await
            .map_err(|e| GatewayError::UnpredictableGasLimit(e.to_string()))?;
        let limit = apply_factor_u64(estimate, gas.gas_limit_factor);
        if limit > gas.default_gas_limit {
            return Err(GatewayError::EstimatedGasLimitAboveThreshold {
                limit,
                threshold: gas.default_gas_limit,
            });
        }
        Ok(limit)
    }

    // ---- transaction composition --------------------------------------

    /// Build a backend-compliant transaction from client params.
    ///
    /// Nonce acquisition is deliberately not part of composition; the send
    /// handlers fetch it after signer resolution.
    async fn compose_transaction(
        &self,
        request: &TransactionRequest,
        clear_gas: bool,
    ) -> Result<TransactionRequest, GatewayError> {
        let core = self.core();
        let gas_cfg = &core.gas;
        let mut tx = request.clone();
        if clear_gas {
            tx.gas = None;
        }

        if gas_cfg.force_eip155 && tx.chain_id.is_none() {
            tx.chain_id = Some(U64::from(core.chain_id));
        }
        if gas_cfg.force_eip1559 {
            tx.tx_type = Some(U64::from(2u64));
        }
        // type-2 signing cannot do without a chain id
        if tx.tx_type.map(|t| t.to::<u64>()) == Some(2) && tx.chain_id.is_none() {
            tx.chain_id = Some(U64::from(core.chain_id));
        }

        match (tx.from.is_some(), tx.gas_price) {
            // read-only call with no explicit price: leave unset
            (false, None) => {}
            (_, None) => tx.gas_price = Some(self.resolve_gas_price().await?),
            (_, Some(price)) => {
                let threshold = self.gas_price_threshold();
                if price > threshold {
                    return Err(GatewayError::GasPriceAboveThreshold { price, threshold });
                }
            }
        }

        match (tx.from.is_some(), tx.gas) {
            (false, None) => {}
            (_, None) => tx.gas = Some(U64::from(self.resolve_gas_limit(&tx).await?)),
            (_, Some(limit)) => {
                let limit = limit.to::<u64>();
                if limit > gas_cfg.default_gas_limit {
                    return Err(GatewayError::GasLimitAboveThreshold {
                        limit,
                        threshold: gas_cfg.default_gas_limit,
                    });
                }
            }
        }

        if gas_cfg.force_eip1559 {
            if tx.max_fee_per_gas.is_none() {
                tx.max_fee_per_gas = tx.gas_price;
            }
            if tx.max_priority_fee_per_gas.is_none() {
                tx.max_priority_fee_per_gas = tx.gas_price;
            }
        }

        Ok(tx)
    }

    /// Resolve the signing wallet: explicit `from` must be owned, absent
    /// `from` falls back to the default sender.
    fn resolve_wallet(&self, from: Option<Address>) -> Result<&Wallet, GatewayError> {
        match from {
            Some(address) => self
                .core()
                .wallets
                .get(address)
                .ok_or_else(|| GatewayError::UnknownSigner(address.to_checksum(None))),
            None => Ok(self.core().wallets.default_wallet()),
        }
    }

    // ---- rollback handling --------------------------------------------

    /// Observe the backend head before a bound read. Rollbacks are traced,
    /// never fatal.
    async fn check_rollbacks(&self) -> Result<u64, GatewayError> {
        let core = self.core();
        let head = core
            .client
            .quantity(self.block_number_method(), vec![])
            .await?;
        match core.rollback.observe(head, core.gas.interleave_blocks) {
            RollbackKind::None => {}
            RollbackKind::Filtered { gap } => {
                warn!(backend = self.name(), head, gap, "filtered backend rollback");
            }
            RollbackKind::Compromising { gap } => {
                error!(
                    backend = self.name(),
                    head, gap, "compromising backend rollback"
                );
            }
        }
        Ok(head)
    }

    // ---- local handler operations -------------------------------------

    fn accounts(&self) -> Value {
        Value::Array(
            self.core()
                .wallets
                .addresses()
                .into_iter()
                .map(Value::String)
                .collect(),
        )
    }

    fn chain_id_hex(&self) -> Value {
        json!(to_quantity(self.core().chain_id))
    }

    fn net_version(&self) -> Value {
        json!(self.core().chain_id.to_string())
    }

    /// `eth_sign`: EIP-191 signature from an owned account.
    async fn sign(&self, address: &str, payload: &str) -> Result<Value, GatewayError> {
        let wallet = self
            .core()
            .wallets
            .find(address)
            .ok_or_else(|| GatewayError::UnknownSigner(address.to_string()))?;
        let message = decode_hex_payload(payload)?;
        let signature = wallet.sign_message(&message)?;
        Ok(json!(format!("0x{}", hex::encode(signature))))
    }

    /// `eth_sendTransaction`: compose, sign and submit raw.
    async fn send_transaction(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let tx = self.prepare_signed_transaction(params).await?;
        self.core()
            .client
            .request_vec("eth_sendRawTransaction", vec![json!(tx.raw_hex)])
            .await
    }

    /// `eth_signTransaction`: compose and sign, return the raw bytes.
    async fn sign_transaction(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let tx = self.prepare_signed_transaction(params).await?;
        Ok(json!(tx.raw_hex))
    }

    /// Shared compose → resolve signer → nonce → sign path.
    async fn prepare_signed_transaction(
        &self,
        params: Vec<Value>,
    ) -> Result<SignedTransaction, GatewayError> {
        let first = params
            .first()
            .ok_or_else(|| GatewayError::InvalidParameter("missing transaction object".into()))?;
        let request = TransactionRequest::from_value(first)
            .map_err(GatewayError::InvalidParameter)?;

        let wallet = self.resolve_wallet(request.from)?;
        let mut request = request;
        request.from = Some(wallet.address());

        let mut tx = self.compose_transaction(&request, false).await?;
        if tx.nonce.is_none() {
            tx.nonce = Some(self.fetch_nonce(wallet.address()).await?);
        }

        let raw = wallet.sign_transaction(&tx)?;
        info!(
            backend = self.name(),
            from = %wallet.address(),
            nonce = tx.nonce.map(|n| n.to::<u64>()),
            "signed transaction"
        );
        Ok(SignedTransaction {
            raw_hex: format!("0x{}", hex::encode(raw)),
        })
    }

    /// `eth_estimateGas`: composition with the gas field cleared.
    async fn estimate_gas(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let first = params
            .first()
            .ok_or_else(|| GatewayError::InvalidParameter("missing transaction object".into()))?;
        let request = TransactionRequest::from_value(first)
            .map_err(GatewayError::InvalidParameter)?;
        let tx = self.compose_transaction(&request, true).await?;
        let limit = match tx.gas {
            Some(limit) => limit.to::<u64>(),
            None => self.resolve_gas_limit(&tx).await?,
        };
        Ok(json!(to_quantity(limit)))
    }

    /// `eth_gasPrice`: policy price when factoring is on, raw backend price
    /// otherwise.
    async fn gas_price(&self) -> Result<Value, GatewayError> {
        let price = if self.core().gas.eth_gas_price_factor {
            self.resolve_gas_price().await?
        } else {
            self.fetch_gas_price().await?
        };
        Ok(json!(u256_to_quantity(price)))
    }

    /// `eth_call`: compose (no nonce), optionally rebind to an interleaved
    /// block after a rollback check, forward.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, GatewayError> {
        let first = params
            .first()
            .ok_or_else(|| GatewayError::InvalidParameter("missing call object".into()))?;
        let request = TransactionRequest::from_value(first)
            .map_err(GatewayError::InvalidParameter)?;
        let tx = self.compose_transaction(&request, false).await?;

        let mut forwarded = vec![tx.to_value()];
        let interleave = self.core().gas.interleave_blocks;
        if interleave > 0 {
            let head = self.check_rollbacks().await?;
            forwarded.push(json!(to_quantity(head.saturating_sub(interleave))));
        } else if let Some(tag) = params.get(1) {
            forwarded.push(tag.clone());
        }
        self.core().client.request_vec(method, forwarded).await
    }

    /// `eth_blockNumber`, for adapters that synthesize it rather than
    /// forward it.
    async fn block_number(&self) -> Result<Value, GatewayError> {
        self.core()
            .client
            .request_vec("eth_blockNumber", vec![])
            .await
    }

    /// `eth_getTransactionByHash`, for adapters without a native Ethereum
    /// view of transactions.
    async fn transaction_by_hash(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        self.core()
            .client
            .request_vec("eth_getTransactionByHash", params)
            .await
    }

    /// `eth_getTransactionReceipt`, see [`Backend::transaction_by_hash`].
    async fn transaction_receipt(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        self.core()
            .client
            .request_vec("eth_getTransactionReceipt", params)
            .await
    }

    /// `eth_getBlockByNumber`: forward, then normalize the numeric fields
    /// providers are inconsistent about.
    async fn get_block_by_number(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, GatewayError> {
        let result = self.core().client.request_vec(method, params).await?;
        Ok(normalize_block_quantities(result))
    }

    /// Latest block, used by the mock filter handler.
    async fn latest_block(&self) -> Result<Value, GatewayError> {
        self.core()
            .client
            .request_vec("eth_getBlockByNumber", vec![json!("latest"), json!(false)])
            .await
    }
}

/// Result of the shared signing path.
#[derive(Debug)]
pub struct SignedTransaction {
    pub raw_hex: String,
}

/// Decode a 0x-prefixed hex payload from client params.
pub fn decode_hex_payload(payload: &str) -> Result<Vec<u8>, GatewayError> {
    let digits = payload.strip_prefix("0x").unwrap_or(payload);
    hex::decode(digits)
        .map_err(|e| GatewayError::InvalidParameter(format!("invalid hex message: {e}")))
}

/// Normalize block fields that some providers return as numbers or wrapped
/// big-number objects.
pub fn normalize_block_quantities(mut block: Value) -> Value {
    const QUANTITY_FIELDS: [&str; 5] = [
        "baseFeePerGas",
        "difficulty",
        "_difficulty",
        "gasLimit",
        "gasUsed",
    ];
    if let Value::Object(fields) = &mut block {
        for key in QUANTITY_FIELDS {
            if let Some(value) = fields.get(key) {
                let normalized = ethrpc_types::normalize_quantity(value);
                fields.insert(key.to_string(), normalized);
            }
        }
    }
    block
}
