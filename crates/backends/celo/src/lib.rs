//! Celo adapter.
//!
//! Celo is EVM-shaped with one twist: gas can be paid in an ERC-20 token.
//! The configured `fee_currency` rides along on gas price queries and on
//! every composed transaction, and the gas price ceiling is its own knob
//! (`gas_price_max`) because token-denominated prices do not compare against
//! the wei threshold of the shared config.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use ethrpc_gateway::backend::{Backend, BackendCore};
use ethrpc_gateway::GatewayError;
use ethrpc_types::TransactionRequest;

pub mod tx;

/// Celo-specific knobs.
#[derive(Debug, Clone)]
pub struct CeloConfig {
    /// ERC-20 paying for gas; `None` means the native token.
    pub fee_currency: Option<Address>,
    /// Gas price ceiling in the fee currency's base units.
    pub gas_price_max: U256,
}

impl Default for CeloConfig {
    fn default() -> Self {
        Self {
            fee_currency: None,
            gas_price_max: U256::from(100_000_000_000u64),
        }
    }
}

pub struct CeloBackend {
    core: BackendCore,
    config: CeloConfig,
}

impl CeloBackend {
    pub fn new(core: BackendCore, config: CeloConfig) -> Self {
        Self { core, config }
    }

    pub fn config(&self) -> &CeloConfig {
        &self.config
    }

    /// Compose → resolve signer → nonce → Celo-native sign. The fee
    /// currency is part of the signed payload, not just the estimate.
    async fn prepare_celo_transaction(
        &self,
        params: Vec<Value>,
    ) -> Result<String, GatewayError> {
        let first = params
            .first()
            .ok_or_else(|| GatewayError::InvalidParameter("missing transaction object".into()))?;
        let request = TransactionRequest::from_value(first)
            .map_err(GatewayError::InvalidParameter)?;

        let wallet = self.resolve_wallet(request.from)?;
        let mut request = request;
        request.from = Some(wallet.address());

        let mut composed = self.compose_transaction(&request, false).await?;
        if composed.nonce.is_none() {
            composed.nonce = Some(self.fetch_nonce(wallet.address()).await?);
        }

        let native = tx::CeloTransaction {
            nonce: composed.nonce.map(|n| n.to::<u64>()).unwrap_or_default(),
            gas_price: composed.gas_price.unwrap_or(self.core.gas.default_gas_price),
            gas: composed
                .gas
                .map(|g| g.to::<u64>())
                .unwrap_or(self.core.gas.default_gas_limit),
            fee_currency: self.config.fee_currency,
            to: composed.to,
            value: composed.value.unwrap_or(U256::ZERO),
            data: composed.data.clone().unwrap_or_default(),
            chain_id: self.core.chain_id,
        };

        let signature = wallet.sign_hash(&native.signature_hash())?;
        info!(from = %wallet.address(), nonce = native.nonce, "signed celo transaction");
        Ok(format!("0x{}", hex::encode(native.into_signed(signature))))
    }
}

#[async_trait]
impl Backend for CeloBackend {
    fn name(&self) -> &'static str {
        "celo"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    fn gas_price_threshold(&self) -> U256 {
        self.config.gas_price_max
    }

    /// `eth_gasPrice` with the fee currency as a parameter, the way Celo
    /// nodes quote token-denominated gas.
    async fn fetch_gas_price(&self) -> Result<U256, GatewayError> {
        let params = match self.config.fee_currency {
            Some(currency) => vec![json!(format!("{currency:#x}"))],
            None => vec![],
        };
        self.core.client.quantity_u256("eth_gasPrice", params).await
    }

    /// Attach `feeCurrency` to the outgoing call object so estimates price
    /// against the right token.
    fn rewrite_params(
        &self,
        method: &str,
        mut params: Vec<Value>,
    ) -> Result<Vec<Value>, GatewayError> {
        if matches!(
            method,
            "eth_sendTransaction" | "eth_signTransaction" | "eth_estimateGas"
        ) {
            if let (Some(currency), Some(Value::Object(fields))) =
                (self.config.fee_currency, params.first_mut())
            {
                fields
                    .entry("feeCurrency".to_string())
                    .or_insert_with(|| json!(format!("{currency:#x}")));
            }
        }
        Ok(params)
    }

    async fn send_transaction(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let raw = self.prepare_celo_transaction(params).await?;
        self.core
            .client
            .request_vec("eth_sendRawTransaction", vec![json!(raw)])
            .await
    }

    async fn sign_transaction(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let raw = self.prepare_celo_transaction(params).await?;
        Ok(json!(raw))
    }
}
