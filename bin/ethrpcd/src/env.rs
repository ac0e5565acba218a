//! Environment collection.
//!
//! Everything the gateway reads from the environment is gathered here, once,
//! into typed config before any component is built. Lookup is injected so
//! tests can drive the parser without touching process state.

use alloy_primitives::U256;
use ethrpc_gateway::GasConfig;
use ethrpc_types::parse_quantity_u256;

/// Gateway-wide settings.
#[derive(Debug, Clone)]
pub struct GatewayEnv {
    pub port: u16,
    pub provider_url: String,
    pub provider_key: Option<String>,
    pub network: String,
    pub seed_phrase: Option<String>,
    pub seed_phrase_wallets: u32,
    pub private_keys: Vec<String>,
    pub log_level: String,
    pub call_interleave_blocks: u64,
    pub conflux_epoch_label: Option<String>,
    pub conflux_confirmation_epochs: u64,
    pub reef_graphql_url: Option<String>,
    pub celo_fee_currency: Option<String>,
    pub celo_gas_price_max: Option<U256>,
}

impl GatewayEnv {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: parse_or(&lookup, "ETHRPC_PORT", 8545),
            provider_url: lookup("ETHRPC_PROVIDER_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8645".to_string()),
            provider_key: lookup("ETHRPC_PROVIDER_KEY"),
            network: lookup("ETHRPC_NETWORK").unwrap_or_else(|| "ethers".to_string()),
            seed_phrase: lookup("ETHRPC_SEED_PHRASE"),
            seed_phrase_wallets: parse_or(&lookup, "ETHRPC_SEED_PHRASE_WALLETS", 5),
            private_keys: lookup("ETHRPC_PRIVATE_KEYS")
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or_default(),
            log_level: lookup("ETHRPC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            call_interleave_blocks: parse_or(&lookup, "ETHRPC_CALL_INTERLEAVE_BLOCKS", 0),
            conflux_epoch_label: lookup("ETHRPC_CONFLUX_DEFAULT_EPOCH_LABEL"),
            conflux_confirmation_epochs: parse_or(
                &lookup,
                "ETHRPC_CONFLUX_CONFIRMATION_EPOCHS",
                0,
            ),
            reef_graphql_url: lookup("REEF_GRAPHQL_URL"),
            celo_fee_currency: lookup("CELO_FEE_CURRENCY"),
            celo_gas_price_max: lookup("CELO_GAS_PRICE_MAX")
                .and_then(|raw| parse_amount(&raw)),
        }
    }

    /// Gas-tuning prefix for the selected network
    /// (`ETHRPC_CONFLUX_GAS_PRICE`, `ETHRPC_INFURA_FORCE_EIP_1559`, ...).
    pub fn gas_prefix(&self) -> String {
        format!("ETHRPC_{}_", self.network.to_ascii_uppercase())
    }

    /// Per-backend gas config from the prefixed variables.
    pub fn gas_config(&self, lookup: impl Fn(&str) -> Option<String>) -> GasConfig {
        let prefix = self.gas_prefix();
        let var = |suffix: &str| lookup(&format!("{prefix}{suffix}"));
        let defaults = GasConfig::default();
        GasConfig {
            default_gas_price: var("GAS_PRICE")
                .and_then(|raw| parse_amount(&raw))
                .unwrap_or(defaults.default_gas_price),
            default_gas_limit: var("GAS_LIMIT")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.default_gas_limit),
            estimate_gas_price: flag(var("ESTIMATE_GAS_PRICE")),
            estimate_gas_limit: flag(var("ESTIMATE_GAS_LIMIT")),
            gas_price_factor: var("GAS_PRICE_FACTOR")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(1.0),
            gas_limit_factor: var("GAS_LIMIT_FACTOR")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(1.0),
            force_eip155: flag(var("FORCE_EIP_155")),
            force_eip1559: flag(var("FORCE_EIP_1559")),
            interleave_blocks: self.call_interleave_blocks,
            always_synced: flag(var("ALWAYS_SYNCED"))
                || (self.network == "conflux" && flag(lookup("ETHRPC_CONFLUX_ALWAYS_SYNCED"))),
            mock_filters: flag(var("MOCK_FILTERS")),
            eth_gas_price_factor: flag(var("ETH_GAS_PRICE_FACTOR")),
        }
    }

    /// Effective provider URL; an Infura-style key is appended as a path
    /// segment.
    pub fn provider_url(&self) -> String {
        match &self.provider_key {
            Some(key) if self.network == "infura" => {
                format!("{}/{}", self.provider_url.trim_end_matches('/'), key)
            }
            _ => self.provider_url.clone(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn flag(value: Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

/// Wei amounts arrive as decimals or 0x-hex.
fn parse_amount(raw: &str) -> Option<U256> {
    if raw.starts_with("0x") || raw.starts_with("0X") {
        parse_quantity_u256(raw).ok()
    } else {
        U256::from_str_radix(raw, 10).ok()
    }
}
