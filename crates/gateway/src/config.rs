//! Per-backend tuning knobs.

use alloy_primitives::U256;

/// Gas and behavior configuration for one backend wrapper.
///
/// The two `default_*` values double as both the fallback when estimation is
/// off and the hard ceiling when it is on.
#[derive(Debug, Clone)]
pub struct GasConfig {
    /// Default and maximum gas price, in wei.
    pub default_gas_price: U256,
    /// Default and maximum gas limit.
    pub default_gas_limit: u64,
    /// Ask the backend for the gas price instead of using the default.
    pub estimate_gas_price: bool,
    /// Ask the backend for the gas limit instead of using the default.
    pub estimate_gas_limit: bool,
    /// Multiplier applied to gas price estimates, ≥ 1.
    pub gas_price_factor: f64,
    /// Multiplier applied to gas limit estimates, ≥ 1.
    pub gas_limit_factor: f64,
    /// Stamp the provider chain id on composed transactions.
    pub force_eip155: bool,
    /// Compose type-2 transactions.
    pub force_eip1559: bool,
    /// Bind read-only calls to `latest − interleave_blocks`. Zero disables
    /// both the binding and the rollback check.
    pub interleave_blocks: u64,
    /// Answer `eth_syncing` with `false` locally.
    pub always_synced: bool,
    /// Serve block-filter methods from the local mock.
    pub mock_filters: bool,
    /// Apply `gas_price_factor` to `eth_gasPrice` answers.
    pub eth_gas_price_factor: bool,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            default_gas_price: U256::from(20_000_000_000u64),
            default_gas_limit: 10_000_000,
            estimate_gas_price: false,
            estimate_gas_limit: false,
            gas_price_factor: 1.0,
            gas_limit_factor: 1.0,
            force_eip155: false,
            force_eip1559: false,
            interleave_blocks: 0,
            always_synced: false,
            mock_filters: false,
            eth_gas_price_factor: false,
        }
    }
}

/// Apply a rational multiplier to a wei amount in integer space:
/// `value × ceil(factor·100) / 100`, truncating.
pub fn apply_factor(value: U256, factor: f64) -> U256 {
    let numerator = U256::from((factor * 100.0).ceil().max(0.0) as u64);
    value * numerator / U256::from(100u64)
}

/// [`apply_factor`] for gas limits.
pub fn apply_factor_u64(value: u64, factor: f64) -> u64 {
    let numerator = (factor * 100.0).ceil().max(0.0) as u128;
    (u128::from(value) * numerator / 100) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_factor_is_identity() {
        let v = U256::from(20_000_000_000u64);
        assert_eq!(apply_factor(v, 1.0), v);
        assert_eq!(apply_factor_u64(21_000, 1.0), 21_000);
    }

    #[test]
    fn factor_rounds_up_at_the_percent_level() {
        // 1.101 → ceil(110.1) = 111
        assert_eq!(apply_factor(U256::from(100u64), 1.101), U256::from(111u64));
        assert_eq!(apply_factor_u64(100, 1.101), 111);
        // the division itself truncates
        assert_eq!(apply_factor(U256::from(99u64), 1.5), U256::from(148u64));
    }

    #[test]
    fn typical_gas_bump() {
        let price = U256::from(25_000_000_000u64);
        assert_eq!(apply_factor(price, 1.2), U256::from(30_000_000_000u64));
    }
}
