//! In-memory signing identities for the ethrpc gateway.
//!
//! A [`WalletSet`] is built once at startup from a BIP-39 seed phrase (BIP-44
//! path `m/44'/60'/0'/0/i`) and/or a list of raw private keys, and is
//! read-only afterwards. The list order matters: index 0 is the default
//! sender for transactions that omit `from`.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Signature, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use ethrpc_types::TransactionRequest;
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet set is empty: provide a seed phrase or private keys")]
    Empty,
    #[error("duplicate wallet address {0}")]
    Duplicate(Address),
    #[error("seed phrase derivation failed: {0}")]
    Derivation(String),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("transaction is missing {0}")]
    MissingField(&'static str),
}

/// One signing identity. Immutable after construction.
pub struct Wallet {
    address: Address,
    derivation_index: Option<u32>,
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("derivation_index", &self.derivation_index)
            .finish_non_exhaustive()
    }
}

impl Wallet {
    fn from_signer(signer: PrivateKeySigner, derivation_index: Option<u32>) -> Self {
        Self {
            address: signer.address(),
            derivation_index,
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn derivation_index(&self) -> Option<u32> {
        self.derivation_index
    }

    /// EIP-191 personal-message signature, 65 bytes r || s || v.
    pub fn sign_message(&self, message: &[u8]) -> Result<[u8; 65], WalletError> {
        let sig = self
            .signer
            .sign_message_sync(message)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(sig.as_bytes())
    }

    /// Raw ECDSA signature over a prehashed 32-byte digest.
    ///
    /// Used for non-Ethereum wire formats (Conflux native transactions) that
    /// hash their own RLP.
    pub fn sign_hash(&self, hash: &B256) -> Result<Signature, WalletError> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| WalletError::Signing(e.to_string()))
    }

    /// Sign a composed transaction and return the EIP-2718 raw bytes.
    ///
    /// Type-2 requests become EIP-1559 transactions; everything else is
    /// legacy, replay-protected when `chain_id` is set.
    pub fn sign_transaction(&self, tx: &TransactionRequest) -> Result<Vec<u8>, WalletError> {
        let nonce = tx.nonce.ok_or(WalletError::MissingField("nonce"))?.to::<u64>();
        let gas_limit = tx.gas.ok_or(WalletError::MissingField("gas"))?.to::<u64>();
        let to = match tx.to {
            Some(addr) => TxKind::Call(addr),
            None => TxKind::Create,
        };
        let value = tx.value.unwrap_or(U256::ZERO);
        let input = tx.data.clone().unwrap_or_default();

        let envelope: TxEnvelope = if tx.tx_type.map(|t| t.to::<u64>()) == Some(2) {
            let chain_id = tx
                .chain_id
                .ok_or(WalletError::MissingField("chainId"))?
                .to::<u64>();
            let max_fee = tx
                .max_fee_per_gas
                .ok_or(WalletError::MissingField("maxFeePerGas"))?;
            let max_priority = tx
                .max_priority_fee_per_gas
                .ok_or(WalletError::MissingField("maxPriorityFeePerGas"))?;
            let typed = TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas: max_fee.saturating_to::<u128>(),
                max_priority_fee_per_gas: max_priority.saturating_to::<u128>(),
                to,
                value,
                access_list: Default::default(),
                input,
            };
            let sig = self.sign_hash(&typed.signature_hash())?;
            typed.into_signed(sig).into()
        } else {
            let gas_price = tx
                .gas_price
                .ok_or(WalletError::MissingField("gasPrice"))?
                .saturating_to::<u128>();
            let typed = TxLegacy {
                chain_id: tx.chain_id.map(|c| c.to::<u64>()),
                nonce,
                gas_price,
                gas_limit,
                to,
                value,
                input,
            };
            let sig = self.sign_hash(&typed.signature_hash())?;
            typed.into_signed(sig).into()
        };

        Ok(envelope.encoded_2718())
    }
}

/// Ordered, non-empty collection of wallets.
///
/// Lookup is case-insensitive over the hex form of the address.
pub struct WalletSet {
    wallets: Vec<Wallet>,
}

impl std::fmt::Debug for WalletSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletSet")
            .field("addresses", &self.addresses())
            .finish()
    }
}

impl WalletSet {
    /// Build the wallet set from startup identity material.
    ///
    /// Seed-derived wallets come first (`m/44'/60'/0'/0/i` for
    /// `i ∈ [0, seed_wallets)`), raw keys are appended after. Both inputs
    /// are zeroized before returning, on success and on failure alike.
    pub fn from_sources(
        mut seed_phrase: Option<String>,
        seed_wallets: u32,
        mut private_keys: Vec<String>,
    ) -> Result<Self, WalletError> {
        let result = Self::build(seed_phrase.as_deref(), seed_wallets, &private_keys);
        if let Some(phrase) = seed_phrase.as_mut() {
            phrase.zeroize();
        }
        for key in private_keys.iter_mut() {
            key.zeroize();
        }
        result
    }

    fn build(
        seed_phrase: Option<&str>,
        seed_wallets: u32,
        private_keys: &[String],
    ) -> Result<Self, WalletError> {
        let mut wallets = Vec::new();

        if let Some(phrase) = seed_phrase {
            for index in 0..seed_wallets {
                let signer = MnemonicBuilder::<English>::default()
                    .phrase(phrase)
                    .index(index)
                    .map_err(|e| WalletError::Derivation(e.to_string()))?
                    .build()
                    .map_err(|e| WalletError::Derivation(e.to_string()))?;
                wallets.push(Wallet::from_signer(signer, Some(index)));
            }
        }

        for key in private_keys {
            let trimmed = key.trim();
            let signer: PrivateKeySigner = trimmed
                .parse()
                .map_err(|_| WalletError::InvalidKey("not a 32-byte hex key".to_string()))?;
            wallets.push(Wallet::from_signer(signer, None));
        }

        if wallets.is_empty() {
            return Err(WalletError::Empty);
        }
        for (i, wallet) in wallets.iter().enumerate() {
            if wallets[..i].iter().any(|w| w.address == wallet.address) {
                return Err(WalletError::Duplicate(wallet.address));
            }
        }

        tracing::info!(count = wallets.len(), "wallet set ready");
        Ok(Self { wallets })
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// The default sender: wallet at index 0.
    pub fn default_wallet(&self) -> &Wallet {
        &self.wallets[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Wallet> {
        self.wallets.iter()
    }

    /// EIP-55 checksummed addresses, in list order.
    pub fn addresses(&self) -> Vec<String> {
        self.wallets
            .iter()
            .map(|w| w.address.to_checksum(None))
            .collect()
    }

    pub fn get(&self, address: Address) -> Option<&Wallet> {
        self.wallets.iter().find(|w| w.address == address)
    }

    /// Resolve a wallet from a client-supplied hex string, ignoring case.
    pub fn find(&self, address: &str) -> Option<&Wallet> {
        let parsed: Address = address.to_ascii_lowercase().parse().ok()?;
        self.get(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethrpc_types::TransactionRequest;
    use serde_json::json;

    // The ganache development mnemonic; its first two derived accounts are
    // fixed and well known.
    const DEV_MNEMONIC: &str =
        "candy maple cake sugar pudding cream honey rich smooth crumble sweet treat";

    fn dev_set() -> WalletSet {
        WalletSet::from_sources(Some(DEV_MNEMONIC.to_string()), 2, Vec::new()).unwrap()
    }

    #[test]
    fn derives_known_ganache_addresses() {
        let set = dev_set();
        assert_eq!(
            set.addresses(),
            vec![
                "0x627306090abaB3A6e1400e9345bC60c78a8BEf57".to_string(),
                "0xf17f52151EbEF6C7334FAD080c5704D77216b732".to_string(),
            ]
        );
        assert_eq!(set.default_wallet().derivation_index(), Some(0));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let set = dev_set();
        assert!(set
            .find("0x627306090ABAB3A6E1400E9345BC60C78A8BEF57")
            .is_some());
        assert!(set
            .find("0x627306090abab3a6e1400e9345bc60c78a8bef57")
            .is_some());
        assert!(set
            .find("0xf17f52151EbEF6C7334FAD080c5704D77216b732")
            .is_some());
        assert!(set
            .find("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef")
            .is_none());
        assert!(set.find("not-an-address").is_none());
    }

    #[test]
    fn raw_keys_append_after_seed_wallets() {
        let set = WalletSet::from_sources(
            Some(DEV_MNEMONIC.to_string()),
            1,
            vec!["0x0000000000000000000000000000000000000000000000000000000000000001".to_string()],
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().nth(1).unwrap().derivation_index(), None);
    }

    #[test]
    fn empty_sources_are_rejected() {
        assert!(matches!(
            WalletSet::from_sources(None, 0, Vec::new()),
            Err(WalletError::Empty)
        ));
    }

    #[test]
    fn duplicate_addresses_are_rejected() {
        let key =
            "0x0000000000000000000000000000000000000000000000000000000000000001".to_string();
        assert!(matches!(
            WalletSet::from_sources(None, 0, vec![key.clone(), key]),
            Err(WalletError::Duplicate(_))
        ));
    }

    #[test]
    fn signs_personal_messages() {
        let set = dev_set();
        let sig = set.default_wallet().sign_message(b"hello").unwrap();
        assert_eq!(sig.len(), 65);
        // v is the legacy 27/28 form
        assert!(sig[64] == 27 || sig[64] == 28);
    }

    #[test]
    fn signs_legacy_and_eip1559_transactions() {
        let set = dev_set();
        let legacy = TransactionRequest::from_value(&json!({
            "to": "0xf17f52151ebef6c7334fad080c5704d77216b732",
            "value": "0xde0b6b3a7640000",
            "gas": "0x5208",
            "gasPrice": "0x4a817c800",
            "nonce": "0x0",
            "chainId": "0x1"
        }))
        .unwrap();
        let raw = set.default_wallet().sign_transaction(&legacy).unwrap();
        // legacy payloads are plain RLP lists
        assert!(raw[0] >= 0xc0);

        let eip1559 = TransactionRequest::from_value(&json!({
            "to": "0xf17f52151ebef6c7334fad080c5704d77216b732",
            "value": "0x1",
            "gas": "0x5208",
            "gasPrice": "0x4a817c800",
            "maxFeePerGas": "0x4a817c800",
            "maxPriorityFeePerGas": "0x4a817c800",
            "nonce": "0x0",
            "chainId": "0x1",
            "type": "0x2"
        }))
        .unwrap();
        let raw = set.default_wallet().sign_transaction(&eip1559).unwrap();
        assert_eq!(raw[0], 0x02);
    }

    #[test]
    fn signing_without_gas_fields_fails() {
        let set = dev_set();
        let tx = TransactionRequest::from_value(&json!({
            "to": "0xf17f52151ebef6c7334fad080c5704d77216b732",
            "nonce": "0x0"
        }))
        .unwrap();
        assert!(matches!(
            set.default_wallet().sign_transaction(&tx),
            Err(WalletError::MissingField("gas"))
        ));
    }
}
