//! The Reef signing seam.
//!
//! Submission on Reef goes through a Substrate keypair whose EVM address is
//! claimed on-chain; the sr25519 cryptography and extrinsic construction
//! live behind this trait. The gateway only depends on the contract:
//! addresses, claiming, message signatures and transaction submission.

use alloy_primitives::Address;
use async_trait::async_trait;
use tracing::info;

use ethrpc_gateway::GatewayError;
use ethrpc_types::TransactionRequest;

/// One Reef identity: a Substrate keypair bound to an EVM address.
#[async_trait]
pub trait ReefSigner: Send + Sync + 'static {
    /// The EVM address this signer answers for.
    fn evm_address(&self) -> Address;

    /// Whether the EVM address is already claimed on-chain.
    async fn is_claimed(&self) -> Result<bool, GatewayError>;

    /// Claim the default EVM account for the underlying keypair.
    async fn claim_default_account(&self) -> Result<(), GatewayError>;

    /// Sign and submit as a Substrate evm extrinsic; returns the
    /// transaction hash.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, GatewayError>;

    /// Signature over an arbitrary message.
    async fn sign_message(&self, message: &[u8]) -> Result<String, GatewayError>;
}

/// Claim every unclaimed signer. Run once at startup, before the listener
/// accepts traffic.
pub async fn claim_default_accounts(
    signers: &[std::sync::Arc<dyn ReefSigner>],
) -> Result<(), GatewayError> {
    for signer in signers {
        if !signer.is_claimed().await? {
            info!(address = %signer.evm_address(), "claiming default EVM account");
            signer.claim_default_account().await?;
        }
    }
    Ok(())
}
