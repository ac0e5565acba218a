//! Reef adapter.
//!
//! Reef is a Substrate chain with an EVM pallet and no native Ethereum RPC:
//! head queries go to the node's Substrate RPC, historical data comes from a
//! GraphQL index, and submission goes through Substrate keypairs bound to
//! claimed EVM addresses. The adapter synthesizes Ethereum-shaped blocks,
//! transactions and receipts from those two sources and delegates signing to
//! the [`signer::ReefSigner`] seam.

use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use ethrpc_gateway::backend::{decode_hex_payload, Backend, BackendCore, LocalMethod};
use ethrpc_gateway::GatewayError;
use ethrpc_types::{parse_quantity, BlockNumberOrTag, TransactionRequest};

use std::sync::Arc;

pub mod graphql;
pub mod project;
pub mod signer;

pub use graphql::{Graph, HttpGraph};
pub use signer::ReefSigner;

/// Reef-specific configuration.
#[derive(Debug, Clone)]
pub struct ReefConfig {
    /// GraphQL endpoint serving the chain index.
    pub graph_url: String,
}

pub struct ReefBackend {
    core: BackendCore,
    graph: Arc<dyn Graph>,
    signers: Vec<Arc<dyn ReefSigner>>,
}

impl ReefBackend {
    pub fn new(
        core: BackendCore,
        graph: Arc<dyn Graph>,
        signers: Vec<Arc<dyn ReefSigner>>,
    ) -> Self {
        Self {
            core,
            graph,
            signers,
        }
    }

    /// Claim any unclaimed EVM accounts. Run before serving traffic.
    pub async fn ensure_claimed(&self) -> Result<(), GatewayError> {
        signer::claim_default_accounts(&self.signers).await
    }

    fn find_signer(&self, address: &str) -> Option<&Arc<dyn ReefSigner>> {
        let parsed: Address = address.to_ascii_lowercase().parse().ok()?;
        self.signers.iter().find(|s| s.evm_address() == parsed)
    }

    async fn fetch_block(
        &self,
        tag: &BlockNumberOrTag,
    ) -> Result<Option<project::GraphBlock>, GatewayError> {
        let data = match tag {
            BlockNumberOrTag::Number(hex) => {
                let height = parse_quantity(hex)
                    .map_err(|e| GatewayError::InvalidParameter(e.to_string()))?;
                self.graph
                    .query(graphql::BLOCK_BY_HEIGHT_QUERY, json!({ "height": height }))
                    .await?
            }
            // latest, pending, finalized, safe: the index only serves
            // finalized state, every tag lands on the finalized head
            BlockNumberOrTag::Tag(_) => {
                self.graph.query(graphql::LATEST_BLOCK_QUERY, json!({})).await?
            }
        };
        let Some(block) = data
            .get("blocks")
            .and_then(Value::as_array)
            .and_then(|blocks| blocks.first())
        else {
            return Ok(None);
        };
        let block: project::GraphBlock = serde_json::from_value(block.clone())
            .map_err(|e| GatewayError::InvalidJsonResponse(format!("graphql block: {e}")))?;
        Ok(Some(block))
    }

    async fn fetch_extrinsic(
        &self,
        hash: &str,
    ) -> Result<Option<project::GraphExtrinsic>, GatewayError> {
        let data = self
            .graph
            .query(graphql::EXTRINSIC_BY_HASH_QUERY, json!({ "hash": hash }))
            .await?;
        let Some(ext) = data
            .get("extrinsics")
            .and_then(Value::as_array)
            .and_then(|exts| exts.first())
        else {
            return Ok(None);
        };
        let ext: project::GraphExtrinsic = serde_json::from_value(ext.clone())
            .map_err(|e| GatewayError::InvalidJsonResponse(format!("graphql extrinsic: {e}")))?;
        Ok(Some(ext))
    }

    fn hash_param(params: &[Value]) -> Result<&str, GatewayError> {
        params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidParameter("missing transaction hash".into()))
    }
}

#[async_trait]
impl Backend for ReefBackend {
    fn name(&self) -> &'static str {
        "reef"
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }

    /// Reef answers the whole read surface itself; nothing Ethereum-shaped
    /// exists downstream to forward to.
    fn local_method(&self, method: &str) -> Option<LocalMethod> {
        match method {
            "eth_blockNumber" => Some(LocalMethod::BlockNumber),
            "eth_getTransactionByHash" => Some(LocalMethod::GetTransactionByHash),
            "eth_getTransactionReceipt" => Some(LocalMethod::GetTransactionReceipt),
            other => LocalMethod::classify(other, &self.core.gas),
        }
    }

    fn accounts(&self) -> Value {
        Value::Array(
            self.signers
                .iter()
                .map(|s| Value::String(s.evm_address().to_checksum(None)))
                .collect(),
        )
    }

    async fn sign(&self, address: &str, payload: &str) -> Result<Value, GatewayError> {
        let signer = self
            .find_signer(address)
            .ok_or_else(|| GatewayError::UnknownSigner(address.to_string()))?;
        let message = decode_hex_payload(payload)?;
        let signature = signer.sign_message(&message).await?;
        Ok(json!(signature))
    }

    /// Submission is the signer's business: it builds and submits the
    /// Substrate evm extrinsic.
    async fn send_transaction(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let first = params
            .first()
            .ok_or_else(|| GatewayError::InvalidParameter("missing transaction object".into()))?;
        let request = TransactionRequest::from_value(first)
            .map_err(GatewayError::InvalidParameter)?;

        let signer = match request.from {
            Some(from) => self
                .find_signer(&format!("{from:#x}"))
                .ok_or_else(|| GatewayError::UnknownSigner(from.to_checksum(None)))?,
            None => self
                .signers
                .first()
                .ok_or_else(|| GatewayError::Other("no reef signers configured".into()))?,
        };

        let composed = self.compose_transaction(&request, false).await?;
        let hash = signer.send_transaction(&composed).await?;
        Ok(json!(hash))
    }

    async fn sign_transaction(&self, _params: Vec<Value>) -> Result<Value, GatewayError> {
        Err(GatewayError::UnknownMethod("eth_signTransaction".into()))
    }

    /// Substrate head, reported as the Ethereum block number.
    async fn block_number(&self) -> Result<Value, GatewayError> {
        let header = self
            .core
            .client
            .request_vec("chain_getHeader", vec![])
            .await?;
        header
            .get("number")
            .cloned()
            .filter(|n| n.is_string())
            .ok_or_else(|| GatewayError::InvalidJsonResponse(format!("chain_getHeader: {header}")))
    }

    async fn get_block_by_number(
        &self,
        _method: &str,
        params: Vec<Value>,
    ) -> Result<Value, GatewayError> {
        let tag: BlockNumberOrTag = params
            .first()
            .map(|raw| {
                serde_json::from_value(raw.clone()).map_err(|e| {
                    GatewayError::InvalidParameter(format!("block number or tag: {e}"))
                })
            })
            .transpose()?
            .unwrap_or_default();
        let full = params.get(1).and_then(Value::as_bool).unwrap_or(false);
        debug!(tag = tag.as_str(), full, "projecting block from the index");
        match self.fetch_block(&tag).await? {
            Some(block) => Ok(project::project_block(&block, full)),
            None => Ok(Value::Null),
        }
    }

    async fn transaction_by_hash(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let hash = Self::hash_param(&params)?;
        let Some(ext) = self.fetch_extrinsic(hash).await? else {
            return Ok(Value::Null);
        };
        let Some(block) = ext.block.clone().filter(|b| b.finalized) else {
            return Ok(Value::Null);
        };
        Ok(project::project_transaction(
            &ext,
            &block.hash,
            block.height,
            ext.index,
        ))
    }

    async fn transaction_receipt(&self, params: Vec<Value>) -> Result<Value, GatewayError> {
        let hash = Self::hash_param(&params)?;
        match self.fetch_extrinsic(hash).await? {
            Some(ext) => project::project_receipt(&ext),
            None => Ok(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::signer::testing::StaticSigner;
    use super::*;
    use ethrpc_gateway::{GasConfig, Router, Rpc};
    use ethrpc_types::RpcRequest;
    use ethrpc_wallet::WalletSet;

    const DEV_MNEMONIC: &str =
        "candy maple cake sugar pudding cream honey rich smooth crumble sweet treat";

    struct MockSubstrate;

    #[async_trait]
    impl Rpc for MockSubstrate {
        async fn request(&self, method: &str, _params: Value) -> Result<Value, GatewayError> {
            match method {
                "chain_getHeader" => Ok(json!({"number": "0x4c4b40", "parentHash": "0xb10b"})),
                other => Err(GatewayError::Backend {
                    code: -32601,
                    message: format!("substrate node: unknown method {other}"),
                    data: None,
                }),
            }
        }
    }

    struct MockGraph;

    #[async_trait]
    impl Graph for MockGraph {
        async fn query(&self, query: &str, variables: Value) -> Result<Value, GatewayError> {
            if query.contains("latestBlock") || query.contains("blockByHeight") {
                return Ok(json!({"blocks": [{
                    "height": 5_000_000,
                    "hash": "0xb10c",
                    "parentHash": "0xb10b",
                    "stateRoot": "0x5001",
                    "timestamp": "2023-05-17T12:00:00.000Z",
                    "finalized": true,
                    "extrinsics": [{
                        "hash": "0x7777",
                        "index": 0,
                        "status": "success",
                        "signedData": {"fee": {"partialFee": "1000", "weight": 10}},
                        "events": []
                    }]
                }]}));
            }
            if query.contains("extrinsicByHash") {
                if variables["hash"] == json!("0x7777") {
                    return Ok(json!({"extrinsics": [{
                        "hash": "0x7777",
                        "index": 0,
                        "status": "success",
                        "signedData": {"fee": {"partialFee": "1000", "weight": 10}},
                        "block": {"height": 5_000_000, "hash": "0xb10c", "finalized": true},
                        "events": [
                            {"section": "evm", "method": "Log",
                             "data": [{"address": "0x2222222222222222222222222222222222222222",
                                       "topics": [], "data": "0x"}],
                             "index": 0}
                        ]
                    }]}));
                }
                return Ok(json!({"extrinsics": []}));
            }
            Ok(Value::Null)
        }
    }

    fn backend() -> Arc<ReefBackend> {
        let wallets =
            WalletSet::from_sources(Some(DEV_MNEMONIC.to_string()), 1, Vec::new()).unwrap();
        let core = BackendCore::new(wallets, Arc::new(MockSubstrate), GasConfig::default(), 13939);
        let signer: Arc<dyn ReefSigner> = Arc::new(StaticSigner::new(
            "0x627306090abab3a6e1400e9345bc60c78a8bef57".parse().unwrap(),
            false,
        ));
        Arc::new(ReefBackend::new(core, Arc::new(MockGraph), vec![signer]))
    }

    #[tokio::test]
    async fn block_number_comes_from_the_substrate_head() {
        let router = Router::new(backend());
        let response = router
            .handle(RpcRequest::new(json!(1), "eth_blockNumber", vec![]))
            .await;
        assert_eq!(response.result().unwrap(), &json!("0x4c4b40"));
    }

    #[tokio::test]
    async fn latest_block_is_projected_from_the_index() {
        let router = Router::new(backend());
        let response = router
            .handle(RpcRequest::new(
                json!(2),
                "eth_getBlockByNumber",
                vec![json!("latest"), json!(false)],
            ))
            .await;
        let block = response.result().unwrap();
        assert_eq!(block["number"], json!("0x4c4b40"));
        assert_eq!(block["gasLimit"], json!("0xffffffff"));
        assert_eq!(block["transactions"], json!(["0x7777"]));
    }

    #[tokio::test]
    async fn receipt_comes_from_finalized_extrinsic_events() {
        let router = Router::new(backend());
        let response = router
            .handle(RpcRequest::new(
                json!(3),
                "eth_getTransactionReceipt",
                vec![json!("0x7777")],
            ))
            .await;
        let receipt = response.result().unwrap();
        assert_eq!(receipt["status"], json!("0x1"));
        assert_eq!(receipt["effectiveGasPrice"], json!("0x64"));
        assert_eq!(receipt["logs"][0]["logIndex"], json!("0x0"));

        let missing = router
            .handle(RpcRequest::new(
                json!(4),
                "eth_getTransactionReceipt",
                vec![json!("0x9999")],
            ))
            .await;
        assert_eq!(missing.result().unwrap(), &Value::Null);
    }

    #[tokio::test]
    async fn accounts_and_submission_go_through_the_reef_signer() {
        let backend = backend();
        backend.ensure_claimed().await.unwrap();
        let router = Router::new(backend);

        let accounts = router
            .handle(RpcRequest::new(json!(5), "eth_accounts", vec![]))
            .await;
        assert_eq!(
            accounts.result().unwrap(),
            &json!(["0x627306090abaB3A6e1400e9345bC60c78a8BEf57"])
        );

        let sent = router
            .handle(RpcRequest::new(
                json!(6),
                "eth_sendTransaction",
                vec![json!({
                    "from": "0x627306090abab3a6e1400e9345bc60c78a8bef57",
                    "to": "0x85d80245dc02f5a89589e1f19c5c718e405b56cd",
                    "value": "0x1"
                })],
            ))
            .await;
        assert_eq!(
            sent.result().unwrap(),
            &json!("0x4444444444444444444444444444444444444444444444444444444444444444")
        );

        let unknown = router
            .handle(RpcRequest::new(
                json!(7),
                "eth_sendTransaction",
                vec![json!({"from": "0x85d80245dc02f5a89589e1f19c5c718e405b56cd"})],
            ))
            .await;
        assert_eq!(unknown.error_body().unwrap().code, -32000);
    }
}
