//! GraphQL client for the Reef chain index.
//!
//! Reef has no native Ethereum RPC; blocks, extrinsics and their events are
//! served by a GraphQL index. [`Graph`] is the seam, [`HttpGraph`] the
//! production POST client.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use ethrpc_gateway::GatewayError;

/// One GraphQL endpoint.
#[async_trait]
pub trait Graph: Send + Sync + 'static {
    /// Run a query and return the `data` tree.
    async fn query(&self, query: &str, variables: Value) -> Result<Value, GatewayError>;
}

/// GraphQL over HTTP POST.
pub struct HttpGraph {
    url: String,
    client: reqwest::Client,
}

impl HttpGraph {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| GatewayError::Other(format!("graphql client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Graph for HttpGraph {
    async fn query(&self, query: &str, variables: Value) -> Result<Value, GatewayError> {
        debug!(url = %self.url, "graphql query");
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Other(format!("graphql request failed: {e}")))?;

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidJsonResponse(e.to_string()))?;

        if let Some(errors) = parsed.get("errors").filter(|e| !e.is_null()) {
            return Err(GatewayError::Execution {
                message: "graphql query failed".to_string(),
                data: Some(Value::String(errors.to_string())),
            });
        }
        Ok(parsed.get("data").cloned().unwrap_or(Value::Null))
    }
}

/// Latest finalized block with its evm-tagged extrinsics.
pub const LATEST_BLOCK_QUERY: &str = r#"
query latestBlock {
  blocks(limit: 1, orderBy: height_DESC, where: { finalized_eq: true }) {
    height
    hash
    parentHash
    stateRoot
    timestamp
    finalized
    extrinsics(where: { section_eq: "evm" }) {
      hash
      index
      status
      signedData
      events(orderBy: index_ASC) { section method data index }
    }
  }
}
"#;

/// Block at an exact height, same shape as [`LATEST_BLOCK_QUERY`].
pub const BLOCK_BY_HEIGHT_QUERY: &str = r#"
query blockByHeight($height: Int!) {
  blocks(limit: 1, where: { height_eq: $height }) {
    height
    hash
    parentHash
    stateRoot
    timestamp
    finalized
    extrinsics(where: { section_eq: "evm" }) {
      hash
      index
      status
      signedData
      events(orderBy: index_ASC) { section method data index }
    }
  }
}
"#;

/// One extrinsic by hash, with its enclosing block.
pub const EXTRINSIC_BY_HASH_QUERY: &str = r#"
query extrinsicByHash($hash: String!) {
  extrinsics(limit: 1, where: { hash_eq: $hash }) {
    hash
    index
    status
    signedData
    block { height hash finalized timestamp }
    events(orderBy: index_ASC) { section method data index }
  }
}
"#;
