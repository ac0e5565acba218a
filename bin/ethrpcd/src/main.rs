//! Ethereum JSON-RPC gateway daemon (ethrpcd)
//!
//! Terminates standard Ethereum wallet traffic, signs intercepted
//! account/transaction methods with its in-memory wallet set, and
//! forwards or translates everything else for the configured backend:
//! a generic EVM endpoint (plain, Infura-keyed, zkSync Era, TEN), a
//! Conflux Core Space node, a Celo node, or a Reef node paired with a
//! GraphQL index.
//!
//! ## Usage
//!
//! ```bash
//! # front a local dev node
//! ETHRPC_SEED_PHRASE="..." ethrpcd --provider-url http://127.0.0.1:8645
//!
//! # front Conflux Core Space
//! ETHRPC_NETWORK=conflux ETHRPC_CONFLUX_DEFAULT_EPOCH_LABEL=latest_finalized \
//!   ethrpcd --provider-url https://main.confluxrpc.com
//! ```
//!
//! Configuration comes from `ETHRPC_*` environment variables (see
//! `env.rs`); the few flags below override their env counterparts.

mod env;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ethrpc_celo::{CeloBackend, CeloConfig};
use ethrpc_conflux::{ConfluxBackend, ConfluxConfig, EpochLabel};
use ethrpc_gateway::{
    Backend, BackendCore, EvmBackend, EvmFlavor, GatewayError, HttpRpc, Router, Rpc,
};
use ethrpc_reef::{HttpGraph, ReefBackend};
use ethrpc_wallet::WalletSet;

use env::GatewayEnv;

const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "ethrpcd")]
#[command(about = "Ethereum JSON-RPC gateway with in-memory signing")]
#[command(version)]
struct Cli {
    /// Listen port (overrides ETHRPC_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend endpoint URL (overrides ETHRPC_PROVIDER_URL)
    #[arg(short = 'u', long)]
    provider_url: Option<String>,

    /// Backend ecosystem: ethers, infura, zksync, ten, conflux, celo, reef
    /// (overrides ETHRPC_NETWORK)
    #[arg(short, long)]
    network: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let mut gw_env = GatewayEnv::from_env();
    if let Some(port) = cli.port {
        gw_env.port = port;
    }
    if let Some(url) = cli.provider_url {
        gw_env.provider_url = url;
    }
    if let Some(network) = cli.network {
        gw_env.network = network;
    }

    init_tracing(&gw_env.log_level);

    let runtime = tokio::runtime::Runtime::new().expect("failed to start async runtime");
    runtime.block_on(run(gw_env));
}

async fn run(gw_env: GatewayEnv) {
    info!(network = %gw_env.network, url = %gw_env.provider_url(), "starting ethrpcd");

    let wallets = match WalletSet::from_sources(
        gw_env.seed_phrase.clone(),
        gw_env.seed_phrase_wallets,
        gw_env.private_keys.clone(),
    ) {
        Ok(wallets) => wallets,
        Err(e) => {
            error!(error = %e, "wallet configuration is unusable");
            process::exit(1);
        }
    };

    let backend = match build_backend(&gw_env, wallets).await {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "backend is unreachable at startup");
            process::exit(-1);
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], gw_env.port));
    let router = Arc::new(Router::new(backend));
    if let Err(e) = ethrpc_gateway::serve(addr, router).await {
        error!(error = %e, "server terminated");
        process::exit(1);
    }
}

/// Instantiate the adapter for the selected ecosystem, probing the backend
/// so misconfiguration fails at startup rather than on the first request.
async fn build_backend(
    gw_env: &GatewayEnv,
    wallets: WalletSet,
) -> Result<Arc<dyn Backend>, GatewayError> {
    let client = Arc::new(HttpRpc::new(gw_env.provider_url(), BACKEND_TIMEOUT)?);
    let gas = gw_env.gas_config(|key| std::env::var(key).ok());

    match gw_env.network.as_str() {
        "conflux" => {
            let status = client.request_vec("cfx_getStatus", vec![]).await?;
            let chain_id = quantity_field(&status, "chainId")?;
            let network_id = quantity_field(&status, "networkId")? as u32;
            let epoch_label = gw_env
                .conflux_epoch_label
                .as_deref()
                .and_then(EpochLabel::parse)
                .unwrap_or_default();
            info!(chain_id, network_id, label = epoch_label.as_str(), "conflux backend ready");

            let core = BackendCore::new(wallets, client, gas, chain_id);
            let config = ConfluxConfig {
                epoch_label,
                confirmation_epochs: gw_env.conflux_confirmation_epochs,
                network_id,
            };
            Ok(Arc::new(ConfluxBackend::new(core, config)))
        }
        "celo" => {
            let chain_id = client.quantity("eth_chainId", vec![]).await?;
            info!(chain_id, "celo backend ready");

            let core = BackendCore::new(wallets, client, gas, chain_id);
            let mut config = CeloConfig::default();
            if let Some(raw) = &gw_env.celo_fee_currency {
                config.fee_currency = Some(raw.parse().map_err(|_| {
                    GatewayError::InvalidParameter(format!("CELO_FEE_CURRENCY '{raw}'"))
                })?);
            }
            if let Some(max) = gw_env.celo_gas_price_max {
                config.gas_price_max = max;
            }
            Ok(Arc::new(CeloBackend::new(core, config)))
        }
        "reef" => {
            let header = client.request_vec("chain_getHeader", vec![]).await?;
            if header.get("number").is_none() {
                return Err(GatewayError::InvalidJsonResponse(format!(
                    "chain_getHeader: {header}"
                )));
            }
            let graph_url = gw_env
                .reef_graphql_url
                .clone()
                .ok_or_else(|| GatewayError::Other("REEF_GRAPHQL_URL is required".into()))?;
            let graph = Arc::new(HttpGraph::new(graph_url, BACKEND_TIMEOUT)?);
            info!(graph = graph.url(), "reef backend ready");

            // reef chain id is fixed; the node has no eth_chainId to probe
            let core = BackendCore::new(wallets, client, gas, 13939);
            // sr25519 signers are an external component wired in by the
            // deployment; without them the read path still works and
            // account methods answer empty
            let backend = ReefBackend::new(core, graph, Vec::new());
            backend.ensure_claimed().await?;
            Ok(Arc::new(backend))
        }
        name => {
            let flavor = match name {
                "infura" => EvmFlavor::Infura,
                "zksync" => EvmFlavor::ZkSync,
                "ten" => EvmFlavor::Ten,
                _ => EvmFlavor::Ethers,
            };
            let chain_id = client.quantity("eth_chainId", vec![]).await?;
            info!(chain_id, flavor = flavor.as_str(), "evm backend ready");

            let core = BackendCore::new(wallets, client, gas, chain_id);
            Ok(Arc::new(EvmBackend::new(flavor, core)))
        }
    }
}

fn quantity_field(value: &Value, key: &str) -> Result<u64, GatewayError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|raw| ethrpc_types::parse_quantity(raw).ok())
        .ok_or_else(|| GatewayError::InvalidJsonResponse(format!("missing {key} in {value}")))
}

/// Map the configured level (winston names included) onto a tracing filter.
fn init_tracing(level: &str) {
    let directive = match level {
        "error" => "error",
        "warn" => "warn",
        "info" => "info",
        "http" | "verbose" | "debug" => "debug",
        "silly" => "trace",
        other => other,
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
