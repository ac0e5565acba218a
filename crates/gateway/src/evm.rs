//! Generic EVM backend.
//!
//! Covers every downstream that speaks plain Ethereum JSON-RPC: a direct
//! node, an Infura-style keyed endpoint, zkSync Era and TEN. The flavors
//! only differ in how the launcher builds their URL and gas config; the
//! wrapper behavior is the inherited generic pipeline.

use crate::backend::{Backend, BackendCore};

/// Which EVM-compatible ecosystem this wrapper fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmFlavor {
    /// Any plain Ethereum JSON-RPC endpoint.
    Ethers,
    /// Infura-style provider (keyed URL).
    Infura,
    /// zkSync Era.
    ZkSync,
    /// TEN (encrypted L2, standard RPC surface).
    Ten,
}

impl EvmFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvmFlavor::Ethers => "ethers",
            EvmFlavor::Infura => "infura",
            EvmFlavor::ZkSync => "zksync",
            EvmFlavor::Ten => "ten",
        }
    }
}

pub struct EvmBackend {
    flavor: EvmFlavor,
    core: BackendCore,
}

impl EvmBackend {
    pub fn new(flavor: EvmFlavor, core: BackendCore) -> Self {
        Self { flavor, core }
    }
}

impl Backend for EvmBackend {
    fn name(&self) -> &'static str {
        self.flavor.as_str()
    }

    fn core(&self) -> &BackendCore {
        &self.core
    }
}
