//! Core of the ethrpc gateway: router, method handlers, backend wrappers.
//!
//! The gateway terminates standard Ethereum JSON-RPC traffic, intercepts
//! account- and transaction-scoped methods against its in-memory wallet set,
//! and forwards or translates everything else for the configured downstream
//! backend. This crate owns the canonical pipeline; chain-specific adapters
//! (Conflux, Celo, Reef) build on the [`backend::Backend`] trait from their
//! own crates.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod evm;
pub mod handlers;
pub mod rollback;
pub mod router;
pub mod server;

pub use backend::{Backend, BackendCore, LocalMethod, MOCK_FILTER_ID};
pub use client::{HttpRpc, Rpc};
pub use config::{apply_factor, apply_factor_u64, GasConfig};
pub use error::{codes, GatewayError};
pub use evm::{EvmBackend, EvmFlavor};
pub use rollback::{RollbackKind, RollbackState};
pub use router::Router;
pub use server::{app, serve};
