//! College Transport Layer
//!
//! Everything between the storefront flows and the chain.
//!
//! This crate provides:
//! - [`client`]: the [`ChainClient`] trait plus calls, receipts, logs and [`ChainError`]
//! - [`abi`]: decoded contract values ([`AbiValue`])
//! - [`contracts`]: deployed addresses and function names
//! - [`events`]: event descriptors and receipt log matching
//! - [`network`]: RPC endpoint selection
//! - [`gateway`]: IPFS URI rewriting and metadata download
//! - `mock`: an in-memory chain (feature `mock`, always on in tests)
//!
//! # Example
//!
//! ```ignore
//! use college_transport::{ChainClient, ContractCall, ContractSet, token_fn};
//!
//! let contracts = ContractSet::from_env()?;
//! let call = ContractCall::new(contracts.token, token_fn::BALANCE_OF).arg(wallet);
//! let balance = client.read(&call).await?.as_uint()?;
//! ```

pub mod abi;
pub mod client;
pub mod contracts;
pub mod events;
pub mod gateway;
pub mod network;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export main types for convenience
pub use abi::AbiValue;
pub use client::{
    ChainClient, ChainError, ContractCall, DecodedEvent, Log, LogFilter, Receipt, TxHash, TxStatus,
};
pub use contracts::{course_fn, nft_fn, token_fn, ContractSet};
pub use events::{find_events, EventAbi, COURSE_PURCHASED, NFT_MINTED};
pub use gateway::{ipfs_to_http, MetadataGateway, DEFAULT_IPFS_GATEWAY};
pub use network::{resolve_rpc_endpoint, Network};

#[cfg(any(test, feature = "mock"))]
pub use mock::{CallKind, MockChain};
