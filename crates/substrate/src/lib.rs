//! Substrate RPC adapter for the Furnace indexer.
//!
//! This crate implements the [`BlockSource`] and [`TransactionSubmitter`]
//! ports from `furnace-core` over a WebSocket connection to a node.
//!
//! # Features
//!
//! - Best-head subscription driving catch-up
//! - Historical block, event and storage queries by block hash
//! - Dynamic metadata decoding using subxt
//! - Treasury burn submission signed with a sr25519 key
//!
//! # Usage
//!
//! ```ignore
//! use furnace_substrate::{SubstrateClient, SubstrateClientConfig, SubstrateSubmitter};
//!
//! let client = SubstrateClient::connect(SubstrateClientConfig {
//!     ws_url: "ws://localhost:9944".to_string(),
//!     token_decimals: None,
//! })
//! .await?;
//!
//! let head = client.finalized_head().await?;
//! let submitter = SubstrateSubmitter::from_seed(client.online_client().clone(), "//Alice")?;
//! ```
//!
//! [`BlockSource`]: furnace_core::ports::BlockSource
//! [`TransactionSubmitter`]: furnace_core::ports::TransactionSubmitter

mod account;
mod client;
mod decode;
mod submitter;

pub use account::{parse_account, to_ss58};
pub use client::{SubstrateClient, SubstrateClientConfig};
pub use submitter::SubstrateSubmitter;
