//! Core domain layer for the Furnace indexer.
//!
//! This crate contains the domain models, port traits (interfaces), and
//! business logic services for the treasury exchange and burn indexer. It
//! follows hexagonal architecture principles - this is the innermost layer
//! with no dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     furnace (binary)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │      furnace-graphql         │       furnace-substrate      │
//! │          (API)               │         (RPC, signer)        │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                    furnace-storage                          │
//! │                     (PostgreSQL)                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     furnace-core  ← YOU ARE HERE            │
//! │          (models, ports, price, memo, services)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Ledger records (Exchange, Burn, warnings, errors, state)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`price`] - Token price from the dollar pool and supply
//! - [`memo`] - Payment address extraction from account memos
//! - [`services`] - Block processor, indexer loop and auto-burner
//! - [`error`] - Domain error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! - [`ports::BlockSource`] - Read blocks, events and state from the chain
//! - [`ports::TransactionSubmitter`] - Sign and submit the burn transaction
//! - [`ports::LedgerRepository`] - Persist and query the ledger
//!
//! ## Indexer Lifecycle
//!
//! 1. Subscribe to new heads from the chain
//! 2. Replay every block from the checkpoint to `head - finality_depth`
//! 3. Turn successful transfers into exchanges and burns
//! 4. Commit records, pool size and checkpoint atomically
//! 5. Burn whatever the treasury holds

pub mod error;
pub mod memo;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod price;
pub mod services;
