//! Storage layer for the Furnace indexer.
//!
//! This crate provides the PostgreSQL implementation of the ledger
//! repository defined in `furnace-core`: connection pooling, migrations,
//! the atomic block commit and the paginated record listings.
//!
//! # Tables
//!
//! - `ledger_state` - Single row: pool size, checkpoint, chain id, burned total
//! - `exchanges`, `burns` - Records written with each committed block
//! - `processing_errors`, `processing_warnings` - Diagnostics
//!
//! # Usage
//!
//! ```ignore
//! use furnace_storage::{Database, DatabaseConfig, PgLedgerRepository};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! let ledger = Arc::new(PgLedgerRepository::new(&db));
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgLedgerRepository};
