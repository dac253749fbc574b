//! PostgreSQL storage adapter.
//!
//! This module implements the ledger repository defined in `furnace-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgLedgerRepository`] - `LedgerRepository` over the ledger tables
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let ledger = PgLedgerRepository::new(&db);
//! ```

mod database;
mod helpers;
mod ledger_repo;

pub use database::{Database, DatabaseConfig};
pub use ledger_repo::PgLedgerRepository;
