//! GraphQL API for the Furnace ledger.
//!
//! Read-only queries over the ledger state and its record logs
//! (exchanges, burns, processing errors and warnings).
//!
//! ```ignore
//! use furnace_graphql::{build_schema, serve_with_shutdown, ServerConfig};
//!
//! let schema = build_schema(ledger);
//! serve_with_shutdown(schema, ServerConfig::default(), shutdown).await?;
//! ```

mod schema;
mod server;
mod types;

pub use schema::{LedgerQuery, MAX_QUERY_COMPLEXITY, MAX_QUERY_DEPTH, build_schema};
pub use server::{ServerConfig, router, serve_with_shutdown};
pub use types::{FurnaceSchema, Order, PageInfo};
