//! GraphQL type definitions.

use async_graphql::{EmptyMutation, EmptySubscription, Schema, SimpleObject};
use chrono::{DateTime, Utc};

use furnace_core::models;
use furnace_core::ports::OrderDirection;

use crate::schema::LedgerQuery;

/// The Furnace GraphQL schema type.
pub type FurnaceSchema = Schema<LedgerQuery, EmptyMutation, EmptySubscription>;

/// Ordering direction.
#[derive(async_graphql::Enum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Desc,
    Asc,
}

impl From<Order> for OrderDirection {
    fn from(order: Order) -> Self {
        match order {
            Order::Asc => OrderDirection::Asc,
            Order::Desc => OrderDirection::Desc,
        }
    }
}

/// Ledger status.
#[derive(SimpleObject)]
pub struct LedgerStatus {
    /// Genesis hash of the indexed chain.
    pub chain_id: Option<String>,
    pub size_dollar_pool: f64,
    pub last_block_processed: Option<u64>,
    pub replenish_amount: f64,
    /// Base units, as a decimal string.
    pub tokens_burned: String,
    pub updated_at: DateTime<Utc>,
}

impl From<models::LedgerState> for LedgerStatus {
    fn from(s: models::LedgerState) -> Self {
        Self {
            chain_id: s.chain_id,
            size_dollar_pool: s.size_dollar_pool,
            last_block_processed: s.last_block_processed,
            replenish_amount: s.replenish_amount,
            tokens_burned: s.tokens_burned.to_string(),
            updated_at: s.updated_at,
        }
    }
}

/// Exchange type.
#[derive(SimpleObject)]
pub struct Exchange {
    pub sender: String,
    pub recipient: String,
    pub sender_memo: String,
    pub payment_address: String,
    pub has_payment_address: bool,
    /// Base units, as a decimal string.
    pub amount: String,
    pub price: f64,
    pub amount_usd: f64,
    pub block_height: u64,
    pub date: DateTime<Utc>,
    pub log_time: DateTime<Utc>,
    pub status: String,
}

impl From<models::Exchange> for Exchange {
    fn from(e: models::Exchange) -> Self {
        Self {
            has_payment_address: e.has_payment_address(),
            sender: e.sender.to_hex(),
            recipient: e.recipient.to_hex(),
            sender_memo: e.sender_memo,
            payment_address: e.payment_address,
            amount: e.amount.to_string(),
            price: e.price,
            amount_usd: e.amount_usd,
            block_height: e.block_height,
            date: e.date,
            log_time: e.log_time,
            status: e.status.as_str().to_string(),
        }
    }
}

/// Burn type.
#[derive(SimpleObject)]
pub struct Burn {
    /// Base units, as a decimal string.
    pub amount: String,
    pub block_height: u64,
    pub date: DateTime<Utc>,
    pub log_time: DateTime<Utc>,
}

impl From<models::Burn> for Burn {
    fn from(b: models::Burn) -> Self {
        Self {
            amount: b.amount.to_string(),
            block_height: b.block_height,
            date: b.date,
            log_time: b.log_time,
        }
    }
}

#[derive(SimpleObject)]
pub struct ProcessingError {
    pub block_number: u64,
    pub reason: Option<String>,
    pub log_time: DateTime<Utc>,
}

impl From<models::ProcessingError> for ProcessingError {
    fn from(e: models::ProcessingError) -> Self {
        Self {
            block_number: e.block_number,
            reason: e.reason,
            log_time: e.log_time,
        }
    }
}

#[derive(SimpleObject)]
pub struct ProcessingWarning {
    pub block_number: u64,
    pub message: String,
    pub log_time: DateTime<Utc>,
}

impl From<models::ProcessingWarning> for ProcessingWarning {
    fn from(w: models::ProcessingWarning) -> Self {
        Self {
            block_number: w.block_number,
            message: w.message,
            log_time: w.log_time,
        }
    }
}

// -----------------------------------------------------------------------------
// Connection Types (Relay-style pagination)
// -----------------------------------------------------------------------------

#[derive(SimpleObject)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// Generate Relay-style connection types (Edge + Connection) with From impl.
macro_rules! define_connection {
    ($node:ty, $core_model:ty, $edge:ident, $connection:ident) => {
        #[derive(SimpleObject)]
        pub struct $edge {
            pub node: $node,
            pub cursor: String,
        }

        #[derive(SimpleObject)]
        pub struct $connection {
            pub edges: Vec<$edge>,
            pub page_info: PageInfo,
            pub total_count: Option<i64>,
        }

        impl From<furnace_core::ports::Connection<$core_model>> for $connection {
            fn from(conn: furnace_core::ports::Connection<$core_model>) -> Self {
                Self {
                    edges: conn
                        .edges
                        .into_iter()
                        .map(|e| $edge {
                            node: <$node>::from(e.node),
                            cursor: e.cursor.value,
                        })
                        .collect(),
                    page_info: PageInfo {
                        has_next_page: conn.page_info.has_next_page,
                        has_previous_page: conn.page_info.has_previous_page,
                        start_cursor: conn.page_info.start_cursor.map(|c| c.value),
                        end_cursor: conn.page_info.end_cursor.map(|c| c.value),
                    },
                    total_count: conn.total_count,
                }
            }
        }
    };
}

define_connection!(Exchange, models::Exchange, ExchangeEdge, ExchangeConnection);
define_connection!(Burn, models::Burn, BurnEdge, BurnConnection);
define_connection!(
    ProcessingError,
    models::ProcessingError,
    ProcessingErrorEdge,
    ProcessingErrorConnection
);
define_connection!(
    ProcessingWarning,
    models::ProcessingWarning,
    ProcessingWarningEdge,
    ProcessingWarningConnection
);
