//! GraphQL schema definition.
//!
//! Read-only view of the ledger: scalar status plus the four append-only
//! record logs, each paginated Relay style by insertion sequence.

use std::sync::Arc;

use async_graphql::{Context, EmptyMutation, EmptySubscription, Object, Result, Schema};

use furnace_core::ports::{Cursor, LedgerRepository, MAX_PAGE_SIZE, Pagination};

use crate::types::{
    BurnConnection, ExchangeConnection, FurnaceSchema, LedgerStatus, Order,
    ProcessingErrorConnection, ProcessingWarningConnection,
};

// -----------------------------------------------------------------------------
// Schema Configuration
// -----------------------------------------------------------------------------

/// Maximum query depth to prevent deeply nested queries (DoS protection).
/// Note: GraphQL introspection requires depth ~13, so we use 15 to allow it.
pub const MAX_QUERY_DEPTH: usize = 15;

/// Maximum query complexity score (DoS protection).
/// Each field has a default complexity of 1, nested objects multiply.
pub const MAX_QUERY_COMPLEXITY: usize = 500;

/// Build the GraphQL schema over a ledger repository.
///
/// Includes query depth and complexity limits for DoS protection.
pub fn build_schema<R: LedgerRepository + 'static>(ledger: Arc<R>) -> FurnaceSchema {
    let ledger: Arc<dyn LedgerRepository> = ledger;
    Schema::build(LedgerQuery, EmptyMutation, EmptySubscription)
        .data(ledger)
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_complexity(MAX_QUERY_COMPLEXITY)
        .finish()
}

// -----------------------------------------------------------------------------
// Ledger Query
// -----------------------------------------------------------------------------

/// Query root over the treasury ledger.
#[derive(Default)]
pub struct LedgerQuery;

#[Object]
impl LedgerQuery {
    /// Pool size, checkpoint and burn totals.
    async fn status<'ctx>(&self, ctx: &Context<'ctx>) -> Result<LedgerStatus> {
        let ledger = ctx.data::<Arc<dyn LedgerRepository>>()?;
        Ok(ledger.state().await?.into())
    }

    /// List exchanges into the treasury.
    async fn exchanges<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        #[graphql(default = 20)] first: Option<i32>,
        after: Option<String>,
        #[graphql(default)] order: Order,
    ) -> Result<ExchangeConnection> {
        let ledger = ctx.data::<Arc<dyn LedgerRepository>>()?;
        let pagination = build_pagination(first, after)?;

        let connection = ledger.list_exchanges(pagination, order.into()).await?;
        Ok(connection.into())
    }

    /// List burns from the treasury.
    async fn burns<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        #[graphql(default = 20)] first: Option<i32>,
        after: Option<String>,
        #[graphql(default)] order: Order,
    ) -> Result<BurnConnection> {
        let ledger = ctx.data::<Arc<dyn LedgerRepository>>()?;
        let pagination = build_pagination(first, after)?;

        let connection = ledger.list_burns(pagination, order.into()).await?;
        Ok(connection.into())
    }

    /// List blocks that halted the indexer.
    async fn processing_errors<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        #[graphql(default = 20)] first: Option<i32>,
        after: Option<String>,
        #[graphql(default)] order: Order,
    ) -> Result<ProcessingErrorConnection> {
        let ledger = ctx.data::<Arc<dyn LedgerRepository>>()?;
        let pagination = build_pagination(first, after)?;

        let connection = ledger.list_errors(pagination, order.into()).await?;
        Ok(connection.into())
    }

    /// List blocks processed ahead of finality.
    async fn processing_warnings<'ctx>(
        &self,
        ctx: &Context<'ctx>,
        #[graphql(default = 20)] first: Option<i32>,
        after: Option<String>,
        #[graphql(default)] order: Order,
    ) -> Result<ProcessingWarningConnection> {
        let ledger = ctx.data::<Arc<dyn LedgerRepository>>()?;
        let pagination = build_pagination(first, after)?;

        let connection = ledger.list_warnings(pagination, order.into()).await?;
        Ok(connection.into())
    }
}

// -----------------------------------------------------------------------------
// Helpers & Validation
// -----------------------------------------------------------------------------

/// Maximum length for cursors (an `i64` sequence number).
const MAX_CURSOR_LENGTH: usize = 19;

fn build_pagination(first: Option<i32>, after: Option<String>) -> Result<Pagination> {
    Ok(Pagination {
        first: Some(validate_pagination_first(first)),
        after: after.map(validate_cursor).transpose()?,
        ..Default::default()
    })
}

/// Validate an `after` cursor.
fn validate_cursor(value: String) -> Result<Cursor> {
    if value.is_empty() || value.len() > MAX_CURSOR_LENGTH {
        return Err(async_graphql::Error::new(format!(
            "Invalid cursor: expected 1 to {} digits",
            MAX_CURSOR_LENGTH
        )));
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(async_graphql::Error::new(
            "Invalid cursor: must contain only digits",
        ));
    }
    Ok(Cursor { value })
}

/// Validate and normalize pagination first parameter.
fn validate_pagination_first(first: Option<i32>) -> i32 {
    first
        .unwrap_or(furnace_core::ports::DEFAULT_PAGE_SIZE as i32)
        .clamp(1, MAX_PAGE_SIZE as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    use furnace_core::error::StorageResult;
    use furnace_core::models::{
        BlockCommit, Burn, Exchange, LedgerState, ProcessingError, ProcessingWarning,
    };
    use furnace_core::ports::{Connection, OrderDirection, PurgeStats};

    /// Ledger en mémoire, en lecture seule.
    #[derive(Default)]
    struct FakeLedger {
        burns: Vec<Burn>,
        seen: Mutex<Vec<(i64, Option<i64>, OrderDirection)>>,
    }

    impl FakeLedger {
        fn with_burns(count: u64) -> Self {
            let now = Utc::now();
            Self {
                burns: (1..=count)
                    .map(|n| Burn {
                        amount: n as u128 * 1_000,
                        block_height: 100 + n,
                        date: now,
                        log_time: now,
                    })
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LedgerRepository for FakeLedger {
        async fn state(&self) -> StorageResult<LedgerState> {
            Ok(LedgerState {
                chain_id: Some("0xabc".into()),
                size_dollar_pool: 99.0,
                last_block_processed: Some(105),
                tokens_burned: u128::MAX,
                ..Default::default()
            })
        }

        async fn ensure_chain_id(&self, chain_id: &str) -> StorageResult<String> {
            Ok(chain_id.to_string())
        }

        async fn append_warning(&self, _warning: &ProcessingWarning) -> StorageResult<()> {
            Ok(())
        }

        async fn commit_block(&self, _commit: &BlockCommit) -> StorageResult<()> {
            Ok(())
        }

        async fn record_fatal_error(&self, _error: &ProcessingError) -> StorageResult<()> {
            Ok(())
        }

        async fn list_exchanges(
            &self,
            _pagination: Pagination,
            _order: OrderDirection,
        ) -> StorageResult<Connection<Exchange>> {
            Ok(Connection::from_rows(Vec::new(), 20, false))
        }

        async fn list_burns(
            &self,
            pagination: Pagination,
            order: OrderDirection,
        ) -> StorageResult<Connection<Burn>> {
            let limit = pagination.limit();
            let after = pagination.after_seq();
            self.seen.lock().unwrap().push((limit, after, order));

            let rows: Vec<(i64, Burn)> = self
                .burns
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, b)| (i as i64 + 1, b))
                .filter(|(seq, _)| after.is_none_or(|a| *seq > a))
                .take(limit as usize + 1)
                .collect();
            Ok(Connection::from_rows(rows, limit, after.is_some()))
        }

        async fn list_errors(
            &self,
            _pagination: Pagination,
            _order: OrderDirection,
        ) -> StorageResult<Connection<ProcessingError>> {
            let error = ProcessingError {
                block_number: 102,
                reason: Some("block 102 timed out".into()),
                log_time: Utc::now(),
            };
            Ok(Connection::from_rows(vec![(1, error)], 20, false))
        }

        async fn list_warnings(
            &self,
            _pagination: Pagination,
            _order: OrderDirection,
        ) -> StorageResult<Connection<ProcessingWarning>> {
            Ok(Connection::from_rows(Vec::new(), 20, false))
        }

        async fn purge(&self) -> StorageResult<PurgeStats> {
            Ok(PurgeStats::default())
        }
    }

    async fn query(ledger: Arc<FakeLedger>, q: &str) -> async_graphql::Response {
        build_schema(ledger).execute(q).await
    }

    #[tokio::test]
    async fn status_exposes_ledger_state() {
        let res = query(
            Arc::new(FakeLedger::default()),
            "{ status { chainId sizeDollarPool lastBlockProcessed tokensBurned } }",
        )
        .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);

        let data = res.data.into_json().unwrap();
        assert_eq!(
            data,
            json!({ "status": {
                "chainId": "0xabc",
                "sizeDollarPool": 99.0,
                "lastBlockProcessed": 105,
                "tokensBurned": u128::MAX.to_string(),
            }})
        );
    }

    // Test critique: pagination par curseur sur le journal des burns
    #[tokio::test]
    async fn burns_are_paginated_by_cursor() {
        let ledger = Arc::new(FakeLedger::with_burns(3));

        let res = query(
            ledger.clone(),
            r#"{ burns(first: 2, order: ASC) { edges { cursor node { amount blockHeight } } pageInfo { hasNextPage endCursor } } }"#,
        )
        .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let data = res.data.into_json().unwrap();
        assert_eq!(data["burns"]["edges"][0]["node"]["amount"], "1000");
        assert_eq!(data["burns"]["edges"][1]["node"]["blockHeight"], 102);
        assert_eq!(data["burns"]["pageInfo"]["hasNextPage"], true);
        assert_eq!(data["burns"]["pageInfo"]["endCursor"], "2");

        let res = query(
            ledger.clone(),
            r#"{ burns(first: 2, after: "2") { edges { node { amount } } pageInfo { hasNextPage hasPreviousPage } } }"#,
        )
        .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let data = res.data.into_json().unwrap();
        assert_eq!(data["burns"]["edges"].as_array().unwrap().len(), 1);
        assert_eq!(data["burns"]["edges"][0]["node"]["amount"], "3000");
        assert_eq!(data["burns"]["pageInfo"]["hasNextPage"], false);
        assert_eq!(data["burns"]["pageInfo"]["hasPreviousPage"], true);

        let seen = ledger.seen.lock().unwrap();
        assert_eq!(seen[0], (2, None, OrderDirection::Asc));
        // Ordre par défaut: du plus récent au plus ancien
        assert_eq!(seen[1], (2, Some(2), OrderDirection::Desc));
    }

    #[tokio::test]
    async fn processing_errors_are_listed() {
        let res = query(
            Arc::new(FakeLedger::default()),
            "{ processingErrors { edges { node { blockNumber reason } } } processingWarnings { edges { cursor } } }",
        )
        .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let data = res.data.into_json().unwrap();
        assert_eq!(data["processingErrors"]["edges"][0]["node"]["blockNumber"], 102);
        assert_eq!(
            data["processingErrors"]["edges"][0]["node"]["reason"],
            "block 102 timed out"
        );
        assert_eq!(data["processingWarnings"]["edges"], json!([]));
    }

    // Tests de validation critiques - protègent contre les injections/DoS

    #[tokio::test]
    async fn malformed_cursor_is_rejected() {
        let res = query(
            Arc::new(FakeLedger::with_burns(1)),
            r#"{ burns(after: "1; DROP TABLE burns") { edges { cursor } } }"#,
        )
        .await;
        assert_eq!(res.errors.len(), 1);
        assert!(res.errors[0].message.contains("Invalid cursor"));
    }

    #[test]
    fn test_validate_cursor_boundaries() {
        assert!(validate_cursor("".into()).is_err());
        assert!(validate_cursor("9".repeat(40)).is_err());
        assert!(validate_cursor("-1".into()).is_err());
        assert_eq!(validate_cursor("42".into()).unwrap().value, "42");
    }

    #[test]
    fn test_pagination_clamping() {
        // Valeurs négatives/zéro clampées à 1
        assert_eq!(validate_pagination_first(Some(-100)), 1);
        assert_eq!(validate_pagination_first(Some(0)), 1);
        // Valeurs trop grandes clampées à MAX
        assert_eq!(validate_pagination_first(Some(10000)), MAX_PAGE_SIZE as i32);
        assert_eq!(validate_pagination_first(None), 20);
    }
}
