//! Ledger repository implementation for PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgRow;
use tracing::{debug, instrument};

use furnace_core::error::{StorageError, StorageResult};
use furnace_core::models::{
    BlockCommit, Burn, Exchange, ExchangeStatus, LedgerState, ProcessingError, ProcessingWarning,
};
use furnace_core::ports::{
    Connection, LedgerRepository, OrderDirection, Pagination, PurgeStats,
};

use super::database::Database;
use super::helpers::{bigint_to_u64, bytes_to_account, numeric_to_u128};

const EXCHANGE_COLUMNS: &str = "id, sender, recipient, sender_memo, payment_address, \
     amount::TEXT AS amount, price, amount_usd, block_height, date, log_time, status";
const BURN_COLUMNS: &str = "id, amount::TEXT AS amount, block_height, date, log_time";
const ERROR_COLUMNS: &str = "id, block_number, reason, log_time";
const WARNING_COLUMNS: &str = "id, block_number, message, log_time";

/// PostgreSQL implementation of LedgerRepository.
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Fetch one page of an append-only table, keyed by its `id` sequence.
    async fn fetch_page<Row, T>(
        &self,
        table: &'static str,
        columns: &'static str,
        pagination: Pagination,
        order: OrderDirection,
        convert: fn(Row) -> StorageResult<(i64, T)>,
    ) -> StorageResult<Connection<T>>
    where
        Row: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
        T: Send,
    {
        let limit = pagination.limit();
        let after = pagination.after_seq();
        let (order_sql, cursor_op) = match order {
            OrderDirection::Asc => ("ASC", ">"),
            OrderDirection::Desc => ("DESC", "<"),
        };

        // SAFETY: table, columns and operators are constants; the cursor
        // value is bound as a parameter.
        let where_clause = match after {
            Some(_) => format!("WHERE id {} $1", cursor_op),
            None => String::new(),
        };
        let query = format!(
            "SELECT {} FROM {} {} ORDER BY id {} LIMIT {}",
            columns,
            table,
            where_clause,
            order_sql,
            limit + 1
        );

        let mut query_builder = sqlx::query_as::<_, Row>(&query);
        if let Some(after) = after {
            query_builder = query_builder.bind(after);
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        let rows = rows
            .into_iter()
            .map(convert)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Connection::from_rows(rows, limit, after.is_some()))
    }

    async fn count(&self, table: &'static str) -> StorageResult<u64> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
        Ok(row.0 as u64)
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn state(&self) -> StorageResult<LedgerState> {
        let row = sqlx::query_as::<_, LedgerStateRow>(
            r#"
            SELECT chain_id, size_dollar_pool, last_block_processed, replenish_amount,
                   tokens_burned::TEXT AS tokens_burned, updated_at
            FROM ledger_state
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        match row {
            Some(row) => row.into_state(),
            None => Ok(LedgerState::default()),
        }
    }

    async fn ensure_chain_id(&self, chain_id: &str) -> StorageResult<String> {
        let row: (Option<String>,) = sqlx::query_as(
            r#"
            INSERT INTO ledger_state (id, chain_id)
            VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE SET
                chain_id = COALESCE(ledger_state.chain_id, EXCLUDED.chain_id)
            RETURNING chain_id
            "#,
        )
        .bind(chain_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(row.0.unwrap_or_else(|| chain_id.to_string()))
    }

    async fn append_warning(&self, warning: &ProcessingWarning) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO processing_warnings (block_number, message, log_time)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(warning.block_number as i64)
        .bind(&warning.message)
        .bind(warning.log_time)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip_all, fields(block = commit.block_number))]
    async fn commit_block(&self, commit: &BlockCommit) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        for exchange in &commit.exchanges {
            sqlx::query(
                r#"
                INSERT INTO exchanges (
                    sender, recipient, sender_memo, payment_address, amount,
                    price, amount_usd, block_height, date, log_time, status
                )
                VALUES ($1, $2, $3, $4, $5::NUMERIC, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(&exchange.sender.0[..])
            .bind(&exchange.recipient.0[..])
            .bind(&exchange.sender_memo)
            .bind(&exchange.payment_address)
            .bind(exchange.amount.to_string())
            .bind(exchange.price)
            .bind(exchange.amount_usd)
            .bind(exchange.block_height as i64)
            .bind(exchange.date)
            .bind(exchange.log_time)
            .bind(exchange.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
        }

        for burn in &commit.burns {
            sqlx::query(
                r#"
                INSERT INTO burns (amount, block_height, date, log_time)
                VALUES ($1::NUMERIC, $2, $3, $4)
                "#,
            )
            .bind(burn.amount.to_string())
            .bind(burn.block_height as i64)
            .bind(burn.date)
            .bind(burn.log_time)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;
        }

        // The checkpoint only moves forward; a stale commit rolls back whole
        let result = sqlx::query(
            r#"
            UPDATE ledger_state
            SET size_dollar_pool = $1,
                last_block_processed = $2,
                tokens_burned = tokens_burned + $3::NUMERIC,
                updated_at = NOW()
            WHERE id = 1
              AND (last_block_processed IS NULL OR last_block_processed < $2)
            "#,
        )
        .bind(commit.pool_after)
        .bind(commit.block_number as i64)
        .bind(commit.burned().to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        if result.rows_affected() != 1 {
            return Err(StorageError::TransactionError(format!(
                "checkpoint would not advance to block {}",
                commit.block_number
            )));
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        debug!(
            exchanges = commit.exchanges.len(),
            burns = commit.burns.len(),
            "Block committed"
        );

        Ok(())
    }

    async fn record_fatal_error(&self, error: &ProcessingError) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO processing_errors (block_number, reason, log_time)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(error.block_number as i64)
        .bind(&error.reason)
        .bind(error.log_time)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE ledger_state
            SET last_block_processed = GREATEST(COALESCE(last_block_processed, $1), $1),
                updated_at = NOW()
            WHERE id = 1
            "#,
        )
        .bind(error.block_number as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        Ok(())
    }

    async fn list_exchanges(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<Exchange>> {
        self.fetch_page(
            "exchanges",
            EXCHANGE_COLUMNS,
            pagination,
            order,
            ExchangeRow::into_exchange,
        )
        .await
    }

    async fn list_burns(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<Burn>> {
        self.fetch_page("burns", BURN_COLUMNS, pagination, order, BurnRow::into_burn)
            .await
    }

    async fn list_errors(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<ProcessingError>> {
        self.fetch_page(
            "processing_errors",
            ERROR_COLUMNS,
            pagination,
            order,
            ErrorRow::into_error,
        )
        .await
    }

    async fn list_warnings(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<ProcessingWarning>> {
        self.fetch_page(
            "processing_warnings",
            WARNING_COLUMNS,
            pagination,
            order,
            WarningRow::into_warning,
        )
        .await
    }

    /// Truncate the record tables and reset the checkpoint, the chain id
    /// and `tokens_burned`. The pool size and replenish amount are
    /// maintained by operators and survive a purge.
    #[instrument(skip(self))]
    async fn purge(&self) -> StorageResult<PurgeStats> {
        debug!("Starting ledger purge");

        // Count rows before purge for reporting
        let stats = PurgeStats {
            exchanges_removed: self.count("exchanges").await?,
            burns_removed: self.count("burns").await?,
            errors_removed: self.count("processing_errors").await?,
            warnings_removed: self.count("processing_warnings").await?,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        sqlx::query(
            "TRUNCATE exchanges, burns, processing_errors, processing_warnings RESTART IDENTITY",
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE ledger_state
            SET chain_id = NULL,
                last_block_processed = NULL,
                tokens_burned = 0,
                updated_at = NOW()
            WHERE id = 1
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        debug!("Ledger purge completed");

        Ok(stats)
    }
}

// =============================================================================
// Rows
// =============================================================================

#[derive(sqlx::FromRow)]
struct LedgerStateRow {
    chain_id: Option<String>,
    size_dollar_pool: f64,
    last_block_processed: Option<i64>,
    replenish_amount: f64,
    tokens_burned: String,
    updated_at: DateTime<Utc>,
}

impl LedgerStateRow {
    fn into_state(self) -> StorageResult<LedgerState> {
        Ok(LedgerState {
            chain_id: self.chain_id,
            size_dollar_pool: self.size_dollar_pool,
            last_block_processed: self
                .last_block_processed
                .map(|n| bigint_to_u64(n, "ledger_state.last_block_processed"))
                .transpose()?,
            replenish_amount: self.replenish_amount,
            tokens_burned: numeric_to_u128(&self.tokens_burned, "ledger_state.tokens_burned")?,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ExchangeRow {
    id: i64,
    sender: Vec<u8>,
    recipient: Vec<u8>,
    sender_memo: String,
    payment_address: String,
    amount: String,
    price: f64,
    amount_usd: f64,
    block_height: i64,
    date: DateTime<Utc>,
    log_time: DateTime<Utc>,
    status: String,
}

impl ExchangeRow {
    fn into_exchange(self) -> StorageResult<(i64, Exchange)> {
        let status = ExchangeStatus::parse_str(&self.status).ok_or_else(|| {
            StorageError::SerializationError(format!(
                "exchange.status is unknown: {}",
                self.status
            ))
        })?;

        Ok((
            self.id,
            Exchange {
                sender: bytes_to_account(self.sender, "exchange.sender")?,
                recipient: bytes_to_account(self.recipient, "exchange.recipient")?,
                sender_memo: self.sender_memo,
                payment_address: self.payment_address,
                amount: numeric_to_u128(&self.amount, "exchange.amount")?,
                price: self.price,
                amount_usd: self.amount_usd,
                block_height: bigint_to_u64(self.block_height, "exchange.block_height")?,
                date: self.date,
                log_time: self.log_time,
                status,
            },
        ))
    }
}

#[derive(sqlx::FromRow)]
struct BurnRow {
    id: i64,
    amount: String,
    block_height: i64,
    date: DateTime<Utc>,
    log_time: DateTime<Utc>,
}

impl BurnRow {
    fn into_burn(self) -> StorageResult<(i64, Burn)> {
        Ok((
            self.id,
            Burn {
                amount: numeric_to_u128(&self.amount, "burn.amount")?,
                block_height: bigint_to_u64(self.block_height, "burn.block_height")?,
                date: self.date,
                log_time: self.log_time,
            },
        ))
    }
}

#[derive(sqlx::FromRow)]
struct ErrorRow {
    id: i64,
    block_number: i64,
    reason: Option<String>,
    log_time: DateTime<Utc>,
}

impl ErrorRow {
    fn into_error(self) -> StorageResult<(i64, ProcessingError)> {
        Ok((
            self.id,
            ProcessingError {
                block_number: bigint_to_u64(self.block_number, "processing_error.block_number")?,
                reason: self.reason,
                log_time: self.log_time,
            },
        ))
    }
}

#[derive(sqlx::FromRow)]
struct WarningRow {
    id: i64,
    block_number: i64,
    message: String,
    log_time: DateTime<Utc>,
}

impl WarningRow {
    fn into_warning(self) -> StorageResult<(i64, ProcessingWarning)> {
        Ok((
            self.id,
            ProcessingWarning {
                block_number: bigint_to_u64(self.block_number, "processing_warning.block_number")?,
                message: self.message,
                log_time: self.log_time,
            },
        ))
    }
}
