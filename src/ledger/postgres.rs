//! PostgreSQL ledger

use super::{LedgerEntry, TransactionLedger};
use crate::config::DatabaseConfig;
use crate::error::GatewayResult;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

/// Ledger persisted to the `transaction_history` table
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub async fn new(config: &DatabaseConfig) -> GatewayResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the ledger table if it does not exist
    pub async fn run_migrations(&self) -> GatewayResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transaction_history (
                id UUID PRIMARY KEY,
                user_id TEXT NOT NULL,
                chain VARCHAR(32) NOT NULL,
                destination_chain VARCHAR(32),
                tx_type VARCHAR(16) NOT NULL,
                amount NUMERIC NOT NULL,
                tx_hash VARCHAR(66),
                gateway_wallet_address VARCHAR(42) NOT NULL,
                status VARCHAR(16) NOT NULL,
                reason TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transaction_history_user
            ON transaction_history (user_id, created_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }
}

#[async_trait]
impl TransactionLedger for PgLedger {
    async fn append(&self, entry: LedgerEntry) -> GatewayResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transaction_history
                (id, user_id, chain, destination_chain, tx_type, amount, tx_hash,
                 gateway_wallet_address, status, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6::NUMERIC, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(entry.chain.as_str())
        .bind(entry.destination_chain.map(|c| c.as_str()))
        .bind(entry.tx_type.as_str())
        .bind(&entry.amount)
        .bind(&entry.tx_hash)
        .bind(entry.gateway_wallet_address.to_string())
        .bind(entry.status.as_str())
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Recorded {} {} for {}", entry.status.as_str(), entry.tx_type.as_str(), entry.user_id);
        Ok(())
    }

    async fn health_check(&self) -> GatewayResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
