use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::models::ledger::{CampaignBudget, CampaignUsageDaily};

/// Access to the usage ledgers: the per-campaign budget counter and the
/// per-customer per-day redemption counters.
///
/// Reads go through the pool and never create rows, so previews leave no
/// trace. The mutating methods take the caller's open transaction and follow
/// an upsert-then-lock shape: the lazy row is created with `ON CONFLICT DO
/// NOTHING` and then read under `FOR UPDATE`, all inside the same
/// transaction, so there is no window between existence check and first
/// write.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cumulative discount committed for a campaign; 0 when no ledger row
    /// exists yet.
    pub async fn budget_given(&self, campaign_id: i64) -> Result<Decimal> {
        sqlx::query_scalar(
            "SELECT COALESCE(
                (SELECT total_discount_given FROM campaign_budgets WHERE campaign_id = $1),
                0::NUMERIC
            )",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to read campaign budget ledger")
    }

    /// Redemptions committed today for (campaign, customer); 0 when no usage
    /// row exists yet.
    pub async fn daily_txn_count(
        &self,
        campaign_id: i64,
        customer_id: i64,
        usage_date: NaiveDate,
    ) -> Result<i32> {
        sqlx::query_scalar(
            "SELECT COALESCE(
                (SELECT txn_count FROM campaign_usage_daily
                 WHERE campaign_id = $1 AND customer_id = $2 AND usage_date = $3),
                0
            )",
        )
        .bind(campaign_id)
        .bind(customer_id)
        .bind(usage_date)
        .fetch_one(&self.pool)
        .await
        .context("Failed to read daily usage ledger")
    }

    pub async fn budget(&self, campaign_id: i64) -> Result<Option<CampaignBudget>> {
        sqlx::query_as::<_, CampaignBudget>(
            "SELECT * FROM campaign_budgets WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch campaign budget row")
    }

    pub async fn recent_daily_usage(
        &self,
        campaign_id: i64,
        limit: i64,
    ) -> Result<Vec<CampaignUsageDaily>> {
        sqlx::query_as::<_, CampaignUsageDaily>(
            "SELECT * FROM campaign_usage_daily WHERE campaign_id = $1
             ORDER BY usage_date DESC, updated_at DESC LIMIT $2",
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch daily usage records")
    }

    /// Create the usage row if absent, then lock it and return the committed
    /// txn_count. The lock is held until the transaction ends.
    pub async fn lock_daily_usage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign_id: i64,
        customer_id: i64,
        usage_date: NaiveDate,
    ) -> Result<i32> {
        sqlx::query(
            "INSERT INTO campaign_usage_daily (campaign_id, customer_id, usage_date)
             VALUES ($1, $2, $3)
             ON CONFLICT (campaign_id, customer_id, usage_date) DO NOTHING",
        )
        .bind(campaign_id)
        .bind(customer_id)
        .bind(usage_date)
        .execute(&mut **tx)
        .await
        .context("Failed to ensure daily usage row")?;

        sqlx::query_scalar(
            "SELECT txn_count FROM campaign_usage_daily
             WHERE campaign_id = $1 AND customer_id = $2 AND usage_date = $3
             FOR UPDATE",
        )
        .bind(campaign_id)
        .bind(customer_id)
        .bind(usage_date)
        .fetch_one(&mut **tx)
        .await
        .context("Failed to lock daily usage row")
    }

    pub async fn increment_daily_usage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign_id: i64,
        customer_id: i64,
        usage_date: NaiveDate,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE campaign_usage_daily
             SET txn_count = txn_count + 1, updated_at = CURRENT_TIMESTAMP
             WHERE campaign_id = $1 AND customer_id = $2 AND usage_date = $3",
        )
        .bind(campaign_id)
        .bind(customer_id)
        .bind(usage_date)
        .execute(&mut **tx)
        .await
        .context("Failed to increment daily usage")?;
        Ok(())
    }

    /// Create the budget row if absent, then lock it and return the committed
    /// total_discount_given. Always acquired after the daily usage lock.
    pub async fn lock_budget(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign_id: i64,
    ) -> Result<Decimal> {
        sqlx::query(
            "INSERT INTO campaign_budgets (campaign_id) VALUES ($1)
             ON CONFLICT (campaign_id) DO NOTHING",
        )
        .bind(campaign_id)
        .execute(&mut **tx)
        .await
        .context("Failed to ensure budget row")?;

        sqlx::query_scalar(
            "SELECT total_discount_given FROM campaign_budgets WHERE campaign_id = $1 FOR UPDATE",
        )
        .bind(campaign_id)
        .fetch_one(&mut **tx)
        .await
        .context("Failed to lock budget row")
    }

    pub async fn add_to_budget(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        campaign_id: i64,
        amount: Decimal,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE campaign_budgets
             SET total_discount_given = total_discount_given + $1, updated_at = CURRENT_TIMESTAMP
             WHERE campaign_id = $2",
        )
        .bind(amount)
        .bind(campaign_id)
        .execute(&mut **tx)
        .await
        .context("Failed to add to budget ledger")?;
        Ok(())
    }
}
