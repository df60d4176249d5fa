use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::campaign::{Campaign, NewCampaign};

#[derive(Debug, Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: &NewCampaign) -> Result<Campaign> {
        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                name, description, applies_to, discount_type, discount_value,
                max_discount_amount, allow_all_customers, start_date, end_date,
                run_days_limit, total_budget_limit, max_txn_per_customer_per_day, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.applies_to)
        .bind(new.discount_type)
        .bind(new.discount_value)
        .bind(new.max_discount_amount)
        .bind(new.allow_all_customers)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.run_days_limit)
        .bind(new.total_budget_limit)
        .bind(new.max_txn_per_customer_per_day)
        .bind(new.is_active)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create campaign")
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch campaign by ID")
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch campaign by name")
    }

    pub async fn list_active(&self) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE is_active = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active campaigns")
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<()> {
        sqlx::query(
            "UPDATE campaigns SET is_active = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
        )
        .bind(is_active)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to update campaign active flag")?;
        Ok(())
    }

    pub async fn add_allowed_customers(&self, campaign_id: i64, customer_ids: &[i64]) -> Result<()> {
        for customer_id in customer_ids {
            sqlx::query(
                "INSERT INTO campaign_customers (campaign_id, customer_id) VALUES ($1, $2)
                 ON CONFLICT (campaign_id, customer_id) DO NOTHING",
            )
            .bind(campaign_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await
            .context("Failed to add customer to campaign allow-list")?;
        }
        Ok(())
    }

    pub async fn allowed_customer_count(&self, campaign_id: i64) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM campaign_customers WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count campaign allow-list")
    }

    pub async fn is_customer_allowed(&self, campaign_id: i64, customer_id: i64) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM campaign_customers WHERE campaign_id = $1 AND customer_id = $2)",
        )
        .bind(campaign_id)
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check campaign allow-list membership")
    }
}
