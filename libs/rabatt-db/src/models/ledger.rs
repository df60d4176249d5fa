use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cumulative discount paid out by one campaign. One row per campaign,
/// created lazily by the redemption protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CampaignBudget {
    pub id: i64,
    pub campaign_id: i64,
    pub total_discount_given: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Redemption count for one (campaign, customer, calendar day) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CampaignUsageDaily {
    pub id: i64,
    pub campaign_id: i64,
    pub customer_id: i64,
    pub usage_date: NaiveDate,
    pub txn_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
