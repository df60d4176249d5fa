use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Which cart amount a campaign discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum AppliesTo {
    Cart,
    Delivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum DiscountType {
    Percent,
    Flat,
}

/// Configuration combinations a campaign row must never carry. Backed by the
/// CHECK constraints in the schema; validated again in code so misconfigured
/// rows loaded from elsewhere fail loudly instead of evaluating.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CampaignConfigError {
    #[error("end_date must be on or after start_date")]
    InvertedSchedule,
    #[error("for PERCENT type, discount_value must be between 0 and 100 (got {0})")]
    PercentOutOfRange(Decimal),
    #[error("for FLAT type, discount_value must be >= 0 (got {0})")]
    NegativeFlatValue(Decimal),
    #[error("run_days_limit must be at least 1 when set")]
    ZeroRunDays,
}

/// A discount policy: schedule, targeting, limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Campaign {
    pub id: i64,
    pub name: String,
    pub description: String,

    pub applies_to: AppliesTo,
    pub discount_type: DiscountType,
    /// Percent value for PERCENT type, absolute amount for FLAT type.
    pub discount_value: Decimal,
    /// Optional cap per single redemption.
    pub max_discount_amount: Option<Decimal>,

    pub allow_all_customers: bool,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Usable for exactly this many calendar days from start_date, regardless
    /// of end_date.
    pub run_days_limit: Option<i32>,

    /// Lifetime cumulative discount cap; unlimited when absent.
    pub total_budget_limit: Option<Decimal>,
    pub max_txn_per_customer_per_day: i32,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub applies_to: AppliesTo,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    #[serde(default = "default_allow_all")]
    pub allow_all_customers: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub run_days_limit: Option<i32>,
    pub total_budget_limit: Option<Decimal>,
    #[serde(default = "default_daily_txn_cap")]
    pub max_txn_per_customer_per_day: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_allow_all() -> bool {
    true
}

fn default_daily_txn_cap() -> i32 {
    999
}

fn default_active() -> bool {
    true
}

fn validate_config(
    discount_type: DiscountType,
    discount_value: Decimal,
    start_date: NaiveDate,
    end_date: NaiveDate,
    run_days_limit: Option<i32>,
) -> Result<(), CampaignConfigError> {
    if end_date < start_date {
        return Err(CampaignConfigError::InvertedSchedule);
    }
    match discount_type {
        DiscountType::Percent => {
            if discount_value < Decimal::ZERO || discount_value > Decimal::ONE_HUNDRED {
                return Err(CampaignConfigError::PercentOutOfRange(discount_value));
            }
        }
        DiscountType::Flat => {
            if discount_value < Decimal::ZERO {
                return Err(CampaignConfigError::NegativeFlatValue(discount_value));
            }
        }
    }
    if matches!(run_days_limit, Some(limit) if limit < 1) {
        return Err(CampaignConfigError::ZeroRunDays);
    }
    Ok(())
}

impl Campaign {
    pub fn validate(&self) -> Result<(), CampaignConfigError> {
        validate_config(
            self.discount_type,
            self.discount_value,
            self.start_date,
            self.end_date,
            self.run_days_limit,
        )
    }

    pub fn is_within_window(&self, today: NaiveDate) -> bool {
        self.start_date <= today && today <= self.end_date
    }

    /// True once the campaign has run past its run-days allowance: with a
    /// limit of N, the last usable day is start_date + (N - 1).
    pub fn days_exhausted(&self, today: NaiveDate) -> bool {
        match self.run_days_limit {
            Some(limit) => today > self.start_date + chrono::Duration::days(i64::from(limit) - 1),
            None => false,
        }
    }

    /// Remaining usable days considering both end_date and run_days_limit.
    /// Display convenience, not enforcement.
    pub fn days_left(&self, today: NaiveDate) -> i64 {
        if today > self.end_date {
            return 0;
        }
        let natural_left = (self.end_date - today).num_days() + 1;
        match self.run_days_limit {
            Some(limit) => {
                let used = ((today - self.start_date).num_days() + 1).max(0);
                natural_left.min((i64::from(limit) - used).max(0))
            }
            None => natural_left.max(0),
        }
    }

    /// Remaining budget given the ledger's cumulative spend; None if unlimited.
    pub fn remaining_budget(&self, total_discount_given: Decimal) -> Option<Decimal> {
        self.total_budget_limit
            .map(|limit| limit - total_discount_given)
    }
}

impl NewCampaign {
    pub fn validate(&self) -> Result<(), CampaignConfigError> {
        validate_config(
            self.discount_type,
            self.discount_value,
            self.start_date,
            self.end_date,
            self.run_days_limit,
        )
    }
}
