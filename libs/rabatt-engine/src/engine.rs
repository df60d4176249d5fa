//! Caller-facing operations: read-only previews, the transactional
//! redemption protocol, and the active-campaign listing for a cart.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use rabatt_db::models::campaign::{AppliesTo, Campaign, DiscountType};
use rabatt_db::repositories::campaign_repo::CampaignRepository;
use rabatt_db::repositories::customer_repo::CustomerRepository;
use rabatt_db::repositories::ledger_repo::LedgerRepository;

use crate::error::{EngineError, Result, ValidationFault};
use crate::rule::{self, CartSnapshot, Evaluation, LedgerSnapshot, RejectionReason};
use crate::targeting::{self, CustomerTargeting};

/// Outcome of a preview or redemption: either a discount amount against a
/// base, or a rejection reason. Rejections are part of the normal flow, not
/// errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewOutcome {
    pub applicable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    pub discount_amount: Decimal,
    pub applies_to: AppliesTo,
}

impl PreviewOutcome {
    pub fn applied(discount_amount: Decimal, applies_to: AppliesTo) -> Self {
        Self {
            applicable: true,
            reason: None,
            discount_amount,
            applies_to,
        }
    }

    pub fn rejected(reason: RejectionReason, applies_to: AppliesTo) -> Self {
        Self {
            applicable: false,
            reason: Some(reason),
            discount_amount: Decimal::ZERO,
            applies_to,
        }
    }

    fn from_evaluation(eval: Evaluation, applies_to: AppliesTo) -> Self {
        match eval {
            Evaluation::Applicable {
                discount_amount,
                applies_to,
            } => Self::applied(discount_amount, applies_to),
            Evaluation::Rejected(reason) => Self::rejected(reason, applies_to),
        }
    }
}

/// One entry of the "which campaigns apply to this cart" listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableCampaign {
    pub campaign_id: i64,
    pub campaign_name: String,
    pub applies_to: AppliesTo,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_amount: Decimal,
}

/// Display conveniences for one campaign: how much budget and schedule is
/// left. Not used for enforcement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignStatus {
    pub campaign_id: i64,
    pub name: String,
    pub is_active: bool,
    pub total_discount_given: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_budget: Option<Decimal>,
    pub days_left: i64,
}

#[derive(Clone)]
pub struct DiscountEngine {
    pool: PgPool,
    campaigns: CampaignRepository,
    customers: CustomerRepository,
    ledger: LedgerRepository,
    targeting: Arc<dyn CustomerTargeting>,
}

impl fmt::Debug for DiscountEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscountEngine").finish_non_exhaustive()
    }
}

impl DiscountEngine {
    pub fn new(pool: PgPool) -> Self {
        let campaigns = CampaignRepository::new(pool.clone());
        Self {
            customers: CustomerRepository::new(pool.clone()),
            ledger: LedgerRepository::new(pool.clone()),
            targeting: Arc::new(campaigns.clone()),
            campaigns,
            pool,
        }
    }

    /// Swap the allow-list backing store.
    pub fn with_targeting(mut self, targeting: Arc<dyn CustomerTargeting>) -> Self {
        self.targeting = targeting;
        self
    }

    /// Check whether a campaign applies to the given cart and compute the
    /// discount. Never mutates ledger state, no matter how often it runs.
    pub async fn preview(
        &self,
        campaign_id: i64,
        customer_id: i64,
        cart: CartSnapshot,
    ) -> Result<PreviewOutcome> {
        self.preview_on(today(), campaign_id, customer_id, cart).await
    }

    /// `preview` with an explicit evaluation date, for batch jobs and tests.
    pub async fn preview_on(
        &self,
        date: NaiveDate,
        campaign_id: i64,
        customer_id: i64,
        cart: CartSnapshot,
    ) -> Result<PreviewOutcome> {
        validate_cart(&cart)?;
        let campaign = self.load_campaign(campaign_id).await?;
        self.ensure_customer(customer_id).await?;
        self.preview_campaign(&campaign, customer_id, &cart, date).await
    }

    /// Apply and persist a redemption atomically: re-validate, lock the
    /// daily usage row, re-check under lock, then commit the usage increment
    /// and the budget addition together.
    pub async fn redeem(
        &self,
        campaign_id: i64,
        customer_id: i64,
        cart: CartSnapshot,
    ) -> Result<PreviewOutcome> {
        self.redeem_on(today(), campaign_id, customer_id, cart).await
    }

    /// `redeem` with an explicit evaluation date, for batch jobs and tests.
    pub async fn redeem_on(
        &self,
        date: NaiveDate,
        campaign_id: i64,
        customer_id: i64,
        cart: CartSnapshot,
    ) -> Result<PreviewOutcome> {
        validate_cart(&cart)?;
        let campaign = self.load_campaign(campaign_id).await?;
        self.ensure_customer(customer_id).await?;
        let allowed = targeting::resolve(self.targeting.as_ref(), &campaign, customer_id).await?;

        // First pass on an unlocked snapshot: a certain-to-fail request is
        // rejected without touching any row.
        let snapshot = self.ledger_snapshot(&campaign, customer_id, date).await?;
        if let Evaluation::Rejected(reason) =
            rule::evaluate(&campaign, allowed, &cart, date, &snapshot)
        {
            return Ok(PreviewOutcome::rejected(reason, campaign.applies_to));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin redemption transaction")?;

        // Second pass against counters read under lock. Daily usage is always
        // locked before the budget row.
        let used_today = self
            .ledger
            .lock_daily_usage(&mut tx, campaign.id, customer_id, date)
            .await?;
        let remaining_budget = match campaign.total_budget_limit {
            Some(limit) => {
                let given = self.ledger.lock_budget(&mut tx, campaign.id).await?;
                Some(limit - given)
            }
            None => None,
        };
        let locked = LedgerSnapshot {
            remaining_budget,
            daily_txns_used: used_today,
        };

        match rule::evaluate(&campaign, allowed, &cart, date, &locked) {
            Evaluation::Rejected(reason) => {
                // A rejection that appears only now means a concurrent
                // redemption consumed the last daily slot between the two
                // passes.
                let reason = match reason {
                    RejectionReason::DailyLimitReached => RejectionReason::DailyLimitRace,
                    other => other,
                };
                tx.rollback()
                    .await
                    .context("Failed to roll back redemption transaction")?;
                tracing::info!(
                    "Redemption rejected under lock: campaign={} customer={} reason={}",
                    campaign.id,
                    customer_id,
                    reason
                );
                Ok(PreviewOutcome::rejected(reason, campaign.applies_to))
            }
            Evaluation::Applicable {
                discount_amount, ..
            } => {
                self.ledger
                    .increment_daily_usage(&mut tx, campaign.id, customer_id, date)
                    .await?;
                if campaign.total_budget_limit.is_some() {
                    self.ledger
                        .add_to_budget(&mut tx, campaign.id, discount_amount)
                        .await?;
                }
                tx.commit()
                    .await
                    .context("Failed to commit redemption transaction")?;
                tracing::info!(
                    "Redeemed campaign={} customer={} amount={}",
                    campaign.id,
                    customer_id,
                    discount_amount
                );
                Ok(PreviewOutcome::applied(discount_amount, campaign.applies_to))
            }
        }
    }

    /// All active campaigns currently applicable to the given cart.
    pub async fn available(
        &self,
        customer_id: i64,
        cart: CartSnapshot,
    ) -> Result<Vec<AvailableCampaign>> {
        self.available_on(today(), customer_id, cart).await
    }

    pub async fn available_on(
        &self,
        date: NaiveDate,
        customer_id: i64,
        cart: CartSnapshot,
    ) -> Result<Vec<AvailableCampaign>> {
        validate_cart(&cart)?;
        self.ensure_customer(customer_id).await?;

        let mut available = Vec::new();
        for campaign in self.campaigns.list_active().await? {
            let outcome = match self
                .check_campaign(&campaign, customer_id, &cart, date)
                .await
            {
                Ok(outcome) => outcome,
                Err(EngineError::Validation(fault)) => {
                    // One misconfigured campaign must not take down the
                    // whole listing.
                    tracing::warn!("Skipping campaign {}: {}", campaign.id, fault);
                    continue;
                }
                Err(other) => return Err(other),
            };
            if outcome.applicable {
                available.push(AvailableCampaign {
                    campaign_id: campaign.id,
                    campaign_name: campaign.name.clone(),
                    applies_to: campaign.applies_to,
                    discount_type: campaign.discount_type,
                    discount_value: campaign.discount_value,
                    discount_amount: outcome.discount_amount,
                });
            }
        }
        Ok(available)
    }

    /// Remaining budget and days for display.
    pub async fn campaign_status(&self, campaign_id: i64) -> Result<CampaignStatus> {
        self.campaign_status_on(today(), campaign_id).await
    }

    pub async fn campaign_status_on(
        &self,
        date: NaiveDate,
        campaign_id: i64,
    ) -> Result<CampaignStatus> {
        let campaign = self
            .campaigns
            .get_by_id(campaign_id)
            .await?
            .ok_or(ValidationFault::UnknownCampaign(campaign_id))?;
        let given = self.ledger.budget_given(campaign.id).await?;
        Ok(CampaignStatus {
            campaign_id: campaign.id,
            name: campaign.name.clone(),
            is_active: campaign.is_active,
            total_discount_given: given,
            remaining_budget: campaign.remaining_budget(given),
            days_left: campaign.days_left(date),
        })
    }

    async fn load_campaign(&self, campaign_id: i64) -> Result<Campaign> {
        let campaign = self
            .campaigns
            .get_by_id(campaign_id)
            .await?
            .ok_or(ValidationFault::UnknownCampaign(campaign_id))?;
        campaign
            .validate()
            .map_err(|source| ValidationFault::BadCampaignConfig {
                id: campaign_id,
                source,
            })?;
        Ok(campaign)
    }

    async fn ensure_customer(&self, customer_id: i64) -> Result<()> {
        if !self.customers.exists(customer_id).await? {
            return Err(ValidationFault::UnknownCustomer(customer_id).into());
        }
        Ok(())
    }

    /// Shared preview path once the campaign row is in hand; validates the
    /// campaign's own configuration.
    async fn check_campaign(
        &self,
        campaign: &Campaign,
        customer_id: i64,
        cart: &CartSnapshot,
        date: NaiveDate,
    ) -> Result<PreviewOutcome> {
        campaign
            .validate()
            .map_err(|source| ValidationFault::BadCampaignConfig {
                id: campaign.id,
                source,
            })?;
        self.preview_campaign(campaign, customer_id, cart, date).await
    }

    async fn preview_campaign(
        &self,
        campaign: &Campaign,
        customer_id: i64,
        cart: &CartSnapshot,
        date: NaiveDate,
    ) -> Result<PreviewOutcome> {
        let allowed = targeting::resolve(self.targeting.as_ref(), campaign, customer_id).await?;
        let snapshot = self.ledger_snapshot(campaign, customer_id, date).await?;
        let eval = rule::evaluate(campaign, allowed, cart, date, &snapshot);
        Ok(PreviewOutcome::from_evaluation(eval, campaign.applies_to))
    }

    /// Read-only ledger counters; absent rows read as zero so previews never
    /// create anything.
    async fn ledger_snapshot(
        &self,
        campaign: &Campaign,
        customer_id: i64,
        date: NaiveDate,
    ) -> Result<LedgerSnapshot> {
        let remaining_budget = match campaign.total_budget_limit {
            Some(limit) => Some(limit - self.ledger.budget_given(campaign.id).await?),
            None => None,
        };
        let daily_txns_used = self
            .ledger
            .daily_txn_count(campaign.id, customer_id, date)
            .await?;
        Ok(LedgerSnapshot {
            remaining_budget,
            daily_txns_used,
        })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn validate_cart(cart: &CartSnapshot) -> Result<()> {
    if cart.subtotal < Decimal::ZERO {
        return Err(ValidationFault::NegativeAmount {
            field: "subtotal",
            amount: cart.subtotal,
        }
        .into());
    }
    if cart.delivery < Decimal::ZERO {
        return Err(ValidationFault::NegativeAmount {
            field: "delivery",
            amount: cart.delivery,
        }
        .into());
    }
    Ok(())
}
