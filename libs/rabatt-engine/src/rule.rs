//! The campaign rule: a pure evaluator over a campaign definition, a cart
//! snapshot, and a ledger snapshot. No I/O — the redemption protocol runs the
//! same function twice, once against an unlocked snapshot and once against
//! counters read under lock, so both passes stay provably consistent.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use rabatt_db::models::campaign::{AppliesTo, Campaign, DiscountType};

/// The cart amounts a campaign can discount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub subtotal: Decimal,
    pub delivery: Decimal,
}

impl CartSnapshot {
    pub fn new(subtotal: Decimal, delivery: Decimal) -> Self {
        Self { subtotal, delivery }
    }

    pub fn base_for(&self, target: AppliesTo) -> Decimal {
        match target {
            AppliesTo::Cart => self.subtotal,
            AppliesTo::Delivery => self.delivery,
        }
    }
}

/// Ledger counters as of some moment: remaining budget (None = unlimited)
/// and how many redemptions this customer has already committed today.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSnapshot {
    pub remaining_budget: Option<Decimal>,
    pub daily_txns_used: i32,
}

impl LedgerSnapshot {
    /// Fresh state: no budget cap consumed, no redemptions today.
    pub fn unlimited() -> Self {
        Self {
            remaining_budget: None,
            daily_txns_used: 0,
        }
    }
}

/// Why a campaign did not apply. `DailyLimitRace` is reported only by the
/// redemption protocol's under-lock re-check, so callers can tell "never
/// eligible" apart from "lost a race".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    OutOfSchedule,
    NotTargeted,
    DailyLimitReached,
    NothingToDiscount,
    BudgetExhausted,
    NotApplicable,
    DailyLimitRace,
}

impl RejectionReason {
    pub fn message(self) -> &'static str {
        match self {
            RejectionReason::OutOfSchedule => "Inactive or outside schedule.",
            RejectionReason::NotTargeted => "Customer not targeted.",
            RejectionReason::DailyLimitReached => "Daily usage limit reached.",
            RejectionReason::NothingToDiscount => "Nothing to discount.",
            RejectionReason::BudgetExhausted => "Budget exhausted.",
            RejectionReason::NotApplicable => "Not applicable.",
            RejectionReason::DailyLimitRace => "Race: daily limit reached.",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Applicable {
        discount_amount: Decimal,
        applies_to: AppliesTo,
    },
    Rejected(RejectionReason),
}

/// Redemption slots left today for one customer.
pub fn daily_slots_left(max_per_day: i32, used_today: i32) -> i32 {
    (max_per_day - used_today).max(0)
}

/// Raw discount for a base amount, before any budget cap: percent or flat,
/// capped per redemption, truncated (not rounded) to 2 decimal places, never
/// negative.
pub fn raw_discount(campaign: &Campaign, base: Decimal) -> Decimal {
    let base = base.max(Decimal::ZERO);
    let mut discount = match campaign.discount_type {
        DiscountType::Percent => base * campaign.discount_value / Decimal::ONE_HUNDRED,
        DiscountType::Flat => campaign.discount_value,
    };
    if let Some(cap) = campaign.max_discount_amount {
        discount = discount.min(cap);
    }
    discount
        .round_dp_with_strategy(2, RoundingStrategy::ToZero)
        .max(Decimal::ZERO)
}

/// Decide whether a campaign applies and for how much.
///
/// The checks run in a fixed order and the first failure wins: schedule,
/// targeting, daily slots, a positive base amount, then budget. A discount
/// that still computes to zero falls through to `NotApplicable`.
pub fn evaluate(
    campaign: &Campaign,
    customer_allowed: bool,
    cart: &CartSnapshot,
    today: NaiveDate,
    ledger: &LedgerSnapshot,
) -> Evaluation {
    if !campaign.is_active || !campaign.is_within_window(today) || campaign.days_exhausted(today) {
        return Evaluation::Rejected(RejectionReason::OutOfSchedule);
    }

    if !customer_allowed {
        return Evaluation::Rejected(RejectionReason::NotTargeted);
    }

    if daily_slots_left(campaign.max_txn_per_customer_per_day, ledger.daily_txns_used) <= 0 {
        return Evaluation::Rejected(RejectionReason::DailyLimitReached);
    }

    let base = cart.base_for(campaign.applies_to);
    if base <= Decimal::ZERO {
        return Evaluation::Rejected(RejectionReason::NothingToDiscount);
    }

    let mut discount = raw_discount(campaign, base);
    if let Some(remaining) = ledger.remaining_budget {
        if remaining <= Decimal::ZERO {
            return Evaluation::Rejected(RejectionReason::BudgetExhausted);
        }
        discount = discount.min(remaining);
    }

    if discount > Decimal::ZERO {
        Evaluation::Applicable {
            discount_amount: discount,
            applies_to: campaign.applies_to,
        }
    } else {
        Evaluation::Rejected(RejectionReason::NotApplicable)
    }
}
