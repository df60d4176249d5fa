use rust_decimal::Decimal;
use thiserror::Error;

use rabatt_db::models::campaign::CampaignConfigError;

/// Malformed input, rejected before any rule evaluation runs. Never coerced
/// into a rule rejection: callers are told their request was wrong, not that
/// the campaign did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFault {
    #[error("{field} must be non-negative (got {amount})")]
    NegativeAmount { field: &'static str, amount: Decimal },

    #[error("campaign {0} not found")]
    UnknownCampaign(i64),

    #[error("customer {0} not found")]
    UnknownCustomer(i64),

    #[error("campaign {id} is misconfigured: {source}")]
    BadCampaignConfig {
        id: i64,
        #[source]
        source: CampaignConfigError,
    },

    #[error("campaign {0} restricts customers but its allow-list is empty")]
    EmptyAllowList(i64),
}

/// Engine failure taxonomy. Rule rejections and race rejections are not
/// errors; they come back as non-applicable outcomes on the Ok path.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationFault),

    /// Lock timeout, transaction conflict, or storage failure. Nothing was
    /// committed, so the caller may retry.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
