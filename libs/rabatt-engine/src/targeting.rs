//! Allow-list membership as a capability check. The engine only ever asks
//! two questions — "is this customer on the list?" and "is the list
//! non-empty?" — so alternate backing stores can substitute the Postgres
//! repository.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use rabatt_db::models::campaign::Campaign;
use rabatt_db::repositories::campaign_repo::CampaignRepository;

use crate::error::{Result, ValidationFault};

#[async_trait]
pub trait CustomerTargeting: Send + Sync {
    async fn is_allowed(&self, campaign_id: i64, customer_id: i64) -> anyhow::Result<bool>;
    async fn allowed_count(&self, campaign_id: i64) -> anyhow::Result<i64>;
}

#[async_trait]
impl CustomerTargeting for CampaignRepository {
    async fn is_allowed(&self, campaign_id: i64, customer_id: i64) -> anyhow::Result<bool> {
        self.is_customer_allowed(campaign_id, customer_id).await
    }

    async fn allowed_count(&self, campaign_id: i64) -> anyhow::Result<i64> {
        self.allowed_customer_count(campaign_id).await
    }
}

/// In-memory allow-lists, for tests and embedded callers.
#[derive(Debug, Clone, Default)]
pub struct MemoryTargeting {
    lists: HashMap<i64, HashSet<i64>>,
}

impl MemoryTargeting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, campaign_id: i64, customer_id: i64) {
        self.lists.entry(campaign_id).or_default().insert(customer_id);
    }
}

#[async_trait]
impl CustomerTargeting for MemoryTargeting {
    async fn is_allowed(&self, campaign_id: i64, customer_id: i64) -> anyhow::Result<bool> {
        Ok(self
            .lists
            .get(&campaign_id)
            .is_some_and(|list| list.contains(&customer_id)))
    }

    async fn allowed_count(&self, campaign_id: i64) -> anyhow::Result<i64> {
        Ok(self.lists.get(&campaign_id).map_or(0, |list| list.len() as i64))
    }
}

/// Resolve whether a customer may use a campaign. A restricted campaign with
/// an empty allow-list is a configuration fault, not a rejection.
pub(crate) async fn resolve(
    targeting: &dyn CustomerTargeting,
    campaign: &Campaign,
    customer_id: i64,
) -> Result<bool> {
    if campaign.allow_all_customers {
        return Ok(true);
    }
    if targeting.allowed_count(campaign.id).await? == 0 {
        return Err(ValidationFault::EmptyAllowList(campaign.id).into());
    }
    Ok(targeting.is_allowed(campaign.id, customer_id).await?)
}
