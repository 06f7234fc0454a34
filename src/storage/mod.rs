//! Collaborator seams: the member directory the resolver queries and the
//! store that owns campaign rows.

mod memory;
mod postgres;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Campaign, CampaignId, CampaignStatus, Recipient, TierId};

pub use memory::{InMemoryCampaignStore, InMemoryMemberDirectory, MemberRecord, MemberStatus};
pub use postgres::{PgCampaignStore, PgMemberDirectory};

/// Predicates the resolver derives from an `AudienceSpec`.
///
/// Archived members are excluded by every implementation, unconditionally;
/// the filter cannot ask for them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberFilter {
    pub tier_ids: Option<BTreeSet<TierId>>,
    pub join_date_start: Option<NaiveDate>,
    pub join_date_end: Option<NaiveDate>,
    pub tags: Option<BTreeSet<String>>,
    pub active_only: bool,
}

#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn query_members(&self, filter: &MemberFilter) -> Result<Vec<Recipient>, anyhow::Error>;
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, anyhow::Error>;

    async fn list(
        &self,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, anyhow::Error>;

    async fn insert(&self, campaign: &Campaign) -> Result<(), anyhow::Error>;

    async fn update(&self, campaign: &Campaign) -> Result<(), anyhow::Error>;

    /// Compare-and-set: persists `campaign` only if the stored row still has
    /// status `expected`. Returns whether the write was applied. Send and
    /// cancel paths use this so a concurrent transition cannot be overwritten.
    async fn update_if_status(
        &self,
        campaign: &Campaign,
        expected: CampaignStatus,
    ) -> Result<bool, anyhow::Error>;
}
