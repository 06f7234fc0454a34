//! In-memory collaborators, used by the test suite and local experiments.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{Campaign, CampaignId, CampaignStatus, EmailAddress, MemberId, Recipient, TierId};

use super::{CampaignStore, MemberDirectory, MemberFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStatus {
    Active,
    Expired,
    Pending,
}

#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub id: MemberId,
    pub email: EmailAddress,
    pub first_name: String,
    pub last_name: String,
    pub tier_id: TierId,
    pub join_date: NaiveDate,
    pub renewal_date: NaiveDate,
    pub status: MemberStatus,
    pub archived: bool,
    pub tags: BTreeSet<String>,
}

impl MemberRecord {
    fn matches(&self, filter: &MemberFilter) -> bool {
        if self.archived {
            return false;
        }
        if filter.active_only && self.status != MemberStatus::Active {
            return false;
        }
        if let Some(tier_ids) = &filter.tier_ids {
            if !tier_ids.contains(&self.tier_id) {
                return false;
            }
        }
        if let Some(start) = filter.join_date_start {
            if self.join_date < start {
                return false;
            }
        }
        if let Some(end) = filter.join_date_end {
            if self.join_date > end {
                return false;
            }
        }
        if let Some(tags) = &filter.tags {
            if tags.is_disjoint(&self.tags) {
                return false;
            }
        }
        true
    }

    fn as_recipient(&self) -> Recipient {
        Recipient {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            tier_id: self.tier_id.clone(),
            join_date: self.join_date,
            renewal_date: self.renewal_date,
        }
    }
}

#[derive(Default)]
pub struct InMemoryMemberDirectory {
    members: RwLock<Vec<MemberRecord>>,
}

impl InMemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, members: impl IntoIterator<Item = MemberRecord>) {
        self.members
            .write()
            .expect("member directory lock poisoned")
            .extend(members);
    }
}

#[async_trait]
impl MemberDirectory for InMemoryMemberDirectory {
    async fn query_members(&self, filter: &MemberFilter) -> Result<Vec<Recipient>, anyhow::Error> {
        let members = self
            .members
            .read()
            .expect("member directory lock poisoned");
        Ok(members
            .iter()
            .filter(|m| m.matches(filter))
            .map(MemberRecord::as_recipient)
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryCampaignStore {
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, anyhow::Error> {
        let campaigns = self.campaigns.read().expect("campaign store lock poisoned");
        Ok(campaigns.get(&id).cloned())
    }

    async fn list(
        &self,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, anyhow::Error> {
        let campaigns = self.campaigns.read().expect("campaign store lock poisoned");
        let mut campaigns: Vec<Campaign> = campaigns
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        campaigns.sort_by_key(|c| c.id.as_uuid());
        Ok(campaigns)
    }

    async fn insert(&self, campaign: &Campaign) -> Result<(), anyhow::Error> {
        let mut campaigns = self.campaigns.write().expect("campaign store lock poisoned");
        if campaigns.contains_key(&campaign.id) {
            anyhow::bail!("campaign {} already exists", campaign.id);
        }
        campaigns.insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), anyhow::Error> {
        let mut campaigns = self.campaigns.write().expect("campaign store lock poisoned");
        match campaigns.get_mut(&campaign.id) {
            Some(stored) => {
                *stored = campaign.clone();
                Ok(())
            }
            None => anyhow::bail!("campaign {} does not exist", campaign.id),
        }
    }

    async fn update_if_status(
        &self,
        campaign: &Campaign,
        expected: CampaignStatus,
    ) -> Result<bool, anyhow::Error> {
        let mut campaigns = self.campaigns.write().expect("campaign store lock poisoned");
        match campaigns.get_mut(&campaign.id) {
            Some(stored) if stored.status == expected => {
                *stored = campaign.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => anyhow::bail!("campaign {} does not exist", campaign.id),
        }
    }
}
